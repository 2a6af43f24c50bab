//! Document evaluator: walks a template tree and writes one HTML page.
//!
//! Rendering reads the album through a [`RenderContext`] and mutates only
//! its cursors. Loop tags (`table`, `thumbs`) render the thumbnail template
//! once per image and advance the image cursor; everything else is a pure
//! function of the context.
//!
//! Nothing here fails. Unknown variables evaluate to `0`, tags pointing at
//! a missing image render nothing, and loop tags met inside a thumbnail cell
//! or an `if` arm are skipped.
//!
//! Output is written line by line: literal text and computed values that
//! are blank (spaces, tabs and newlines only) are dropped, and text coming
//! from image data is HTML-escaped.

use crate::album::{ExporterState, ImageRecord};
use crate::imaging::{Dimensions, fit_within};
use crate::layout::{Layout, Location};
use crate::metadata::{DATE_FORMAT, format_file_size, truncate_caption};
use crate::template::{Document, Tag, TagKind};
use chrono::NaiveDateTime;
use maud::html;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Export-wide values pages are rendered with.
#[derive(Debug, Clone, Default)]
pub struct RenderSettings {
    pub header: Option<String>,
    pub footer: Option<String>,
    pub language: Option<String>,
    /// Message catalog for `text` tags.
    pub translations: HashMap<String, String>,
    pub layout: Layout,
    pub preview_min: Dimensions,
    /// Final album location, for absolute file names.
    pub destination: PathBuf,
    /// Timestamp shown by `date` and `%d` in header and footer.
    pub now: NaiveDateTime,
}

/// Everything a render pass reads, plus the cursors it advances.
pub struct RenderContext<'a> {
    pub images: &'a [ImageRecord],
    pub state: &'a mut ExporterState,
    pub settings: &'a RenderSettings,
    /// Template rendered for each cell of `table` and `thumbs`.
    pub thumbnail: &'a Document,
    /// Album directory of the page being written; links are relative to it.
    pub page_dir: PathBuf,
    /// Thumbnail cells rendered so far.
    pub thumbnails_rendered: usize,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        images: &'a [ImageRecord],
        state: &'a mut ExporterState,
        settings: &'a RenderSettings,
        thumbnail: &'a Document,
        page_dir: PathBuf,
    ) -> Self {
        Self {
            images,
            state,
            settings,
            thumbnail,
            page_dir,
            thumbnails_rendered: 0,
        }
    }

    fn layout(&self) -> &Layout {
        &self.settings.layout
    }

    fn link(&self, location: &Location) -> String {
        location.uri_from(&self.page_dir)
    }
}

/// Render `document` to a new string.
pub fn render_page(document: &Document, ctx: &mut RenderContext<'_>) -> String {
    let mut out = String::new();
    render(document, ctx, &mut out, true);
    out
}

/// Render `document` into `out`.
///
/// `allow_loop_tags` is false while rendering a thumbnail cell or the arm
/// of an `if`, so grids only appear at the top level of a page.
pub fn render(
    document: &Document,
    ctx: &mut RenderContext<'_>,
    out: &mut String,
    allow_loop_tags: bool,
) {
    for tag in document {
        match tag {
            Tag::Html(text) => write_line(out, text),
            Tag::If(conditions) => {
                if ctx.state.image_count > 0 {
                    ctx.state.eval_image = Some(ctx.state.image.min(ctx.state.image_count - 1));
                }
                if let Some(arm) = conditions
                    .iter()
                    .find(|condition| condition.guard.eval(&*ctx) != 0)
                {
                    render(&arm.body, ctx, out, false);
                }
            }
            Tag::WithArgs { kind, body, .. } => {
                render_tag(tag, *kind, body.as_ref(), ctx, out, allow_loop_tags)
            }
        }
    }
}

fn render_tag(
    tag: &Tag,
    kind: TagKind,
    body: Option<&Document>,
    ctx: &mut RenderContext<'_>,
    out: &mut String,
    allow_loop_tags: bool,
) {
    match kind {
        TagKind::Header => {
            if let Some(text) = &ctx.settings.header {
                write_escaped(out, &expand_header(text, ctx.settings.now));
            }
        }
        TagKind::Footer => {
            if let Some(text) = &ctx.settings.footer {
                write_escaped(out, &expand_header(text, ctx.settings.now));
            }
        }
        TagKind::Language => {
            if let Some(language) = &ctx.settings.language {
                write_escaped(out, language);
            }
        }
        TagKind::Date => write_escaped(out, &ctx.settings.now.format(DATE_FORMAT).to_string()),
        TagKind::ThemeLink => {
            if let Some(src) = tag.str_arg("src") {
                let file = Location::Album(ctx.layout().theme_file(src));
                write_escaped(out, &ctx.link(&file));
            }
        }

        TagKind::Image => render_image(tag, ctx, out),
        TagKind::ImageLink => {
            if let Some(record) = tagged_image(tag, ctx) {
                let page = Location::Album(ctx.layout().image_page(record));
                write_escaped(out, &ctx.link(&page));
            }
        }
        TagKind::ImageIdx => write_line(out, &(image_idx(tag, ctx) + 1).to_string()),
        TagKind::ImageDim => {
            if let Some(record) = ctx.images.get(image_idx(tag, ctx)) {
                write_line(out, &format!("{}x{}", record.image.width, record.image.height));
            }
        }
        TagKind::Images => write_line(out, &ctx.state.image_count.to_string()),
        TagKind::FileName => render_file_name(tag, ctx, out),
        TagKind::FilePath => render_file_path(tag, ctx, out),
        TagKind::FileSize => {
            if let Some(record) = tagged_image(tag, ctx) {
                write_escaped(out, &format_file_size(record.file_size));
            }
        }
        TagKind::Comment => render_caption(tag, ctx, out, |r| r.captions.comment.as_deref()),
        TagKind::Place => render_caption(tag, ctx, out, |r| r.captions.place.as_deref()),
        TagKind::DateTime => render_caption(tag, ctx, out, |r| r.captions.date_time.as_deref()),

        TagKind::PageLink => {
            let page = if tag.flag("image_idx", &*ctx) {
                ctx.state.page_of(image_idx(tag, ctx))
            } else {
                page_idx(tag, ctx)
            };
            let file = Location::Album(ctx.layout().index_page(page));
            write_escaped(out, &ctx.link(&file));
        }
        TagKind::PageIdx => write_line(out, &(page_idx(tag, ctx) + 1).to_string()),
        TagKind::PageRows => write_line(out, &ctx.state.rows.to_string()),
        TagKind::PageCols => write_line(out, &ctx.state.cols.to_string()),
        TagKind::Pages => write_line(out, &ctx.state.page_count.to_string()),

        TagKind::Table if allow_loop_tags => render_table(ctx, out),
        TagKind::Thumbs if allow_loop_tags => render_thumbs(ctx, out),
        TagKind::Table | TagKind::Thumbs => {}

        TagKind::Text => {
            if !tag.args().is_empty() {
                return;
            }
            if let Some(Tag::Html(text)) = body.and_then(|doc| doc.tags.first()) {
                write_escaped(out, translate(&ctx.settings.translations, text));
            }
        }
        TagKind::SetVar => {}
        TagKind::Eval => {
            tagged_image(tag, ctx);
            let value = tag.int_arg("expr", &*ctx);
            write_line(out, &value.to_string());
        }

        TagKind::ExifExposureTime => render_exif(tag, ctx, out, |r| r.exif.exposure_time.as_deref()),
        TagKind::ExifExposureMode => render_exif(tag, ctx, out, |r| r.exif.exposure_mode.as_deref()),
        TagKind::ExifFlash => render_exif(tag, ctx, out, |r| r.exif.flash.as_deref()),
        TagKind::ExifShutterSpeed => render_exif(tag, ctx, out, |r| r.exif.shutter_speed.as_deref()),
        TagKind::ExifApertureValue => render_exif(tag, ctx, out, |r| r.exif.aperture.as_deref()),
        TagKind::ExifFocalLength => render_exif(tag, ctx, out, |r| r.exif.focal_length.as_deref()),
        TagKind::ExifDateTime => {
            if let Some(record) = tagged_image(tag, ctx) {
                match record.exif.date_time {
                    Some(taken) => write_escaped(out, &taken.format(DATE_FORMAT).to_string()),
                    None => write_line(out, "-"),
                }
            }
        }
        TagKind::ExifCameraModel => {
            if let Some(record) = tagged_image(tag, ctx) {
                write_escaped(out, record.exif.make.as_deref().unwrap_or_default());
                write_line(out, " &nbsp; ");
                write_escaped(out, record.exif.model.as_deref().unwrap_or_default());
            }
        }
    }
}

// =============================================================================
// Index resolution
// =============================================================================

/// Resolve the `idx` / `idx_relative` arguments of `tag` against `current`.
///
/// `idx_relative` offsets the cursor and `idx` is 1-based; the first of the
/// two found wins. The result is clamped into `0..count`.
fn resolve_idx(tag: &Tag, ctx: &RenderContext<'_>, current: usize, count: usize) -> usize {
    let mut idx = current as i64;
    for var in tag.args() {
        if var.is_named("idx_relative") {
            idx = (current as i64).wrapping_add(var.int_value(ctx));
            break;
        }
        if var.is_named("idx") {
            idx = var.int_value(ctx).wrapping_sub(1);
            break;
        }
    }
    idx.min(count as i64 - 1).max(0) as usize
}

/// Image a per-image tag is about.
pub fn image_idx(tag: &Tag, ctx: &RenderContext<'_>) -> usize {
    resolve_idx(tag, ctx, ctx.state.image, ctx.state.image_count)
}

/// Page a page tag is about.
pub fn page_idx(tag: &Tag, ctx: &RenderContext<'_>) -> usize {
    resolve_idx(tag, ctx, ctx.state.page, ctx.state.page_count)
}

/// Resolve the image of a per-image tag and bind it for evaluation of the
/// tag's remaining arguments.
fn tagged_image<'a>(tag: &Tag, ctx: &mut RenderContext<'a>) -> Option<&'a ImageRecord> {
    let idx = image_idx(tag, ctx);
    let images = ctx.images;
    let record = images.get(idx)?;
    ctx.state.eval_image = Some(idx);
    Some(record)
}

// =============================================================================
// Per-image tags
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rendition {
    Thumbnail,
    Preview,
    Image,
}

fn rendition(tag: &Tag, ctx: &RenderContext<'_>) -> Rendition {
    if tag.flag("thumbnail", ctx) {
        Rendition::Thumbnail
    } else if tag.flag("preview", ctx) {
        Rendition::Preview
    } else {
        Rendition::Image
    }
}

fn rendition_file(layout: &Layout, record: &ImageRecord, which: Rendition) -> (Location, Dimensions) {
    match which {
        Rendition::Thumbnail => (Location::Album(layout.thumbnail(record)), record.thumbnail),
        Rendition::Preview => (layout.preview(record), record.preview),
        Rendition::Image => (layout.image(record), record.image),
    }
}

fn render_image(tag: &Tag, ctx: &mut RenderContext<'_>, out: &mut String) {
    let Some(record) = tagged_image(tag, ctx) else {
        return;
    };
    let (file, mut size) = rendition_file(ctx.layout(), record, rendition(tag, ctx));
    let src = ctx.link(&file);

    let max_size = tag.int_arg("max_size", &*ctx);
    if max_size > 0 {
        size = fit_within(size, u32::try_from(max_size).unwrap_or(u32::MAX));
    }
    let alt = match tag.str_arg("alt") {
        Some(alt) => alt.to_string(),
        None => percent_decode_str(&src).decode_utf8_lossy().into_owned(),
    };

    let markup = html! {
        img src=(src) alt=(alt) width=(size.width) height=(size.height)
            id=[tag.str_arg("id")] class=[tag.str_arg("class")];
    };
    write_line(out, &markup.into_string());
}

fn render_file_name(tag: &Tag, ctx: &mut RenderContext<'_>, out: &mut String) {
    let Some(record) = tagged_image(tag, ctx) else {
        return;
    };
    let (file, _) = rendition_file(ctx.layout(), record, rendition(tag, ctx));

    let relative = tag.flag("with_relative_path", &*ctx);
    let path = if relative {
        file.relative_path_from(&ctx.page_dir)
    } else {
        file.absolute(&ctx.settings.destination).display().to_string()
    };
    let line = if relative || tag.flag("with_path", &*ctx) {
        path
    } else {
        Path::new(&path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    write_escaped(out, &line);
}

fn render_file_path(tag: &Tag, ctx: &mut RenderContext<'_>, out: &mut String) {
    let Some(record) = tagged_image(tag, ctx) else {
        return;
    };
    let (file, _) = rendition_file(ctx.layout(), record, rendition(tag, ctx));
    let dir = match file {
        Location::Album(path) => Location::Album(parent(&path)),
        Location::Source(path) => Location::Source(parent(&path)),
    };

    let line = if tag.flag("relative_path", &*ctx) {
        dir.relative_path_from(&ctx.page_dir)
    } else {
        dir.absolute(&ctx.settings.destination).display().to_string()
    };
    write_escaped(out, &line);
}

fn parent(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn render_caption(
    tag: &Tag,
    ctx: &mut RenderContext<'_>,
    out: &mut String,
    field: fn(&ImageRecord) -> Option<&str>,
) {
    let Some(text) = tagged_image(tag, ctx).and_then(field) else {
        return;
    };
    let max_size = usize::try_from(tag.int_arg("max_size", &*ctx)).unwrap_or(0);
    write_escaped(out, &truncate_caption(text, max_size));
}

fn render_exif(
    tag: &Tag,
    ctx: &mut RenderContext<'_>,
    out: &mut String,
    field: fn(&ImageRecord) -> Option<&str>,
) {
    if let Some(value) = tagged_image(tag, ctx).and_then(field) {
        write_escaped(out, value);
    }
}

// =============================================================================
// Loop tags
// =============================================================================

fn render_cell(ctx: &mut RenderContext<'_>, out: &mut String) {
    let thumbnail = ctx.thumbnail;
    render(thumbnail, ctx, out, false);
    ctx.thumbnails_rendered += 1;
    ctx.state.advance_image();
}

/// `rows x cols` grid of thumbnail cells, padded with empty cells once the
/// images run out.
fn render_table(ctx: &mut RenderContext<'_>, out: &mut String) {
    for _ in 0..ctx.state.rows {
        if ctx.state.has_current_image() {
            write_line(out, "  <tr class=\"tr_index\">\n");
        } else {
            write_line(out, "  <tr class=\"tr_empty_index\">\n");
        }
        for _ in 0..ctx.state.cols {
            if ctx.state.has_current_image() {
                write_line(out, "    <td class=\"td_index\">\n");
                render_cell(ctx, out);
                write_line(out, "    </td>\n");
            } else {
                write_line(out, "    <td class=\"td_empty_index\">\n");
                write_line(out, "    &nbsp;\n");
                write_line(out, "    </td>\n");
            }
        }
        write_line(out, "  </tr>\n");
    }
}

/// Bare thumbnail cells for the rest of the page.
fn render_thumbs(ctx: &mut RenderContext<'_>, out: &mut String) {
    let limit = if ctx.state.single_index {
        ctx.state.image_count
    } else {
        ctx.state.images_per_page()
    };
    for _ in 0..limit {
        if !ctx.state.has_current_image() {
            break;
        }
        render_cell(ctx, out);
    }
}

// =============================================================================
// Text helpers
// =============================================================================

fn is_blank(line: &str) -> bool {
    line.chars().all(|c| matches!(c, ' ' | '\t' | '\n'))
}

fn write_line(out: &mut String, line: &str) {
    if !is_blank(line) {
        out.push_str(line);
    }
}

fn write_escaped(out: &mut String, text: &str) {
    if !is_blank(text) {
        out.push_str(&html! { (text) }.into_string());
    }
}

fn translate<'t>(catalog: &'t HashMap<String, String>, text: &'t str) -> &'t str {
    catalog
        .get(text.trim())
        .map(String::as_str)
        .unwrap_or(text)
}

/// Expand `%d` (current date) and `%%` in header and footer text.
pub fn expand_header(text: &str, now: NaiveDateTime) -> String {
    let mut expanded = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            expanded.push(c);
            continue;
        }
        match chars.next() {
            None => expanded.push('%'),
            Some('%') => expanded.push('%'),
            Some('d') => expanded.push_str(&now.format(DATE_FORMAT).to_string()),
            Some(_) => {}
        }
    }
    expanded
}

/// Two or three letter language code from `configured` or the locale
/// environment (`LC_ALL`, `LC_MESSAGES`, `LANG`).
pub fn detect_language(configured: Option<&str>) -> Option<String> {
    let locale = match configured {
        Some(value) => value.to_string(),
        None => ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())?,
    };
    let code = locale.split(['_', '.', '@']).next().unwrap_or_default();
    let valid = matches!(code.len(), 2 | 3) && code.chars().all(|c| c.is_ascii_alphabetic());
    valid.then(|| code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expr, Op};
    use crate::template::{Condition, Var};
    use crate::test_helpers::{record, records, tag, tag_with_body};
    use chrono::NaiveDate;
    use rstest::rstest;

    fn state_for(count: usize, rows: usize, cols: usize) -> ExporterState {
        let mut state = ExporterState::new(rows, cols, false);
        state.paginate(count);
        state
    }

    fn render_with(
        doc: &Document,
        images: &[ImageRecord],
        state: &mut ExporterState,
        settings: &RenderSettings,
    ) -> String {
        let thumbnail = Document::new(vec![tag(TagKind::ImageIdx, vec![])]);
        let mut ctx = RenderContext::new(images, state, settings, &thumbnail, PathBuf::new());
        render_page(doc, &mut ctx)
    }

    // =========================================================================
    // Conditionals
    // =========================================================================

    #[test]
    fn if_renders_first_true_arm_only() {
        let doc = Document::new(vec![Tag::if_chain(vec![
            Condition::new(Expr::constant(0), Document::new(vec![Tag::html("A")])),
            Condition::new(Expr::constant(1), Document::new(vec![Tag::html("B")])),
            Condition::otherwise(Document::new(vec![Tag::html("C")])),
        ])]);
        let mut state = state_for(0, 1, 1);
        let out = render_with(&doc, &[], &mut state, &RenderSettings::default());
        assert_eq!(out, "B");
    }

    #[test]
    fn if_without_matching_arm_renders_nothing() {
        let doc = Document::new(vec![Tag::if_chain(vec![Condition::new(
            Expr::var("pages"),
            Document::new(vec![Tag::html("several")]),
        )])]);
        let mut state = state_for(0, 1, 1);
        let out = render_with(&doc, &[], &mut state, &RenderSettings::default());
        assert_eq!(out, "");
    }

    #[test]
    fn if_guard_sees_current_image_sizes() {
        let mut wide = Expr::var("image_width");
        wide.push_var("image_height").push_op(Op::CmpGt);
        let doc = Document::new(vec![Tag::if_chain(vec![
            Condition::new(wide, Document::new(vec![Tag::html("landscape")])),
            Condition::otherwise(Document::new(vec![Tag::html("portrait")])),
        ])]);
        let images = vec![record("a.jpg", 800, 600), record("b.jpg", 300, 400)];
        let settings = RenderSettings::default();

        let mut state = state_for(2, 1, 2);
        state.bind_image(0);
        assert_eq!(render_with(&doc, &images, &mut state, &settings), "landscape");
        state.bind_image(1);
        assert_eq!(render_with(&doc, &images, &mut state, &settings), "portrait");
    }

    // =========================================================================
    // Loop tags
    // =========================================================================

    #[test]
    fn loop_tags_silent_when_disallowed() {
        let doc = Document::new(vec![tag(TagKind::Table, vec![]), tag(TagKind::Thumbs, vec![])]);
        let images = records(3);
        let mut state = state_for(3, 2, 2);
        let settings = RenderSettings::default();
        let thumbnail = Document::default_thumbnail();
        let mut ctx = RenderContext::new(&images, &mut state, &settings, &thumbnail, PathBuf::new());

        let mut out = String::new();
        render(&doc, &mut ctx, &mut out, false);
        assert_eq!(out, "");
        assert_eq!(ctx.thumbnails_rendered, 0);
        assert_eq!(ctx.state.image, 0);
    }

    #[test]
    fn loop_tags_inside_if_render_nothing() {
        let doc = Document::new(vec![Tag::if_chain(vec![Condition::new(
            Expr::constant(1),
            Document::new(vec![Tag::html("grid:"), tag(TagKind::Table, vec![])]),
        )])]);
        let images = records(2);
        let mut state = state_for(2, 1, 2);
        let settings = RenderSettings::default();
        let thumbnail = Document::new(vec![Tag::html("T")]);
        let mut ctx = RenderContext::new(&images, &mut state, &settings, &thumbnail, PathBuf::new());

        let out = render_page(&doc, &mut ctx);
        assert_eq!(out, "grid:");
        assert_eq!(ctx.thumbnails_rendered, 0);
        assert_eq!(ctx.state.image, 0);
    }

    #[test]
    fn image_dim_leaves_evaluation_binding_alone() {
        let images = vec![record("a.jpg", 800, 600), record("b.jpg", 300, 400)];
        let mut state = state_for(2, 1, 2);
        state.bind_image(0);
        let settings = RenderSettings::default();
        let thumbnail = Document::default();
        let mut ctx = RenderContext::new(&images, &mut state, &settings, &thumbnail, PathBuf::new());

        let doc = Document::new(vec![tag(TagKind::ImageDim, vec![Var::int("idx_relative", 1)])]);
        assert_eq!(render_page(&doc, &mut ctx), "300x400");
        assert_eq!(ctx.state.eval_image, Some(0));
    }

    #[test]
    fn table_pads_short_rows_with_empty_cells() {
        let doc = Document::new(vec![tag(TagKind::Table, vec![])]);
        let images = records(3);
        let mut state = state_for(3, 2, 2);
        let out = render_with(&doc, &images, &mut state, &RenderSettings::default());

        assert_eq!(out.matches("<td class=\"td_index\">").count(), 3);
        assert_eq!(out.matches("<td class=\"td_empty_index\">").count(), 1);
        assert_eq!(out.matches("<tr class=\"tr_index\">").count(), 2);
        assert!(out.contains("1"));
        assert!(out.contains("3"));
        assert_eq!(state.image, 3);
    }

    #[test]
    fn thumbs_render_remaining_images_of_page() {
        let doc = Document::new(vec![tag(TagKind::Thumbs, vec![])]);
        let images = records(5);
        let mut state = state_for(5, 1, 3);
        state.bind_page(1);
        let out = render_with(&doc, &images, &mut state, &RenderSettings::default());
        assert_eq!(out, "45");
    }

    #[test]
    fn nested_grid_in_thumbnail_is_suppressed() {
        let images = records(2);
        let mut state = state_for(2, 1, 2);
        let settings = RenderSettings::default();
        let thumbnail = Document::new(vec![Tag::html("x"), tag(TagKind::Table, vec![])]);
        let mut ctx = RenderContext::new(&images, &mut state, &settings, &thumbnail, PathBuf::new());

        let out = render_page(&Document::new(vec![tag(TagKind::Thumbs, vec![])]), &mut ctx);
        assert_eq!(out, "xx");
        assert_eq!(ctx.thumbnails_rendered, 2);
    }

    #[rstest]
    #[case(10, 2, 3)]
    #[case(12, 2, 3)]
    #[case(7, 4, 4)]
    #[case(1, 1, 1)]
    #[case(5, 1, 2)]
    fn every_image_rendered_once_across_pages(
        #[case] count: usize,
        #[case] rows: usize,
        #[case] cols: usize,
    ) {
        let images = records(count);
        let mut state = state_for(count, rows, cols);
        let settings = RenderSettings::default();
        let thumbnail = Document::new(vec![tag(TagKind::ImageIdx, vec![]), Tag::html(",")]);
        let index = Document::new(vec![tag(TagKind::Table, vec![])]);

        let mut total = 0;
        let mut seen = String::new();
        for page in 0..state.page_count {
            state.bind_page(page);
            let mut ctx = RenderContext::new(&images, &mut state, &settings, &thumbnail, PathBuf::new());
            let out = render_page(&index, &mut ctx);
            total += ctx.thumbnails_rendered;
            seen.push_str(&out.replace(|c: char| !c.is_ascii_digit() && c != ',', ""));
        }
        assert_eq!(total, count);
        let expected: Vec<String> = (1..=count).map(|i| i.to_string()).collect();
        assert_eq!(seen.trim_end_matches(','), expected.join(","));
    }

    // =========================================================================
    // Index resolution
    // =========================================================================

    #[rstest]
    #[case(vec![], 4)]
    #[case(vec![Var::int("idx_relative", -1)], 3)]
    #[case(vec![Var::int("idx", 1)], 0)]
    #[case(vec![Var::int("idx_relative", 100)], 9)]
    #[case(vec![Var::int("idx", -5)], 0)]
    fn image_idx_resolution(#[case] args: Vec<Var>, #[case] expected: usize) {
        let images = records(10);
        let mut state = state_for(10, 2, 3);
        state.image = 4;
        let settings = RenderSettings::default();
        let thumbnail = Document::default();
        let ctx = RenderContext::new(&images, &mut state, &settings, &thumbnail, PathBuf::new());

        assert_eq!(image_idx(&tag(TagKind::Image, args), &ctx), expected);
    }

    #[test]
    fn every_per_image_tag_uses_the_same_index() {
        let mut images = records(3);
        images[1].captions.comment = Some("second".to_string());
        images[1].file_size = 2048;
        let mut state = state_for(3, 1, 3);
        let settings = RenderSettings::default();

        let prev = || vec![Var::int("idx_relative", -1)];
        let doc = Document::new(vec![
            tag(TagKind::ImageIdx, prev()),
            Tag::html("|"),
            tag(TagKind::Comment, prev()),
            Tag::html("|"),
            tag(TagKind::FileSize, prev()),
            Tag::html("|"),
            tag(TagKind::FileName, prev()),
        ]);
        state.bind_image(2);
        let out = render_with(&doc, &images, &mut state, &settings);
        assert_eq!(out, "2|second|2.0 KB|img1.jpg");
    }

    #[test]
    fn per_image_tags_without_images_render_nothing() {
        let doc = Document::new(vec![
            tag(TagKind::Image, vec![]),
            tag(TagKind::Comment, vec![]),
            tag(TagKind::ExifCameraModel, vec![]),
        ]);
        let mut state = state_for(0, 1, 1);
        assert_eq!(render_with(&doc, &[], &mut state, &RenderSettings::default()), "");
    }

    // =========================================================================
    // Individual tags
    // =========================================================================

    #[test]
    fn image_tag_links_thumbnail_with_attributes() {
        let images = vec![record("dawn.jpg", 800, 600)];
        let mut state = state_for(1, 1, 1);
        let settings = RenderSettings::default();
        let doc = Document::new(vec![tag(
            TagKind::Image,
            vec![
                Var::int("thumbnail", 1),
                Var::string("class", "thumb"),
                Var::expr("id", Expr::var("cover")),
            ],
        )]);
        let out = render_with(&doc, &images, &mut state, &settings);
        assert_eq!(
            out,
            "<img src=\"thumbnails/dawn.jpg.small.jpeg\" alt=\"thumbnails/dawn.jpg.small.jpeg\" \
             width=\"100\" height=\"75\" id=\"cover\" class=\"thumb\">"
        );
    }

    #[test]
    fn image_tag_max_size_scales_dimensions() {
        let mut images = vec![record("dawn.jpg", 800, 600)];
        images[0].no_preview = false;
        images[0].preview = Dimensions::new(640, 480);
        let mut state = state_for(1, 1, 1);
        let settings = RenderSettings::default();
        let doc = Document::new(vec![tag(
            TagKind::Image,
            vec![Var::int("preview", 1), Var::int("max_size", 320)],
        )]);
        let out = render_with(&doc, &images, &mut state, &settings);
        assert!(out.contains("src=\"previews/dawn.jpg.medium.jpeg\""));
        assert!(out.contains("width=\"320\" height=\"240\""));
    }

    #[test]
    fn comment_is_escaped_and_truncated() {
        let mut images = vec![record("a.jpg", 10, 10)];
        images[0].captions.comment = Some("Fish & <chips>".to_string());
        let mut state = state_for(1, 1, 1);
        let settings = RenderSettings::default();

        let full = Document::new(vec![tag(TagKind::Comment, vec![])]);
        assert_eq!(
            render_with(&full, &images, &mut state, &settings),
            "Fish &amp; &lt;chips&gt;"
        );
        let short = Document::new(vec![tag(TagKind::Comment, vec![Var::int("max_size", 4)])]);
        assert_eq!(render_with(&short, &images, &mut state, &settings), "Fish...");
    }

    #[test]
    fn page_link_from_image_page() {
        let images = records(10);
        let mut state = state_for(10, 2, 3);
        let settings = RenderSettings::default();
        let thumbnail = Document::default();
        state.bind_image(7);
        let mut ctx = RenderContext::new(&images, &mut state, &settings, &thumbnail, PathBuf::from("html"));

        let here = Document::new(vec![tag(TagKind::PageLink, vec![Var::int("image_idx", 1)])]);
        assert_eq!(render_page(&here, &mut ctx), "page002.html");
        let first = Document::new(vec![tag(TagKind::PageLink, vec![Var::int("idx", 1)])]);
        assert_eq!(render_page(&first, &mut ctx), "../index.html");
    }

    #[test]
    fn exif_fields_render_placeholders() {
        let mut images = vec![record("a.jpg", 10, 10)];
        images[0].exif.make = Some("Canon".to_string());
        images[0].exif.model = Some("EOS 5D".to_string());
        let mut state = state_for(1, 1, 1);
        let settings = RenderSettings::default();
        let doc = Document::new(vec![
            tag(TagKind::ExifDateTime, vec![]),
            Tag::html("|"),
            tag(TagKind::ExifCameraModel, vec![]),
            Tag::html("|"),
            tag(TagKind::ExifFlash, vec![]),
        ]);
        assert_eq!(
            render_with(&doc, &images, &mut state, &settings),
            "-|Canon &nbsp; EOS 5D|"
        );
    }

    #[test]
    fn eval_writes_expression_value() {
        let images = records(4);
        let mut state = state_for(4, 1, 2);
        state.bind_image(2);
        let mut expr = Expr::var("image_idx");
        expr.push_constant(10).push_op(Op::Mul);
        let doc = Document::new(vec![tag(TagKind::Eval, vec![Var::expr("expr", expr)])]);
        assert_eq!(render_with(&doc, &images, &mut state, &RenderSettings::default()), "30");
    }

    #[test]
    fn text_is_translated_unless_it_has_arguments() {
        let settings = RenderSettings {
            translations: HashMap::from([("Next".to_string(), "Suivant".to_string())]),
            ..RenderSettings::default()
        };
        let body = || Document::new(vec![Tag::html("Next")]);
        let doc = Document::new(vec![
            tag_with_body(TagKind::Text, vec![], body()),
            Tag::html("|"),
            tag_with_body(TagKind::Text, vec![Var::int("plural", 1)], body()),
            tag(TagKind::SetVar, vec![Var::int("thumbnail_width", 50)]),
        ]);
        let mut state = state_for(0, 1, 1);
        assert_eq!(render_with(&doc, &[], &mut state, &settings), "Suivant|");
    }

    #[test]
    fn blank_literals_are_dropped() {
        let doc = Document::new(vec![Tag::html("  \n\t"), Tag::html(" a "), Tag::html("\n")]);
        let mut state = state_for(0, 1, 1);
        assert_eq!(render_with(&doc, &[], &mut state, &RenderSettings::default()), " a ");
    }

    #[test]
    fn header_expands_date_and_percent() {
        let now = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(expand_header("100%% on %d", now), "100% on 01 May 2024, 09:30");
        assert_eq!(expand_header("tail %", now), "tail %");
        assert_eq!(expand_header("no %x code", now), "no  code");
    }

    #[test]
    fn language_codes() {
        assert_eq!(detect_language(Some("pt_BR.UTF-8")).as_deref(), Some("pt"));
        assert_eq!(detect_language(Some("fil")).as_deref(), Some("fil"));
        assert_eq!(detect_language(Some("C")), None);
        assert_eq!(detect_language(Some("POSIX")), None);
    }

    #[test]
    fn theme_link_is_relative_to_page() {
        let mut state = state_for(0, 1, 1);
        let settings = RenderSettings::default();
        let thumbnail = Document::default();
        let mut ctx = RenderContext::new(&[], &mut state, &settings, &thumbnail, PathBuf::from("html"));
        let doc = Document::new(vec![tag(TagKind::ThemeLink, vec![Var::string("src", "style.css")])]);
        assert_eq!(render_page(&doc, &mut ctx), "../theme/style.css");
    }
}
