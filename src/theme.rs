//! Album themes: locating a theme directory and reading its templates.
//!
//! A theme is a directory holding three templates plus any static files
//! (stylesheets, images) the pages reference:
//!
//! ```text
//! themes/classic/
//! ├── index.gthtml       # index pages
//! ├── thumbnail.gthtml   # one cell of the thumbnail grid
//! ├── image.gthtml       # one page per image
//! └── style.css          # copied verbatim into the album
//! ```
//!
//! Turning template text into a [`Document`] is the job of a
//! [`TemplateParser`]. The bundled [`TreeParser`] reads templates stored as
//! a serialized tag tree:
//!
//! ```json
//! [
//!   {"html": "<h1>"},
//!   {"tag": {"kind": "header"}},
//!   {"if": [{"guard": [{"var": "pages"}, {"const": 1}, {"op": "cmp_gt"}],
//!            "body": [{"tag": {"kind": "page-link", "args": [{"name": "idx", "expr": [{"const": 1}]}]}}]}]},
//!   {"tag": {"kind": "table"}}
//! ]
//! ```
//!
//! A template that is missing or fails to parse is replaced by a built-in
//! default, so a broken theme still produces a browsable album.

use crate::expr::NullResolver;
use crate::imaging::Dimensions;
use crate::template::{Document, Tag, TagKind};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const INDEX_TEMPLATE: &str = "index.gthtml";
pub const THUMBNAIL_TEMPLATE: &str = "thumbnail.gthtml";
pub const IMAGE_TEMPLATE: &str = "image.gthtml";

/// Template files that are read, never copied into the album.
pub const TEMPLATE_FILES: [&str; 3] = [INDEX_TEMPLATE, THUMBNAIL_TEMPLATE, IMAGE_TEMPLATE];

#[derive(Error, Debug)]
pub enum ThemeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("template syntax error: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("theme not found: {0}")]
    NotFound(String),
}

/// Turns template source text into a document tree.
pub trait TemplateParser {
    fn parse(&self, source: &str) -> Result<Document, ThemeError>;
}

/// Parser for templates stored as a JSON tag tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeParser;

impl TemplateParser for TreeParser {
    fn parse(&self, source: &str) -> Result<Document, ThemeError> {
        Ok(serde_json::from_str(source)?)
    }
}

/// Resolve a theme given as a directory path or as a name looked up in
/// `search_path` (first match wins).
pub fn find_theme_dir(theme: &str, search_path: &[PathBuf]) -> Result<PathBuf, ThemeError> {
    let direct = Path::new(theme);
    if direct.is_dir() {
        return Ok(direct.to_path_buf());
    }
    search_path
        .iter()
        .map(|root| root.join(theme))
        .find(|candidate| candidate.is_dir())
        .ok_or_else(|| ThemeError::NotFound(theme.to_string()))
}

/// Parse one template file.
pub fn parse_template<P>(parser: &P, path: &Path) -> Result<Document, ThemeError>
where
    P: TemplateParser + ?Sized,
{
    let source = fs::read_to_string(path)?;
    parser.parse(&source)
}

fn template_or_default<P>(parser: &P, path: &Path, fallback: fn() -> Document) -> Document
where
    P: TemplateParser + ?Sized,
{
    match parse_template(parser, path) {
        Ok(document) => document,
        Err(ThemeError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} missing, using the built-in template", path.display());
            fallback()
        }
        Err(e) => {
            warn!("{}: {e}; using the built-in template", path.display());
            fallback()
        }
    }
}

/// The three templates of a theme.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeTemplates {
    pub index: Document,
    pub thumbnail: Document,
    pub image: Document,
}

impl Default for ThemeTemplates {
    fn default() -> Self {
        Self {
            index: Document::default_index(),
            thumbnail: Document::default_thumbnail(),
            image: Document::default_image(),
        }
    }
}

/// Read the templates of the theme in `dir`, substituting defaults for
/// any that are missing or unparseable.
pub fn load_templates<P>(parser: &P, dir: &Path) -> ThemeTemplates
where
    P: TemplateParser + ?Sized,
{
    ThemeTemplates {
        index: template_or_default(parser, &dir.join(INDEX_TEMPLATE), Document::default_index),
        thumbnail: template_or_default(
            parser,
            &dir.join(THUMBNAIL_TEMPLATE),
            Document::default_thumbnail,
        ),
        image: template_or_default(parser, &dir.join(IMAGE_TEMPLATE), Document::default_image),
    }
}

/// Rendition sizes requested by `set-var` tags of the index template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThemeSettings {
    pub thumbnail: Option<Dimensions>,
    pub preview_max: Option<Dimensions>,
    pub preview_min: Option<Dimensions>,
}

fn size_pair(tag: &Tag, width: &str, height: &str) -> Option<Dimensions> {
    let w = tag.int_arg(width, &NullResolver);
    let h = tag.int_arg(height, &NullResolver);
    if w == 0 || h == 0 {
        return None;
    }
    Some(Dimensions::new(
        u32::try_from(w).unwrap_or(0),
        u32::try_from(h).unwrap_or(0),
    ))
}

/// Collect the `set-var` tags at the top level of `index`.
///
/// Each tag sets one pair: thumbnail size, else preview size, else preview
/// minimum. A pair applies only when both values are nonzero. Arguments are
/// evaluated before any image is known, so variables read as `0`.
pub fn read_settings(index: &Document) -> ThemeSettings {
    let mut settings = ThemeSettings::default();
    for tag in index.iter().filter(|t| t.kind() == Some(TagKind::SetVar)) {
        if let Some(size) = size_pair(tag, "thumbnail_width", "thumbnail_height") {
            debug!("theme thumbnail size {}x{}", size.width, size.height);
            settings.thumbnail = Some(size);
        } else if let Some(size) = size_pair(tag, "preview_width", "preview_height") {
            debug!("theme preview size {}x{}", size.width, size.height);
            settings.preview_max = Some(size);
        } else if let Some(size) = size_pair(tag, "preview_min_width", "preview_min_height") {
            debug!("theme preview minimum {}x{}", size.width, size.height);
            settings.preview_min = Some(size);
        }
    }
    settings
}

/// Static files of the theme: every regular file directly inside `dir`
/// except the templates, in name order.
pub fn asset_files(dir: &Path) -> Result<Vec<PathBuf>, ThemeError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if TEMPLATE_FILES.iter().any(|t| name == *t) {
            continue;
        }
        files.push(entry.path());
    }
    files.sort();
    Ok(files)
}
