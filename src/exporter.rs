//! Export pipeline: turns a list of source images and a theme into an album.
//!
//! The exporter is a state machine advanced one bounded unit of work at a
//! time by [`WebExporter::step`]. A caller that wants to stay responsive
//! calls `step` from its own loop; [`WebExporter::run`] simply loops until
//! the export reaches a terminal state.
//!
//! ```text
//! Prepare ─▶ Load (per image) ─▶ Sort ─▶ Paginate ─▶ ParseTemplates
//!    ─▶ RenderIndex (per page) ─▶ RenderImages (per image)
//!    ─▶ SaveThumbnails (per image) ─▶ CopyAssets ─▶ Transfer ─▶ Finished
//! ```
//!
//! Everything is assembled in a scratch directory and copied to the
//! destination only at the end. Whatever happens (success, failure or
//! cancellation through an [`InterruptHandle`]) the scratch directory is
//! removed and exactly one [`ExportEvent::Done`] is sent.
//!
//! A source image that cannot be read is skipped with a warning; the rest
//! of the album is still produced.

use crate::album::{
    ExporterState, ImageRecord, SortMethod, SortOrder, SourceFile, dest_filename, sort_images,
};
use crate::imaging::{
    ImageLoader, ImageOutput, ImagingError, SizePolicy, render_renditions,
};
use crate::layout::{Layout, Location};
use crate::metadata::resolve_captions;
use crate::render::{RenderContext, RenderSettings, detect_language, render_page};
use crate::theme::{
    INDEX_TEMPLATE, TemplateParser, ThemeError, ThemeTemplates, asset_files, load_templates,
    parse_template, read_settings,
};
use crate::variables::CaptionFields;
use chrono::Local;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use tempfile::TempDir;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("could not create a temporary folder: {0}")]
    TempDir(io::Error),
    #[error("theme error: {0}")]
    Theme(#[from] ThemeError),
    #[error("image error: {0}")]
    Imaging(#[from] ImagingError),
    #[error("could not copy the album to {path}: {source}")]
    Transfer { path: PathBuf, source: io::Error },
    #[error("the export has already failed")]
    AlreadyFailed,
}

/// Everything the exporter needs besides the images.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub destination: PathBuf,
    pub theme_dir: PathBuf,
    pub layout: Layout,
    pub rows: usize,
    pub cols: usize,
    pub single_index: bool,
    pub sizes: SizePolicy,
    pub sort_method: SortMethod,
    pub sort_order: SortOrder,
    pub index_caption: CaptionFields,
    pub image_caption: CaptionFields,
    pub header: Option<String>,
    pub footer: Option<String>,
    pub language: Option<String>,
    pub translations: HashMap<String, String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("album"),
            theme_dir: PathBuf::from("theme"),
            layout: Layout::default(),
            rows: 4,
            cols: 4,
            single_index: false,
            sizes: SizePolicy::default(),
            sort_method: SortMethod::None,
            sort_order: SortOrder::Ascending,
            index_caption: CaptionFields::IMAGE_DIM | CaptionFields::FILE_SIZE,
            image_caption: CaptionFields::COMMENT
                | CaptionFields::PLACE
                | CaptionFields::EXIF_DATE_TIME,
            header: None,
            footer: None,
            language: None,
            translations: HashMap::new(),
        }
    }
}

/// Where the pipeline is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Load { next: usize },
    Sort,
    Paginate,
    ParseTemplates,
    RenderIndex { page: usize },
    RenderImages { image: usize },
    SaveThumbnails { image: usize },
    CopyAssets,
    Transfer,
    Finished,
}

impl Phase {
    /// Human readable description, as shown to the user.
    pub fn description(self) -> &'static str {
        match self {
            Phase::Prepare => "Preparing",
            Phase::Load { .. } => "Loading images",
            Phase::Sort => "Sorting images",
            Phase::Paginate => "Creating folders",
            Phase::ParseTemplates => "Reading theme",
            Phase::RenderIndex { .. } => "Saving HTML pages: Indexes",
            Phase::RenderImages { .. } => "Saving HTML pages: Images",
            Phase::SaveThumbnails { .. } => "Saving thumbnails",
            Phase::CopyAssets => "Copying theme files",
            Phase::Transfer => "Copying files to destination",
            Phase::Finished => "Finished",
        }
    }
}

/// How an export ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    Completed,
    Cancelled,
    Failed,
}

/// Status notifications sent while exporting.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    Phase { description: &'static str },
    /// Fraction of the current phase done, in `0.0..=1.0`.
    Progress { fraction: f64 },
    ImageSkipped { source: PathBuf, reason: String },
    BeginCopy { destination: PathBuf },
    Done {
        outcome: ExportOutcome,
        error: Option<String>,
    },
}

/// Result of a finished export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportReport {
    Completed {
        destination: PathBuf,
        images: usize,
        pages: usize,
    },
    Cancelled,
}

/// Result of one [`WebExporter::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue,
    Done(ExportReport),
}

/// Cloneable handle that asks a running export to stop.
///
/// The request is honoured before the next step, never in the middle of one.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The export pipeline.
pub struct WebExporter<L, P> {
    loader: L,
    parser: P,
    options: ExportOptions,
    sources: Vec<SourceFile>,
    images: Vec<ImageRecord>,
    state: ExporterState,
    policy: SizePolicy,
    settings: RenderSettings,
    templates: Option<ThemeTemplates>,
    scratch: Option<TempDir>,
    phase: Phase,
    interrupt: InterruptHandle,
    events: Option<Sender<ExportEvent>>,
    report: Option<ExportReport>,
    thumbnails_rendered: usize,
}

impl<L, P> WebExporter<L, P>
where
    L: ImageLoader,
    P: TemplateParser,
{
    pub fn new(loader: L, parser: P, sources: Vec<SourceFile>, options: ExportOptions) -> Self {
        let state = ExporterState {
            index_caption: options.index_caption,
            image_caption: options.image_caption,
            ..ExporterState::new(options.rows, options.cols, options.single_index)
        };
        Self {
            loader,
            parser,
            policy: options.sizes,
            options,
            sources,
            images: Vec::new(),
            state,
            settings: RenderSettings::default(),
            templates: None,
            scratch: None,
            phase: Phase::Prepare,
            interrupt: InterruptHandle::default(),
            events: None,
            report: None,
            thumbnails_rendered: 0,
        }
    }

    /// Send status events to `events`.
    pub fn with_events(mut self, events: Sender<ExportEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn state(&self) -> &ExporterState {
        &self.state
    }

    /// Scratch directory the album is assembled in, while it exists.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    /// Thumbnail cells rendered across all index pages so far.
    pub fn thumbnails_rendered(&self) -> usize {
        self.thumbnails_rendered
    }

    /// Run the pipeline to the end.
    pub fn run(&mut self) -> Result<ExportReport, ExportError> {
        loop {
            if let Step::Done(report) = self.step()? {
                return Ok(report);
            }
        }
    }

    /// Do one unit of work.
    pub fn step(&mut self) -> Result<Step, ExportError> {
        if self.phase == Phase::Finished {
            return self
                .report
                .clone()
                .map(Step::Done)
                .ok_or(ExportError::AlreadyFailed);
        }
        if self.interrupt.is_interrupted() {
            return Ok(Step::Done(self.cancel()));
        }

        match self.advance() {
            Ok(()) => Ok(match &self.report {
                Some(report) if self.phase == Phase::Finished => Step::Done(report.clone()),
                _ => Step::Continue,
            }),
            Err(e) => {
                warn!("export failed: {e}");
                self.release();
                self.phase = Phase::Finished;
                self.emit(ExportEvent::Done {
                    outcome: ExportOutcome::Failed,
                    error: Some(e.to_string()),
                });
                Err(e)
            }
        }
    }

    fn advance(&mut self) -> Result<(), ExportError> {
        match self.phase {
            Phase::Prepare => self.prepare(),
            Phase::Load { next } if next < self.sources.len() => {
                self.load(next);
                self.progress(next, self.sources.len());
                self.phase = Phase::Load { next: next + 1 };
                Ok(())
            }
            Phase::Load { .. } => {
                self.enter(Phase::Sort);
                Ok(())
            }
            Phase::Sort => {
                sort_images(
                    &mut self.images,
                    self.options.sort_method,
                    self.options.sort_order,
                );
                self.enter(Phase::Paginate);
                Ok(())
            }
            Phase::Paginate => {
                self.paginate()?;
                self.enter(Phase::ParseTemplates);
                Ok(())
            }
            Phase::ParseTemplates => {
                self.templates = Some(load_templates(&self.parser, &self.options.theme_dir));
                self.enter(Phase::RenderIndex { page: 0 });
                Ok(())
            }
            Phase::RenderIndex { page } if page < self.state.page_count => {
                self.render_index(page)?;
                self.progress(page, self.state.page_count);
                self.phase = Phase::RenderIndex { page: page + 1 };
                Ok(())
            }
            Phase::RenderIndex { .. } => {
                self.enter(Phase::RenderImages { image: 0 });
                Ok(())
            }
            Phase::RenderImages { image } if image < self.images.len() => {
                self.render_image(image)?;
                self.progress(image, self.images.len());
                self.phase = Phase::RenderImages { image: image + 1 };
                Ok(())
            }
            Phase::RenderImages { .. } => {
                self.enter(Phase::SaveThumbnails { image: 0 });
                Ok(())
            }
            Phase::SaveThumbnails { image } if image < self.images.len() => {
                self.save_thumbnail(image)?;
                self.progress(image, self.images.len());
                self.phase = Phase::SaveThumbnails { image: image + 1 };
                Ok(())
            }
            Phase::SaveThumbnails { .. } => {
                self.enter(Phase::CopyAssets);
                Ok(())
            }
            Phase::CopyAssets => {
                self.copy_assets()?;
                self.enter(Phase::Transfer);
                Ok(())
            }
            Phase::Transfer => self.transfer(),
            Phase::Finished => Ok(()),
        }
    }

    // =========================================================================
    // Phases
    // =========================================================================

    fn prepare(&mut self) -> Result<(), ExportError> {
        // Source links are file URIs, which need absolute paths.
        self.options.destination = std::path::absolute(&self.options.destination)?;
        for source in &mut self.sources {
            source.path = std::path::absolute(&source.path)?;
        }
        if self.sources.is_empty() {
            info!("nothing to export");
            self.finish(ExportReport::Completed {
                destination: self.options.destination.clone(),
                images: 0,
                pages: 0,
            });
            return Ok(());
        }
        if !self.options.theme_dir.is_dir() {
            return Err(ThemeError::NotFound(self.options.theme_dir.display().to_string()).into());
        }

        let scratch = TempDir::new().map_err(ExportError::TempDir)?;
        debug!("assembling album in {}", scratch.path().display());
        self.scratch = Some(scratch);

        let index_path = self.options.theme_dir.join(INDEX_TEMPLATE);
        if let Ok(index) = parse_template(&self.parser, &index_path) {
            let theme = read_settings(&index);
            if let Some(size) = theme.thumbnail {
                self.policy.thumbnail_max = size;
            }
            if let Some(size) = theme.preview_max {
                self.policy.set_preview_max(size);
            }
            if let Some(size) = theme.preview_min {
                self.policy.preview_min = size;
            }
        }

        let layout = Layout {
            copy_images: self.policy.copy_images,
            ..self.options.layout.clone()
        };
        self.settings = RenderSettings {
            header: self.options.header.clone(),
            footer: self.options.footer.clone(),
            language: detect_language(self.options.language.as_deref()),
            translations: self.options.translations.clone(),
            layout,
            preview_min: self.policy.preview_min,
            destination: self.options.destination.clone(),
            now: Local::now().naive_local(),
        };
        self.enter(Phase::Load { next: 0 });
        Ok(())
    }

    fn load(&mut self, position: usize) {
        let source = self.sources[position].path.clone();
        match self.load_record(position, &source) {
            Ok(record) => {
                debug!(
                    "loaded {} ({}x{})",
                    source.display(),
                    record.image.width,
                    record.image.height
                );
                self.images.push(record);
            }
            Err(e) => {
                warn!("skipping {}: {e}", source.display());
                self.emit(ExportEvent::ImageSkipped {
                    source,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn load_record(&self, position: usize, source: &Path) -> Result<ImageRecord, ExportError> {
        let renditions = render_renditions(&self.loader, source, &self.policy)?;
        let embedded = self.loader.read_metadata(source).unwrap_or_else(|e| {
            warn!("{}: unreadable metadata: {e}", source.display());
            Default::default()
        });
        let file_meta = fs::metadata(source).ok();

        let record = ImageRecord {
            source: source.to_path_buf(),
            dest_filename: dest_filename(position, source),
            file_size: file_meta.as_ref().map_or(0, |m| m.len()),
            modified: file_meta.and_then(|m| m.modified().ok()),
            captions: resolve_captions(source, &embedded),
            exif: embedded.exif,
            image: renditions.plan.image,
            preview: renditions.plan.preview,
            thumbnail: renditions.plan.thumbnail,
            no_preview: renditions.plan.no_preview,
            pending_thumbnail: Some(renditions.thumbnail),
        };

        let layout = &self.settings.layout;
        match (&renditions.image, layout.image(&record)) {
            (ImageOutput::Copied, Location::Album(path)) => {
                let target = self.scratch_path(&path)?;
                fs::copy(source, target)?;
            }
            (ImageOutput::Resized(bytes), Location::Album(path)) => {
                self.write(&path, bytes)?;
            }
            _ => {}
        }
        if let (Some(bytes), Location::Album(path)) = (&renditions.preview, layout.preview(&record)) {
            self.write(&path, bytes)?;
        }
        Ok(record)
    }

    fn paginate(&mut self) -> Result<(), ExportError> {
        self.state.paginate(self.images.len());
        for dir in self.settings.layout.directories(self.state.page_count) {
            fs::create_dir_all(self.scratch_path(&dir)?)?;
        }
        debug!(
            "{} images on {} pages of {}x{}",
            self.state.image_count, self.state.page_count, self.state.rows, self.state.cols
        );
        Ok(())
    }

    fn render_index(&mut self, page: usize) -> Result<(), ExportError> {
        let Some(templates) = &self.templates else {
            return Ok(());
        };
        self.state.bind_page(page);
        let layout = &self.settings.layout;
        let mut ctx = RenderContext::new(
            &self.images,
            &mut self.state,
            &self.settings,
            &templates.thumbnail,
            layout.index_dir(page),
        );
        let html = render_page(&templates.index, &mut ctx);
        self.thumbnails_rendered += ctx.thumbnails_rendered;

        let path = layout.index_page(page);
        self.write(&path, html.as_bytes())
    }

    fn render_image(&mut self, image: usize) -> Result<(), ExportError> {
        let Some(templates) = &self.templates else {
            return Ok(());
        };
        self.state.bind_image(image);
        let layout = &self.settings.layout;
        let mut ctx = RenderContext::new(
            &self.images,
            &mut self.state,
            &self.settings,
            &templates.thumbnail,
            layout.image_page_dir(),
        );
        let html = render_page(&templates.image, &mut ctx);

        let path = layout.image_page(&self.images[image]);
        self.write(&path, html.as_bytes())
    }

    fn save_thumbnail(&mut self, image: usize) -> Result<(), ExportError> {
        let path = self.settings.layout.thumbnail(&self.images[image]);
        if let Some(bytes) = self.images[image].pending_thumbnail.take() {
            self.write(&path, &bytes)?;
        }
        Ok(())
    }

    fn copy_assets(&mut self) -> Result<(), ExportError> {
        let assets = asset_files(&self.options.theme_dir)?;
        for (n, asset) in assets.iter().enumerate() {
            let Some(name) = asset.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let target = self.scratch_path(&self.settings.layout.theme_file(name))?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(asset, &target)?;
            self.progress(n, assets.len());
        }
        Ok(())
    }

    fn transfer(&mut self) -> Result<(), ExportError> {
        let destination = self.options.destination.clone();
        self.emit(ExportEvent::BeginCopy {
            destination: destination.clone(),
        });
        if let Some(scratch) = &self.scratch {
            copy_tree(scratch.path(), &destination).map_err(|source| ExportError::Transfer {
                path: destination.clone(),
                source,
            })?;
        }
        info!(
            "exported {} images on {} pages to {}",
            self.images.len(),
            self.state.page_count,
            destination.display()
        );
        let report = ExportReport::Completed {
            destination,
            images: self.images.len(),
            pages: self.state.page_count,
        };
        self.release();
        self.finish(report);
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn enter(&mut self, phase: Phase) {
        debug!("phase: {}", phase.description());
        self.phase = phase;
        self.emit(ExportEvent::Phase {
            description: phase.description(),
        });
    }

    fn progress(&self, done: usize, total: usize) {
        self.emit(ExportEvent::Progress {
            fraction: (done + 1) as f64 / (total + 1) as f64,
        });
    }

    fn emit(&self, event: ExportEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = events.send(event);
        }
    }

    fn scratch_path(&self, relative: &Path) -> Result<PathBuf, ExportError> {
        self.scratch
            .as_ref()
            .map(|dir| dir.path().join(relative))
            .ok_or_else(|| ExportError::TempDir(io::Error::other("scratch directory missing")))
    }

    fn write(&self, relative: &Path, bytes: &[u8]) -> Result<(), ExportError> {
        let target = self.scratch_path(relative)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        debug!("wrote {}", relative.display());
        Ok(())
    }

    /// Drop per-image state and delete the scratch directory.
    fn release(&mut self) {
        self.images.clear();
        self.templates = None;
        if let Some(scratch) = self.scratch.take() {
            let path = scratch.path().to_path_buf();
            if let Err(e) = scratch.close() {
                warn!("could not remove {}: {e}", path.display());
            }
        }
    }

    fn cancel(&mut self) -> ExportReport {
        info!("export cancelled");
        self.release();
        self.finish(ExportReport::Cancelled);
        ExportReport::Cancelled
    }

    fn finish(&mut self, report: ExportReport) {
        let outcome = match report {
            ExportReport::Completed { .. } => ExportOutcome::Completed,
            ExportReport::Cancelled => ExportOutcome::Cancelled,
        };
        self.phase = Phase::Finished;
        self.report = Some(report);
        self.emit(ExportEvent::Done {
            outcome,
            error: None,
        });
    }
}

/// Copy every file under `from` into `to`, creating directories as needed.
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
