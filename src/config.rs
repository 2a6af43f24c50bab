//! Export configuration.
//!
//! Handles loading, validating, and merging `config.toml`. User files are
//! sparse: they are merged over the stock defaults, so a file only needs the
//! keys it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! index_file = "index.html"   # name of the first index page
//! theme = "classic"           # theme name or directory
//! theme_search_path = ["themes"]
//! # header = "My trip, %d"    # %d expands to the export date
//! # footer = "..."
//! # language = "en"           # defaults to the locale
//!
//! [layout]
//! rows = 4
//! cols = 4
//! single_index = false        # every thumbnail on one index page
//! use_subfolders = true
//!
//! [dirs]
//! previews = "previews"
//! thumbnails = "thumbnails"
//! images = "images"
//! html_images = "html"
//! html_indexes = "html"
//! theme_files = "theme"
//!
//! [thumbnails]
//! width = 100
//! height = 100
//!
//! [previews]
//! max_width = 640
//! max_height = 480
//! min_width = 0
//! min_height = 0
//!
//! [images]
//! copy_originals = false
//! resize = false
//! max_width = 1024
//! max_height = 768
//! quality = 85
//!
//! [sort]
//! method = "none"             # none, manual, name, path, time, size, exif_date, comment
//! order = "ascending"
//!
//! [captions]
//! index = ["image_dim", "file_size"]
//! image = ["comment", "place", "exif_date_time"]
//!
//! [translations]
//! # "Next" = "Suivant"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::album::{SortMethod, SortOrder};
use crate::exporter::ExportOptions;
use crate::imaging::{Dimensions, Quality, SizePolicy};
use crate::layout::{AlbumDirs, Layout};
use crate::variables::{CaptionField, caption_mask};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Export configuration loaded from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub index_file: String,
    pub theme: String,
    pub theme_search_path: Vec<PathBuf>,
    /// Header text; `%d` expands to the export date.
    pub header: Option<String>,
    pub footer: Option<String>,
    /// Language code reported by the `language` tag. Defaults to the locale.
    pub language: Option<String>,
    pub layout: LayoutConfig,
    pub dirs: AlbumDirs,
    pub thumbnails: ThumbnailsConfig,
    pub previews: PreviewsConfig,
    pub images: ImagesConfig,
    pub sort: SortConfig,
    pub captions: CaptionsConfig,
    /// Message catalog for `text` tags.
    pub translations: HashMap<String, String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            index_file: "index.html".to_string(),
            theme: "classic".to_string(),
            theme_search_path: vec![PathBuf::from("themes")],
            header: None,
            footer: None,
            language: None,
            layout: LayoutConfig::default(),
            dirs: AlbumDirs::default(),
            thumbnails: ThumbnailsConfig::default(),
            previews: PreviewsConfig::default(),
            images: ImagesConfig::default(),
            sort: SortConfig::default(),
            captions: CaptionsConfig::default(),
            translations: HashMap::new(),
        }
    }
}

impl ExportConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layout.rows == 0 || self.layout.cols == 0 {
            return Err(ConfigError::Validation(
                "layout.rows and layout.cols must be non-zero".into(),
            ));
        }
        if self.thumbnails.width == 0 || self.thumbnails.height == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.width and thumbnails.height must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.copy_originals
            && self.images.resize
            && (self.images.max_width == 0 || self.images.max_height == 0)
        {
            return Err(ConfigError::Validation(
                "images.max_width and images.max_height must be non-zero when resizing".into(),
            ));
        }
        if self.index_file.trim().is_empty() {
            return Err(ConfigError::Validation(
                "index_file must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Image size bounds for the loader.
    pub fn size_policy(&self) -> SizePolicy {
        let mut policy = SizePolicy {
            thumbnail_max: Dimensions::new(self.thumbnails.width, self.thumbnails.height),
            preview_min: Dimensions::new(self.previews.min_width, self.previews.min_height),
            copy_images: self.images.copy_originals,
            resize_images: self.images.resize,
            image_max: Dimensions::new(self.images.max_width, self.images.max_height),
            quality: Quality::new(self.images.quality),
            ..SizePolicy::default()
        };
        policy.set_preview_max(Dimensions::new(
            self.previews.max_width,
            self.previews.max_height,
        ));
        policy
    }

    pub fn album_layout(&self) -> Layout {
        Layout {
            dirs: self.dirs.clone(),
            index_file: self.index_file.clone(),
            use_subfolders: self.layout.use_subfolders,
            copy_images: self.images.copy_originals,
        }
    }

    /// Exporter options for an album written to `destination` with the
    /// theme in `theme_dir`.
    pub fn export_options(&self, destination: PathBuf, theme_dir: PathBuf) -> ExportOptions {
        ExportOptions {
            destination,
            theme_dir,
            layout: self.album_layout(),
            rows: self.layout.rows,
            cols: self.layout.cols,
            single_index: self.layout.single_index,
            sizes: self.size_policy(),
            sort_method: self.sort.method,
            sort_order: self.sort.order,
            index_caption: caption_mask(&self.captions.index),
            image_caption: caption_mask(&self.captions.image),
            header: self.header.clone(),
            footer: self.footer.clone(),
            language: self.language.clone(),
            translations: self.translations.clone(),
        }
    }
}

/// Index page geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub rows: usize,
    pub cols: usize,
    /// Put every thumbnail on a single index page.
    pub single_index: bool,
    /// Sort generated files into subdirectories. When false everything
    /// lands in the album root.
    pub use_subfolders: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            rows: 4,
            cols: 4,
            single_index: false,
            use_subfolders: true,
        }
    }
}

/// Thumbnail bounding box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
        }
    }
}

/// Preview bounds. A zero maximum links the full image instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewsConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for PreviewsConfig {
    fn default() -> Self {
        Self {
            max_width: 640,
            max_height: 480,
            min_width: 0,
            min_height: 0,
        }
    }
}

/// Handling of the full-size images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Copy originals into the album instead of linking the source files.
    pub copy_originals: bool,
    /// Re-encode copied originals within `max_width` x `max_height`.
    pub resize: bool,
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality (1-100) for every generated image.
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            copy_originals: false,
            resize: false,
            max_width: 1024,
            max_height: 768,
            quality: 85,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SortConfig {
    pub method: SortMethod,
    pub order: SortOrder,
}

/// Caption fields shown on index and image pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptionsConfig {
    pub index: Vec<CaptionField>,
    pub image: Vec<CaptionField>,
}

impl Default for CaptionsConfig {
    fn default() -> Self {
        Self {
            index: vec![CaptionField::ImageDim, CaptionField::FileSize],
            image: vec![
                CaptionField::Comment,
                CaptionField::Place,
                CaptionField::ExifDateTime,
            ],
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ExportConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ExportConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ExportConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, falling back to the defaults when it
/// does not exist.
pub fn load_config(path: &Path) -> Result<ExportConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Web Album Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Name of the first index page. Later pages are page002.html, page003.html...
index_file = "index.html"

# Theme: a directory, or a name looked up in theme_search_path.
theme = "classic"
theme_search_path = ["themes"]

# Text for the header and footer tags. %d expands to the export date.
# header = "Holidays, exported %d"
# footer = ""

# Language code for the language tag. Defaults to LC_ALL / LC_MESSAGES / LANG.
# language = "en"

# ---------------------------------------------------------------------------
# Index pages
# ---------------------------------------------------------------------------
[layout]
rows = 4
cols = 4

# Put every thumbnail on a single index page.
single_index = false

# Sort generated files into the directories below. When false every file
# lands in the album root.
use_subfolders = true

# ---------------------------------------------------------------------------
# Directory names inside the album
# ---------------------------------------------------------------------------
[dirs]
previews = "previews"
thumbnails = "thumbnails"
images = "images"
html_images = "html"
html_indexes = "html"
theme_files = "theme"

# ---------------------------------------------------------------------------
# Thumbnails (bounding box, aspect ratio is kept)
# ---------------------------------------------------------------------------
[thumbnails]
width = 100
height = 100

# ---------------------------------------------------------------------------
# Previews. A preview the size of the image is not written; pages link the
# image instead. Set max to 0 to always link the image.
# ---------------------------------------------------------------------------
[previews]
max_width = 640
max_height = 480
min_width = 0
min_height = 0

# ---------------------------------------------------------------------------
# Full-size images
# ---------------------------------------------------------------------------
[images]
# Copy originals into the album. When false, pages link the source files.
copy_originals = false

# Re-encode copied originals to fit max_width x max_height.
resize = false
max_width = 1024
max_height = 768

# JPEG quality for every generated image (1 = worst, 100 = best).
quality = 85

# ---------------------------------------------------------------------------
# Image order
# ---------------------------------------------------------------------------
[sort]
# none, manual, name, path, time, size, exif_date, comment
method = "none"
# ascending or descending
order = "ascending"

# ---------------------------------------------------------------------------
# Caption fields, exposed to themes as {field}_visibility_index / _image.
# Fields: image_dim, file_name, file_path, file_size, comment, place,
# date_time, exif_date_time, exif_exposure_time, exif_exposure_mode,
# exif_flash, exif_shutter_speed, exif_aperture_value, exif_focal_length,
# exif_camera_model
# ---------------------------------------------------------------------------
[captions]
index = ["image_dim", "file_size"]
image = ["comment", "place", "exif_date_time"]

# ---------------------------------------------------------------------------
# Translations for text tags: "template text" = "replacement"
# ---------------------------------------------------------------------------
[translations]
# "Next" = "Suivant"
"##
}
