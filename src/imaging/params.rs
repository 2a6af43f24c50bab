//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They are the interface
//! between [`operations`](super::operations), which decides which rasters an
//! album needs, and the [`backend`](super::backend), which does the pixel work.
//!
//! - [`Quality`]: JPEG quality (1–100, default 85). Clamped on construction.
//! - [`ResizeParams`]: source file, target dimensions, quality.
//! - [`SizePolicy`]: the configured bounds for thumbnails, previews and copies.

use super::backend::Dimensions;
use std::path::PathBuf;

/// Quality setting for JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Decode `source`, resample to exactly `size`, encode as JPEG.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub size: Dimensions,
    pub quality: Quality,
}

/// Bounds applied while loading each image.
///
/// A zero bound disables that output's scaling, matching how an unset
/// preview size means "use the full image".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePolicy {
    pub thumbnail_max: Dimensions,
    pub preview_max: Dimensions,
    pub preview_min: Dimensions,
    pub copy_images: bool,
    pub resize_images: bool,
    pub image_max: Dimensions,
    pub quality: Quality,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            thumbnail_max: Dimensions::new(100, 100),
            preview_max: Dimensions::new(640, 480),
            preview_min: Dimensions::new(0, 0),
            copy_images: false,
            resize_images: false,
            image_max: Dimensions::new(0, 0),
            quality: Quality::default(),
        }
    }
}

impl SizePolicy {
    /// Set the preview bound. When resized copies are produced the preview
    /// never exceeds them.
    pub fn set_preview_max(&mut self, size: Dimensions) {
        let mut size = size;
        if self.copy_images && self.resize_images && !self.image_max.is_empty() {
            size.width = size.width.min(self.image_max.width);
            size.height = size.height.min(self.image_max.height);
        }
        self.preview_max = size;
    }
}
