//! Image loading trait and shared types.
//!
//! The exporter never touches pixels directly. Everything goes through the
//! [`ImageLoader`] trait: identify a file, read its embedded metadata, and
//! produce resized JPEG bytes.
//!
//! The production implementation is
//! [`RustLoader`](super::rust_backend::RustLoader), built on the `image` crate.
//! Tests use the recording mock in [`tests`].

use super::embedded::EmbeddedMetadata;
use super::params::ResizeParams;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Source of decoded image information and resized renditions.
pub trait ImageLoader {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, ImagingError>;

    /// Read embedded IPTC/EXIF metadata.
    fn read_metadata(&self, path: &Path) -> Result<EmbeddedMetadata, ImagingError>;

    /// Resize and encode as JPEG, returning the encoded bytes.
    fn resize(&self, params: &ResizeParams) -> Result<Vec<u8>, ImagingError>;
}

impl<L: ImageLoader + ?Sized> ImageLoader for &L {
    fn identify(&self, path: &Path) -> Result<Dimensions, ImagingError> {
        (**self).identify(path)
    }

    fn read_metadata(&self, path: &Path) -> Result<EmbeddedMetadata, ImagingError> {
        (**self).read_metadata(path)
    }

    fn resize(&self, params: &ResizeParams) -> Result<Vec<u8>, ImagingError> {
        (**self).resize(params)
    }
}
