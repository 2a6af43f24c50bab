//! Pure Rust image loader built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` (header only, no full decode) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate decoders |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | EXIF / IPTC | [`embedded`](super::embedded) reader |

use super::backend::{Dimensions, ImageLoader, ImagingError};
use super::embedded::{EmbeddedMetadata, read_embedded};
use super::params::ResizeParams;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, ImageReader};
use std::path::Path;
use std::sync::LazyLock;

const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// True when the path's extension has a decoder.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Loader backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustLoader;

impl RustLoader {
    pub fn new() -> Self {
        Self
    }
}

fn load_image(path: &Path) -> Result<DynamicImage, ImagingError> {
    ImageReader::open(path)
        .map_err(ImagingError::Io)?
        .with_guessed_format()
        .map_err(ImagingError::Io)?
        .decode()
        .map_err(|e| {
            ImagingError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImagingError> {
    let rgb = img.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| ImagingError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
    Ok(bytes)
}

impl ImageLoader for RustLoader {
    fn identify(&self, path: &Path) -> Result<Dimensions, ImagingError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            ImagingError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn read_metadata(&self, path: &Path) -> Result<EmbeddedMetadata, ImagingError> {
        Ok(read_embedded(path))
    }

    fn resize(&self, params: &ResizeParams) -> Result<Vec<u8>, ImagingError> {
        let img = load_image(&params.source)?;
        let resized = if img.width() == params.size.width && img.height() == params.size.height {
            img
        } else {
            img.resize_exact(params.size.width, params.size.height, FilterType::Lanczos3)
        };
        encode_jpeg(&resized, params.quality.value())
    }
}
