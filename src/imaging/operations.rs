//! High-level image operations combining calculations with a loader.
//!
//! Each album image yields up to three renditions:
//!
//! | Rendition | Bounds | Written |
//! |---|---|---|
//! | thumbnail | `thumbnail_max` | after the pages are rendered |
//! | preview | `preview_min` … `preview_max` | while loading, unless identical to the image |
//! | image | `image_max` when resizing copies | while loading, only when copying originals |
//!
//! Sizes are planned from the original dimensions by the pure
//! [`plan_renditions`]; [`render_renditions`] then asks the loader for the
//! encoded bytes.

use super::backend::{Dimensions, ImageLoader, ImagingError};
use super::calculations::{scale_keeping_ratio, scale_keeping_ratio_min};
use super::params::{ResizeParams, SizePolicy};
use std::path::Path;

/// Planned rendition sizes for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenditionPlan {
    pub original: Dimensions,
    pub image: Dimensions,
    pub preview: Dimensions,
    pub thumbnail: Dimensions,
    /// The preview would be the same size as the image, so pages link the
    /// image instead and no preview file is written.
    pub no_preview: bool,
}

/// Compute rendition sizes from the original dimensions.
pub fn plan_renditions(original: Dimensions, policy: &SizePolicy) -> RenditionPlan {
    let bounded = |max: Dimensions| {
        if max.is_empty() {
            original
        } else {
            scale_keeping_ratio(original, max, false).unwrap_or(original)
        }
    };

    let image = if policy.copy_images && policy.resize_images {
        bounded(policy.image_max)
    } else {
        original
    };
    let preview = if policy.preview_max.is_empty() {
        original
    } else {
        scale_keeping_ratio_min(original, policy.preview_min, policy.preview_max, false)
            .unwrap_or(original)
    };
    let thumbnail = bounded(policy.thumbnail_max);

    RenditionPlan {
        original,
        image,
        preview,
        thumbnail,
        no_preview: preview == image,
    }
}

/// What happens to the full-size image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutput {
    /// Originals are not copied; pages link the source file.
    Linked,
    /// Copied byte for byte.
    Copied,
    /// Re-encoded at the planned size.
    Resized(Vec<u8>),
}

/// Encoded renditions of one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renditions {
    pub plan: RenditionPlan,
    pub thumbnail: Vec<u8>,
    pub preview: Option<Vec<u8>>,
    pub image: ImageOutput,
}

/// Identify `source` and produce its renditions.
pub fn render_renditions<L>(
    loader: &L,
    source: &Path,
    policy: &SizePolicy,
) -> Result<Renditions, ImagingError>
where
    L: ImageLoader + ?Sized,
{
    let original = loader.identify(source)?;
    let plan = plan_renditions(original, policy);
    let resize = |size: Dimensions| {
        loader.resize(&ResizeParams {
            source: source.to_path_buf(),
            size,
            quality: policy.quality,
        })
    };

    let image = match (policy.copy_images, policy.resize_images) {
        (false, _) => ImageOutput::Linked,
        (true, true) if plan.image != original => ImageOutput::Resized(resize(plan.image)?),
        (true, _) => ImageOutput::Copied,
    };
    let preview = if plan.no_preview {
        None
    } else {
        Some(resize(plan.preview)?)
    };
    let thumbnail = resize(plan.thumbnail)?;

    Ok(Renditions {
        plan,
        thumbnail,
        preview,
        image,
    })
}
