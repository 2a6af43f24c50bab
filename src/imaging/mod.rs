//! Image loading in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **EXIF / IPTC** | custom reader (JPEG APP1/APP13 + TIFF IFD) |
//! | **Resize → JPEG** | Lanczos3 + `JpegEncoder` |
//!
//! The module is split into:
//! - **Calculations**: pure dimension math (unit testable)
//! - **Parameters**: data structures describing what to produce
//! - **Backend**: [`ImageLoader`] trait + [`RustLoader`]
//! - **Operations**: rendition planning combining calculations + loader

pub mod backend;
mod calculations;
pub mod embedded;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{Dimensions, ImageLoader, ImagingError};
pub use calculations::{fit_within, scale_keeping_ratio, scale_keeping_ratio_min};
pub use embedded::{EmbeddedMetadata, ExifData};
pub use operations::{ImageOutput, RenditionPlan, Renditions, plan_renditions, render_renditions};
pub use params::{Quality, ResizeParams, SizePolicy};
pub use rust_backend::{RustLoader, is_supported_image, supported_input_extensions};
