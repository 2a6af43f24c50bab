//! Named integer variables exposed to template expressions.
//!
//! Every `Var` cell in a guard or argument expression is answered here. The
//! set is closed: counters and cursors, page geometry, raster sizes of the
//! image being evaluated, caption visibility bits and `copy_originals`.
//!
//! | Variable | Value |
//! |---|---|
//! | `image_idx`, `page_idx` | 1-based cursors |
//! | `images`, `pages` | totals |
//! | `page_rows`, `page_cols` | grid geometry |
//! | `image_width` … `thumb_height` | raster size of the evaluated image |
//! | `always`, `index`, `image` | visibility selectors (`0`, `1`, `2`) |
//! | `{field}_visibility_{index,image}` | caption mask bit, nonzero when shown |
//!
//! Anything else resolves to `0` with a warning.

use crate::album::{ExporterState, ImageRecord};
use crate::expr::VarResolver;
use crate::render::{RenderContext, RenderSettings};
use bitflags::bitflags;
use log::warn;
use serde::{Deserialize, Serialize};

/// Visibility selector: caption shown on every page.
pub const VISIBILITY_ALWAYS: i64 = 0;
/// Visibility selector: caption shown on index pages.
pub const VISIBILITY_INDEX: i64 = 1;
/// Visibility selector: caption shown on image pages.
pub const VISIBILITY_IMAGE: i64 = 2;

bitflags! {
    /// Caption fields enabled for a page kind.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CaptionFields: u32 {
        const IMAGE_DIM = 1 << 0;
        const FILE_NAME = 1 << 1;
        const FILE_PATH = 1 << 2;
        const FILE_SIZE = 1 << 3;
        const COMMENT = 1 << 4;
        const PLACE = 1 << 5;
        const DATE_TIME = 1 << 6;
        const EXIF_DATE_TIME = 1 << 7;
        const EXIF_EXPOSURE_TIME = 1 << 8;
        const EXIF_EXPOSURE_MODE = 1 << 9;
        const EXIF_FLASH = 1 << 10;
        const EXIF_SHUTTER_SPEED = 1 << 11;
        const EXIF_APERTURE_VALUE = 1 << 12;
        const EXIF_FOCAL_LENGTH = 1 << 13;
        const EXIF_CAMERA_MODEL = 1 << 14;
    }
}

/// One caption field, as named in configuration and in visibility variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionField {
    ImageDim,
    FileName,
    FilePath,
    FileSize,
    Comment,
    Place,
    DateTime,
    ExifDateTime,
    ExifExposureTime,
    ExifExposureMode,
    ExifFlash,
    ExifShutterSpeed,
    ExifApertureValue,
    ExifFocalLength,
    ExifCameraModel,
}

impl CaptionField {
    pub const ALL: [CaptionField; 15] = [
        CaptionField::ImageDim,
        CaptionField::FileName,
        CaptionField::FilePath,
        CaptionField::FileSize,
        CaptionField::Comment,
        CaptionField::Place,
        CaptionField::DateTime,
        CaptionField::ExifDateTime,
        CaptionField::ExifExposureTime,
        CaptionField::ExifExposureMode,
        CaptionField::ExifFlash,
        CaptionField::ExifShutterSpeed,
        CaptionField::ExifApertureValue,
        CaptionField::ExifFocalLength,
        CaptionField::ExifCameraModel,
    ];

    pub fn flag(self) -> CaptionFields {
        match self {
            CaptionField::ImageDim => CaptionFields::IMAGE_DIM,
            CaptionField::FileName => CaptionFields::FILE_NAME,
            CaptionField::FilePath => CaptionFields::FILE_PATH,
            CaptionField::FileSize => CaptionFields::FILE_SIZE,
            CaptionField::Comment => CaptionFields::COMMENT,
            CaptionField::Place => CaptionFields::PLACE,
            CaptionField::DateTime => CaptionFields::DATE_TIME,
            CaptionField::ExifDateTime => CaptionFields::EXIF_DATE_TIME,
            CaptionField::ExifExposureTime => CaptionFields::EXIF_EXPOSURE_TIME,
            CaptionField::ExifExposureMode => CaptionFields::EXIF_EXPOSURE_MODE,
            CaptionField::ExifFlash => CaptionFields::EXIF_FLASH,
            CaptionField::ExifShutterSpeed => CaptionFields::EXIF_SHUTTER_SPEED,
            CaptionField::ExifApertureValue => CaptionFields::EXIF_APERTURE_VALUE,
            CaptionField::ExifFocalLength => CaptionFields::EXIF_FOCAL_LENGTH,
            CaptionField::ExifCameraModel => CaptionFields::EXIF_CAMERA_MODEL,
        }
    }

    /// Name used in config files and as the prefix of visibility variables.
    pub fn name(self) -> &'static str {
        match self {
            CaptionField::ImageDim => "image_dim",
            CaptionField::FileName => "file_name",
            CaptionField::FilePath => "file_path",
            CaptionField::FileSize => "file_size",
            CaptionField::Comment => "comment",
            CaptionField::Place => "place",
            CaptionField::DateTime => "date_time",
            CaptionField::ExifDateTime => "exif_date_time",
            CaptionField::ExifExposureTime => "exif_exposure_time",
            CaptionField::ExifExposureMode => "exif_exposure_mode",
            CaptionField::ExifFlash => "exif_flash",
            CaptionField::ExifShutterSpeed => "exif_shutter_speed",
            CaptionField::ExifApertureValue => "exif_aperture_value",
            CaptionField::ExifFocalLength => "exif_focal_length",
            CaptionField::ExifCameraModel => "exif_camera_model",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }
}

/// Fold a list of fields into a mask.
pub fn caption_mask(fields: &[CaptionField]) -> CaptionFields {
    fields
        .iter()
        .fold(CaptionFields::empty(), |mask, field| mask | field.flag())
}

/// Value of a caption visibility variable such as `comment_visibility_image`.
///
/// The result is the field's bit when the field is enabled, so callers only
/// rely on it being nonzero.
fn visibility(name: &str, state: &ExporterState) -> Option<i64> {
    let (field, page) = name.rsplit_once("_visibility_")?;
    let field = CaptionField::from_name(field)?;
    let mask = match page {
        "index" => state.index_caption,
        "image" => state.image_caption,
        _ => return None,
    };
    Some(i64::from((mask & field.flag()).bits()))
}

/// Resolve `name` against the export state.
///
/// Raster sizes describe the image most recently bound for evaluation and
/// are `0` while none is.
pub fn lookup(
    name: &str,
    state: &ExporterState,
    images: &[ImageRecord],
    settings: &RenderSettings,
) -> Option<i64> {
    let eval_image = state.eval_image.and_then(|idx| images.get(idx));
    let raster = |pick: fn(&ImageRecord) -> u32| eval_image.map_or(0, |record| i64::from(pick(record)));

    let value = match name {
        "image_idx" => state.image as i64 + 1,
        "images" => state.image_count as i64,
        "page_idx" => state.page as i64 + 1,
        "page_rows" => state.rows as i64,
        "page_cols" => state.cols as i64,
        "pages" => state.page_count as i64,
        "preview_min_width" => i64::from(settings.preview_min.width),
        "preview_min_height" => i64::from(settings.preview_min.height),
        "always" => VISIBILITY_ALWAYS,
        "index" => VISIBILITY_INDEX,
        "image" => VISIBILITY_IMAGE,
        "image_width" => raster(|r| r.image.width),
        "image_height" => raster(|r| r.image.height),
        "preview_width" => raster(|r| r.preview.width),
        "preview_height" => raster(|r| r.preview.height),
        "thumb_width" => raster(|r| r.thumbnail.width),
        "thumb_height" => raster(|r| r.thumbnail.height),
        "copy_originals" => i64::from(settings.layout.copy_images),
        other => return visibility(other, state),
    };
    Some(value)
}

impl VarResolver for RenderContext<'_> {
    fn resolve(&self, name: &str) -> i64 {
        lookup(name, &*self.state, self.images, self.settings).unwrap_or_else(|| {
            warn!("unknown template variable: {name}");
            0
        })
    }
}
