//! Caption resolution for album images.
//!
//! Each image exposes three caption strings to templates, computed once when
//! the image is loaded:
//!
//! - **Comment**: sidecar text file with the same stem (`001-dawn.txt` beside
//!   `001-dawn.jpg`), falling back to the IPTC Caption-Abstract. A sidecar is
//!   an explicit override, so it wins over embedded metadata.
//! - **Place**: IPTC Sub-location, falling back to City.
//! - **Date-time**: IPTC Date/Time Created. Shown as a plain date when no
//!   time of day was recorded.
//!
//! The remaining helpers format values the way the rendered pages show them.

use crate::imaging::EmbeddedMetadata;
use chrono::{NaiveDateTime, NaiveTime};
use std::path::Path;

/// Date format used for timestamps on generated pages.
pub const DATE_FORMAT: &str = "%d %B %Y, %H:%M";

/// Date format used when only a calendar date is known.
pub const DAY_FORMAT: &str = "%d %B %Y";

/// Captions computed for one image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captions {
    pub comment: Option<String>,
    pub place: Option<String>,
    pub date_time: Option<String>,
}

/// Resolve a metadata field from multiple sources.
///
/// Takes a list of optional values in priority order and returns the first
/// non-None, non-empty value.
pub fn resolve(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .filter_map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .next()
}

/// Read a sidecar `.txt` file for an image.
///
/// Returns `None` if the file doesn't exist or is empty.
pub fn read_sidecar(image_path: &Path) -> Option<String> {
    let sidecar = image_path.with_extension("txt");
    std::fs::read_to_string(sidecar)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Compute the captions of an image from its sidecar and embedded metadata.
pub fn resolve_captions(image_path: &Path, embedded: &EmbeddedMetadata) -> Captions {
    let sidecar = read_sidecar(image_path);
    Captions {
        comment: resolve(&[sidecar.as_deref(), embedded.caption.as_deref()]),
        place: resolve(&[embedded.sublocation.as_deref(), embedded.city.as_deref()]),
        date_time: embedded.created.map(format_caption_date),
    }
}

pub fn format_caption_date(date: NaiveDateTime) -> String {
    if date.time() == NaiveTime::MIN {
        date.format(DAY_FORMAT).to_string()
    } else {
        date.format(DATE_FORMAT).to_string()
    }
}

/// Human readable byte count: `512 bytes`, `1.5 KB`, `2.0 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} bytes");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Cut `text` to `max_chars` characters, appending `...` when shortened.
/// A limit of zero leaves the text alone.
pub fn truncate_caption(text: &str, max_chars: usize) -> String {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}
