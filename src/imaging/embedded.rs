//! Minimal EXIF and IPTC-IIM reader for JPEG and TIFF files.
//!
//! Album captions and the `exif-*` template tags need a handful of fields:
//!
//! | Source | Field | Used for |
//! |---|---|---|
//! | IPTC 2:120 | Caption-Abstract | `comment` fallback |
//! | IPTC 2:92 / 2:90 | Sub-location / City | `place` |
//! | IPTC 2:55 + 2:60 | Date / Time Created | `date-time` |
//! | EXIF 0x829A | ExposureTime | `exif-exposure-time` |
//! | EXIF 0xA402 | ExposureMode | `exif-exposure-mode` |
//! | EXIF 0x9209 | Flash | `exif-flash` |
//! | EXIF 0x9201 | ShutterSpeedValue (APEX) | `exif-shutter-speed` |
//! | EXIF 0x829D / 0x9202 | FNumber / ApertureValue | `exif-aperture-value` |
//! | EXIF 0x920A | FocalLength | `exif-focal-length` |
//! | EXIF 0x9003 | DateTimeOriginal | `exif-date-time`, date sorting |
//! | TIFF 0x010F / 0x0110 | Make / Model | `exif-camera-model` |
//!
//! For JPEG, EXIF lives in APP1 (`Exif\0\0` + TIFF structure) and IPTC in
//! APP13 (Photoshop 8BIM resource 0x0404). For TIFF, both hang off IFD0.
//!
//! Every read is bounds-checked; malformed files yield empty metadata.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::path::Path;

/// Metadata embedded in an image file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedMetadata {
    pub caption: Option<String>,
    pub city: Option<String>,
    pub sublocation: Option<String>,
    pub created: Option<NaiveDateTime>,
    pub exif: ExifData,
}

/// EXIF fields rendered by the `exif-*` tags, already formatted for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifData {
    pub exposure_time: Option<String>,
    pub exposure_mode: Option<String>,
    pub flash: Option<String>,
    pub shutter_speed: Option<String>,
    pub aperture: Option<String>,
    pub focal_length: Option<String>,
    pub date_time: Option<NaiveDateTime>,
    pub make: Option<String>,
    pub model: Option<String>,
}

/// Read embedded metadata from a file, dispatching by extension.
/// Returns empty metadata on any read or parse failure.
pub fn read_embedded(path: &Path) -> EmbeddedMetadata {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(_) => return EmbeddedMetadata::default(),
    };

    match ext.as_str() {
        "jpg" | "jpeg" => read_from_jpeg(&bytes),
        "tif" | "tiff" => read_from_tiff(&bytes),
        _ => EmbeddedMetadata::default(),
    }
}

// ---------------------------------------------------------------------------
// JPEG segments
// ---------------------------------------------------------------------------

const EXIF_HEADER: &[u8] = b"Exif\0\0";
const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const BIM_MARKER: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;

const APP1: u8 = 0xE1;
const APP13: u8 = 0xED;
const SOS: u8 = 0xDA;

/// Iterate `(marker, payload)` pairs of the JPEG header segments, stopping at
/// start-of-scan.
fn jpeg_segments(data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut pos = if data.starts_with(&[0xFF, 0xD8]) {
        2
    } else {
        data.len()
    };
    std::iter::from_fn(move || {
        loop {
            if pos + 4 > data.len() || data[pos] != 0xFF {
                return None;
            }
            let marker = data[pos + 1];
            // Fill bytes and parameterless markers
            if marker == 0xFF {
                pos += 1;
                continue;
            }
            if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
                pos += 2;
                continue;
            }
            if marker == SOS || marker == 0xD9 {
                return None;
            }
            let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
            if len < 2 {
                return None;
            }
            let start = pos + 4;
            let end = (pos + 2 + len).min(data.len());
            pos += 2 + len;
            return Some((marker, &data[start..end]));
        }
    })
}

fn read_from_jpeg(data: &[u8]) -> EmbeddedMetadata {
    let mut meta = EmbeddedMetadata::default();
    for (marker, payload) in jpeg_segments(data) {
        match marker {
            APP1 if payload.starts_with(EXIF_HEADER) => {
                if let Some(tiff) = TiffReader::new(&payload[EXIF_HEADER.len()..]) {
                    meta.exif = tiff.exif();
                }
            }
            APP13 => {
                if let Some(iim) = extract_iptc_from_8bim(payload) {
                    apply_iptc(&mut meta, iim);
                }
            }
            _ => {}
        }
    }
    meta
}

fn read_from_tiff(data: &[u8]) -> EmbeddedMetadata {
    let mut meta = EmbeddedMetadata::default();
    let Some(tiff) = TiffReader::new(data) else {
        return meta;
    };
    meta.exif = tiff.exif();
    if let Some(ifd0) = tiff.first_ifd() {
        // 33723: IPTC-NAA raw bytes; 34377: Photoshop resources
        if let Some(iim) = tiff.find(ifd0, 33723).and_then(|e| tiff.bytes(&e)) {
            apply_iptc(&mut meta, iim);
        } else if let Some(iim) = tiff
            .find(ifd0, 34377)
            .and_then(|e| tiff.bytes(&e))
            .and_then(extract_iptc_from_8bim)
        {
            apply_iptc(&mut meta, iim);
        }
    }
    meta
}

// ---------------------------------------------------------------------------
// IPTC-IIM
// ---------------------------------------------------------------------------

/// Extract IPTC-IIM bytes from a Photoshop 8BIM resource block.
fn extract_iptc_from_8bim(segment: &[u8]) -> Option<&[u8]> {
    let data = segment.strip_prefix(PHOTOSHOP_HEADER).unwrap_or(segment);

    let mut pos = 0;
    while pos + 12 <= data.len() {
        // "8BIM" (4) + resource id (2) + pascal name (padded to even) + size (4) + data
        if &data[pos..pos + 4] != BIM_MARKER {
            pos += 1;
            continue;
        }
        let resource_id = u16::from_be_bytes([data[pos + 4], data[pos + 5]]);
        let name_len = data[pos + 6] as usize;
        pos += 6 + 1 + name_len + ((1 + name_len) % 2);

        let size_bytes = data.get(pos..pos + 4)?;
        let res_len = u32::from_be_bytes([
            size_bytes[0],
            size_bytes[1],
            size_bytes[2],
            size_bytes[3],
        ]) as usize;
        pos += 4;

        let body = data.get(pos..pos + res_len)?;
        if resource_id == IPTC_RESOURCE_ID {
            return Some(body);
        }
        pos += res_len + (res_len % 2);
    }
    None
}

/// Iterate `(dataset, value)` pairs of IPTC record 2.
fn iptc_datasets(data: &[u8]) -> impl Iterator<Item = (u8, String)> + '_ {
    let mut pos = 0;
    std::iter::from_fn(move || {
        while pos + 5 <= data.len() {
            if data[pos] != 0x1C {
                pos += 1;
                continue;
            }
            let record = data[pos + 1];
            let dataset = data[pos + 2];
            let length = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as usize;
            pos += 5;
            let value = data.get(pos..pos + length)?;
            pos += length;
            if record == 2 {
                let text = String::from_utf8_lossy(value).trim().to_string();
                if !text.is_empty() {
                    return Some((dataset, text));
                }
            }
        }
        None
    })
}

fn apply_iptc(meta: &mut EmbeddedMetadata, data: &[u8]) {
    let mut date = None;
    let mut time = None;
    for (dataset, value) in iptc_datasets(data) {
        match dataset {
            55 => date = NaiveDate::parse_from_str(&value, "%Y%m%d").ok(),
            // HHMMSS followed by an optional zone offset
            60 => time = value.get(..6).and_then(|t| NaiveTime::parse_from_str(t, "%H%M%S").ok()),
            90 => meta.city = Some(value),
            92 => meta.sublocation = Some(value),
            120 => meta.caption = Some(value),
            _ => {}
        }
    }
    if let Some(date) = date {
        meta.created = Some(date.and_time(time.unwrap_or(NaiveTime::MIN)));
    }
}

// ---------------------------------------------------------------------------
// TIFF / EXIF
// ---------------------------------------------------------------------------

const TAG_MAKE: u16 = 0x010F;
const TAG_MODEL: u16 = 0x0110;
const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_EXPOSURE_TIME: u16 = 0x829A;
const TAG_F_NUMBER: u16 = 0x829D;
const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
const TAG_SHUTTER_SPEED: u16 = 0x9201;
const TAG_APERTURE: u16 = 0x9202;
const TAG_FLASH: u16 = 0x9209;
const TAG_FOCAL_LENGTH: u16 = 0x920A;
const TAG_EXPOSURE_MODE: u16 = 0xA402;

#[derive(Debug, Clone, Copy)]
struct IfdEntry {
    typ: u16,
    count: usize,
    /// Offset of the 4-byte value/offset field.
    field: usize,
}

/// Bounds-checked reader over a TIFF structure.
struct TiffReader<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl<'a> TiffReader<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        let big_endian = match data.get(0..2)? {
            b"MM" => true,
            b"II" => false,
            _ => return None,
        };
        let reader = Self { data, big_endian };
        (reader.u16(2)? == 42).then_some(reader)
    }

    fn u16(&self, offset: usize) -> Option<u16> {
        let b = self.data.get(offset..offset + 2)?;
        Some(if self.big_endian {
            u16::from_be_bytes([b[0], b[1]])
        } else {
            u16::from_le_bytes([b[0], b[1]])
        })
    }

    fn u32(&self, offset: usize) -> Option<u32> {
        let b = self.data.get(offset..offset + 4)?;
        let bytes = [b[0], b[1], b[2], b[3]];
        Some(if self.big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    fn first_ifd(&self) -> Option<usize> {
        self.u32(4).map(|o| o as usize)
    }

    fn find(&self, ifd: usize, tag: u16) -> Option<IfdEntry> {
        let count = self.u16(ifd)? as usize;
        (0..count).find_map(|i| {
            let entry = ifd + 2 + i * 12;
            (self.u16(entry)? == tag).then_some(())?;
            Some(IfdEntry {
                typ: self.u16(entry + 2)?,
                count: self.u32(entry + 4)? as usize,
                field: entry + 8,
            })
        })
    }

    /// Raw value bytes, inline when they fit in four bytes.
    fn bytes(&self, entry: &IfdEntry) -> Option<&'a [u8]> {
        let size = match entry.typ {
            1 | 2 | 6 | 7 => 1,
            3 | 8 => 2,
            4 | 9 | 11 => 4,
            5 | 10 | 12 => 8,
            _ => return None,
        };
        let len = entry.count.checked_mul(size)?;
        let start = if len <= 4 {
            entry.field
        } else {
            self.u32(entry.field)? as usize
        };
        self.data.get(start..start.checked_add(len)?)
    }

    fn short(&self, ifd: usize, tag: u16) -> Option<u16> {
        let entry = self.find(ifd, tag)?;
        match entry.typ {
            3 => self.u16(entry.field),
            4 => self.u32(entry.field).map(|v| v as u16),
            _ => None,
        }
    }

    fn rational(&self, ifd: usize, tag: u16) -> Option<f64> {
        let entry = self.find(ifd, tag)?;
        let offset = self.u32(entry.field)? as usize;
        let num = self.u32(offset)?;
        let den = self.u32(offset + 4)?;
        if den == 0 {
            return None;
        }
        Some(match entry.typ {
            5 => f64::from(num) / f64::from(den),
            10 => f64::from(num as i32) / f64::from(den as i32),
            _ => return None,
        })
    }

    fn ascii(&self, ifd: usize, tag: u16) -> Option<String> {
        let entry = self.find(ifd, tag)?;
        if entry.typ != 2 {
            return None;
        }
        let raw = self.bytes(&entry)?;
        let text = String::from_utf8_lossy(raw)
            .trim_end_matches('\0')
            .trim()
            .to_string();
        (!text.is_empty()).then_some(text)
    }

    fn exif(&self) -> ExifData {
        let Some(ifd0) = self.first_ifd() else {
            return ExifData::default();
        };
        let mut exif = ExifData {
            make: self.ascii(ifd0, TAG_MAKE),
            model: self.ascii(ifd0, TAG_MODEL),
            ..ExifData::default()
        };
        let Some(sub) = self.short_or_long(ifd0, TAG_EXIF_IFD) else {
            return exif;
        };

        exif.exposure_time = self
            .rational(sub, TAG_EXPOSURE_TIME)
            .and_then(format_exposure);
        exif.exposure_mode = self.short(sub, TAG_EXPOSURE_MODE).map(|mode| {
            let label = match mode {
                0 => "Auto",
                1 => "Manual",
                2 => "Auto bracket",
                _ => "Unknown",
            };
            label.to_string()
        });
        exif.flash = self.short(sub, TAG_FLASH).map(|flash| {
            let label = if flash & 1 != 0 { "Fired" } else { "No flash" };
            label.to_string()
        });
        exif.shutter_speed = self
            .rational(sub, TAG_SHUTTER_SPEED)
            .and_then(|apex| format_exposure(2f64.powf(-apex)));
        exif.aperture = self
            .rational(sub, TAG_F_NUMBER)
            .or_else(|| {
                self.rational(sub, TAG_APERTURE)
                    .map(|apex| 2f64.powf(apex / 2.0))
            })
            .filter(|f| *f > 0.0)
            .map(|f| format!("f/{f:.1}"));
        exif.focal_length = self
            .rational(sub, TAG_FOCAL_LENGTH)
            .filter(|mm| *mm > 0.0)
            .map(|mm| format!("{mm:.1} mm"));
        exif.date_time = self
            .ascii(sub, TAG_DATE_TIME_ORIGINAL)
            .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y:%m:%d %H:%M:%S").ok());
        exif
    }

    fn short_or_long(&self, ifd: usize, tag: u16) -> Option<usize> {
        let entry = self.find(ifd, tag)?;
        match entry.typ {
            3 => self.u16(entry.field).map(usize::from),
            _ => self.u32(entry.field).map(|v| v as usize),
        }
    }
}

/// `1/250 s` below one second, `2.5 s` above.
fn format_exposure(seconds: f64) -> Option<String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Some(if seconds < 1.0 {
        format!("1/{} s", (1.0 / seconds).round() as u64)
    } else {
        let text = format!("{seconds:.1}");
        format!("{} s", text.trim_end_matches(".0"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Little-endian TIFF with IFD0 (Make, Model, ExifIFD) and an EXIF IFD.
    fn build_exif_tiff() -> Vec<u8> {
        let mut t = Vec::new();
        t.extend_from_slice(b"II");
        t.extend_from_slice(&42u16.to_le_bytes());
        t.extend_from_slice(&8u32.to_le_bytes());

        // IFD0 at 8: 3 entries → ends at 8 + 2 + 36 + 4 = 50
        let make_off = 50u32; // "Canon\0" (6)
        let model_off = 56u32; // "EOS 5D\0" (7) → 63, pad to 64
        let exif_ifd = 64u32;
        let push_entry = |t: &mut Vec<u8>, tag: u16, typ: u16, count: u32, value: u32| {
            t.extend_from_slice(&tag.to_le_bytes());
            t.extend_from_slice(&typ.to_le_bytes());
            t.extend_from_slice(&count.to_le_bytes());
            t.extend_from_slice(&value.to_le_bytes());
        };
        t.extend_from_slice(&3u16.to_le_bytes());
        push_entry(&mut t, TAG_MAKE, 2, 6, make_off);
        push_entry(&mut t, TAG_MODEL, 2, 7, model_off);
        push_entry(&mut t, TAG_EXIF_IFD, 4, 1, exif_ifd);
        t.extend_from_slice(&0u32.to_le_bytes());
        t.extend_from_slice(b"Canon\0");
        t.extend_from_slice(b"EOS 5D\0\0");
        assert_eq!(t.len(), 64);

        // EXIF IFD at 64: 5 entries → 64 + 2 + 60 + 4 = 130
        let exposure_off = 130u32;
        let fnumber_off = 138u32;
        let focal_off = 146u32;
        let date_off = 154u32;
        t.extend_from_slice(&5u16.to_le_bytes());
        push_entry(&mut t, TAG_EXPOSURE_TIME, 5, 1, exposure_off);
        push_entry(&mut t, TAG_F_NUMBER, 5, 1, fnumber_off);
        push_entry(&mut t, TAG_DATE_TIME_ORIGINAL, 2, 20, date_off);
        push_entry(&mut t, TAG_FLASH, 3, 1, 1);
        push_entry(&mut t, TAG_FOCAL_LENGTH, 5, 1, focal_off);
        t.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(t.len(), 130);
        for (num, den) in [(1u32, 250u32), (28, 10), (50, 1)] {
            t.extend_from_slice(&num.to_le_bytes());
            t.extend_from_slice(&den.to_le_bytes());
        }
        t.extend_from_slice(b"2024:06:01 18:30:00\0");
        t
    }

    fn iptc_dataset(dataset: u8, value: &[u8]) -> Vec<u8> {
        let mut d = vec![0x1C, 0x02, dataset];
        d.extend_from_slice(&(value.len() as u16).to_be_bytes());
        d.extend_from_slice(value);
        d
    }

    fn build_app13(iim: &[u8]) -> Vec<u8> {
        let mut seg = PHOTOSHOP_HEADER.to_vec();
        seg.extend_from_slice(BIM_MARKER);
        seg.extend_from_slice(&IPTC_RESOURCE_ID.to_be_bytes());
        seg.extend_from_slice(&[0, 0]); // empty pascal name, padded
        seg.extend_from_slice(&(iim.len() as u32).to_be_bytes());
        seg.extend_from_slice(iim);
        seg
    }

    fn build_jpeg(segments: &[(u8, Vec<u8>)]) -> Vec<u8> {
        let mut jpeg = vec![0xFF, 0xD8];
        for (marker, payload) in segments {
            jpeg.extend_from_slice(&[0xFF, *marker]);
            jpeg.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
            jpeg.extend_from_slice(payload);
        }
        jpeg.extend_from_slice(&[0xFF, SOS, 0x00, 0x02, 0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn exif_fields_from_tiff_structure() {
        let tiff = build_exif_tiff();
        let exif = TiffReader::new(&tiff).unwrap().exif();
        assert_eq!(exif.make.as_deref(), Some("Canon"));
        assert_eq!(exif.model.as_deref(), Some("EOS 5D"));
        assert_eq!(exif.exposure_time.as_deref(), Some("1/250 s"));
        assert_eq!(exif.aperture.as_deref(), Some("f/2.8"));
        assert_eq!(exif.focal_length.as_deref(), Some("50.0 mm"));
        assert_eq!(exif.flash.as_deref(), Some("Fired"));
        assert_eq!(exif.exposure_mode, None);
        assert_eq!(
            exif.date_time,
            NaiveDateTime::parse_from_str("2024-06-01 18:30:00", "%Y-%m-%d %H:%M:%S").ok()
        );
    }

    #[test]
    fn jpeg_with_exif_and_iptc() {
        let mut app1 = EXIF_HEADER.to_vec();
        app1.extend_from_slice(&build_exif_tiff());
        let mut iim = iptc_dataset(120, b"Harbour at dusk");
        iim.extend(iptc_dataset(90, b"Genova"));
        iim.extend(iptc_dataset(55, b"20230415"));
        iim.extend(iptc_dataset(60, b"101500+0200"));
        let jpeg = build_jpeg(&[(APP1, app1), (APP13, build_app13(&iim))]);

        let meta = read_from_jpeg(&jpeg);
        assert_eq!(meta.caption.as_deref(), Some("Harbour at dusk"));
        assert_eq!(meta.city.as_deref(), Some("Genova"));
        assert_eq!(
            meta.created.map(|d| d.to_string()).as_deref(),
            Some("2023-04-15 10:15:00")
        );
        assert_eq!(meta.exif.model.as_deref(), Some("EOS 5D"));
    }

    #[test]
    fn iptc_date_without_time_is_midnight() {
        let mut meta = EmbeddedMetadata::default();
        apply_iptc(&mut meta, &iptc_dataset(55, b"19991231"));
        assert_eq!(
            meta.created.map(|d| d.to_string()).as_deref(),
            Some("1999-12-31 00:00:00")
        );
    }

    #[test]
    fn iptc_skips_other_records() {
        let data = [0x1C, 0x01, 0x78, 0x00, 0x03, b'f', b'o', b'o'];
        let mut meta = EmbeddedMetadata::default();
        apply_iptc(&mut meta, &data);
        assert_eq!(meta, EmbeddedMetadata::default());
    }

    #[test]
    fn truncated_structures_do_not_panic() {
        let tiff = build_exif_tiff();
        for cut in [0, 3, 9, 40, 70, 131, 150] {
            let _ = TiffReader::new(&tiff[..cut]).map(|r| r.exif());
        }
        let jpeg = build_jpeg(&[(APP13, build_app13(&iptc_dataset(120, b"x")))]);
        for cut in [0, 2, 5, 20, 30] {
            let _ = read_from_jpeg(&jpeg[..cut]);
        }
    }

    #[test]
    fn exposure_formatting() {
        assert_eq!(format_exposure(0.004).as_deref(), Some("1/250 s"));
        assert_eq!(format_exposure(2.0).as_deref(), Some("2 s"));
        assert_eq!(format_exposure(2.5).as_deref(), Some("2.5 s"));
        assert_eq!(format_exposure(0.0), None);
    }

    #[test]
    fn read_embedded_nonexistent_file() {
        assert_eq!(
            read_embedded(Path::new("/nonexistent/image.jpg")),
            EmbeddedMetadata::default()
        );
    }

    #[test]
    fn read_embedded_unsupported_extension() {
        assert_eq!(
            read_embedded(Path::new("/some/file.bmp")),
            EmbeddedMetadata::default()
        );
    }
}
