//! Shared test utilities.
//!
//! Builders for image records and template tags, plus on-disk fixtures
//! (source files, theme directories) for exporter tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let images = records(3);
//! let doc = Document::new(vec![tag(TagKind::Table, vec![])]);
//!
//! let tmp = TempDir::new().unwrap();
//! let theme = ThemeBuilder::default()
//!     .thumbnail_json(r#"[{"tag": {"kind": "filename"}}]"#)
//!     .asset("style.css", "body {}")
//!     .write(&tmp.path().join("theme"));
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::album::{ImageRecord, SourceFile};
use crate::imaging::{Dimensions, fit_within};
use crate::template::{Document, Tag, TagKind, Var};
use crate::theme::{IMAGE_TEMPLATE, INDEX_TEMPLATE, THUMBNAIL_TEMPLATE};

// =========================================================================
// Records
// =========================================================================

/// An image record for `/in/{name}` whose destination name is `name`.
///
/// The preview is the image itself and the thumbnail fits 100x100.
pub fn record(name: &str, width: u32, height: u32) -> ImageRecord {
    let size = Dimensions::new(width, height);
    ImageRecord {
        source: PathBuf::from("/in").join(name),
        dest_filename: name.to_string(),
        image: size,
        preview: size,
        thumbnail: fit_within(size, 100),
        no_preview: true,
        ..ImageRecord::default()
    }
}

/// `count` records named `img0.jpg`, `img1.jpg`, ...
pub fn records(count: usize) -> Vec<ImageRecord> {
    (0..count)
        .map(|i| record(&format!("img{i}.jpg"), 800, 600))
        .collect()
}

// =========================================================================
// Tags
// =========================================================================

pub fn tag(kind: TagKind, args: Vec<Var>) -> Tag {
    Tag::with_args(kind, args)
}

pub fn tag_with_body(kind: TagKind, args: Vec<Var>, body: Document) -> Tag {
    Tag::with_body(kind, args, body)
}

// =========================================================================
// Fixture setup
// =========================================================================

/// Write placeholder source files named `names` into `dir`.
///
/// The contents are not images; tests pair them with a mock loader that
/// answers by file name.
pub fn write_sources(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(name), format!("source {name}")).unwrap();
    }
}

/// Source list for `names` inside `dir`, in the given order.
pub fn source_files(dir: &Path, names: &[&str]) -> Vec<SourceFile> {
    names
        .iter()
        .map(|name| SourceFile {
            path: dir.join(name),
        })
        .collect()
}

/// A theme directory written to disk. Templates left unset are not written,
/// so the exporter falls back to its built-in defaults.
#[derive(Debug, Default)]
pub struct ThemeBuilder {
    index: Option<String>,
    thumbnail: Option<String>,
    image: Option<String>,
    assets: Vec<(String, String)>,
}

impl ThemeBuilder {
    pub fn index_json(mut self, json: &str) -> Self {
        self.index = Some(json.to_string());
        self
    }

    pub fn thumbnail_json(mut self, json: &str) -> Self {
        self.thumbnail = Some(json.to_string());
        self
    }

    pub fn image_json(mut self, json: &str) -> Self {
        self.image = Some(json.to_string());
        self
    }

    pub fn asset(mut self, name: &str, contents: &str) -> Self {
        self.assets.push((name.to_string(), contents.to_string()));
        self
    }

    /// Write the theme into `dir` and return it.
    pub fn write(self, dir: &Path) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let templates = [
            (INDEX_TEMPLATE, self.index),
            (THUMBNAIL_TEMPLATE, self.thumbnail),
            (IMAGE_TEMPLATE, self.image),
        ];
        for (name, json) in templates {
            if let Some(json) = json {
                fs::write(dir.join(name), json).unwrap();
            }
        }
        for (name, contents) in &self.assets {
            fs::write(dir.join(name), contents).unwrap();
        }
        dir.to_path_buf()
    }
}
