//! Where every generated file lives inside the album, and how pages link
//! to each other.
//!
//! All album paths are relative to the album root. Links are computed
//! between album paths, so they hold both in the scratch tree the exporter
//! assembles and at the final destination.
//!
//! ```text
//! album/
//! ├── index.html                 # page 1
//! ├── html/
//! │   ├── page002.html           # pages 2..N
//! │   └── 000-dawn.jpg.html      # one page per image
//! ├── thumbnails/000-dawn.jpg.small.jpeg
//! ├── previews/000-dawn.jpg.medium.jpeg
//! ├── images/000-dawn.jpg        # only when copying originals
//! └── theme/                     # static theme files
//! ```
//!
//! With `use_subfolders = false` every file lands in the album root.

use crate::album::ImageRecord;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Characters kept verbatim in a URI path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Directory names inside the album.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlbumDirs {
    pub previews: String,
    pub thumbnails: String,
    pub images: String,
    pub html_images: String,
    pub html_indexes: String,
    pub theme_files: String,
}

impl Default for AlbumDirs {
    fn default() -> Self {
        Self {
            previews: "previews".to_string(),
            thumbnails: "thumbnails".to_string(),
            images: "images".to_string(),
            html_images: "html".to_string(),
            html_indexes: "html".to_string(),
            theme_files: "theme".to_string(),
        }
    }
}

/// A link target: a file inside the album, or a source image linked in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Album(PathBuf),
    Source(PathBuf),
}

impl Location {
    /// URI as written into a page located in album directory `from_dir`.
    pub fn uri_from(&self, from_dir: &Path) -> String {
        match self {
            Location::Album(path) => relative_uri(path, from_dir),
            Location::Source(path) => file_uri(path),
        }
    }

    /// Unescaped path relative to `from_dir`.
    pub fn relative_path_from(&self, from_dir: &Path) -> String {
        match self {
            Location::Album(path) => relative_segments(path, from_dir).join("/"),
            Location::Source(path) => path.display().to_string(),
        }
    }

    /// Full path once the album sits at `destination`.
    pub fn absolute(&self, destination: &Path) -> PathBuf {
        match self {
            Location::Album(path) => destination.join(path),
            Location::Source(path) => path.clone(),
        }
    }
}

/// File layout of one album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub dirs: AlbumDirs,
    pub index_file: String,
    pub use_subfolders: bool,
    pub copy_images: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            dirs: AlbumDirs::default(),
            index_file: "index.html".to_string(),
            use_subfolders: true,
            copy_images: false,
        }
    }
}

impl Layout {
    fn album_file(&self, subdir: &str, filename: &str) -> PathBuf {
        if self.use_subfolders {
            Path::new(subdir).join(filename)
        } else {
            PathBuf::from(filename)
        }
    }

    fn album_dir(&self, subdir: &str) -> PathBuf {
        if self.use_subfolders {
            PathBuf::from(subdir)
        } else {
            PathBuf::new()
        }
    }

    /// Directory holding index page `page` (0-based).
    pub fn index_dir(&self, page: usize) -> PathBuf {
        if page == 0 {
            PathBuf::new()
        } else {
            self.album_dir(&self.dirs.html_indexes)
        }
    }

    /// Index page `page`: the index file first, then `pageNNN.html` numbered from 2.
    pub fn index_page(&self, page: usize) -> PathBuf {
        if page == 0 {
            PathBuf::from(&self.index_file)
        } else {
            self.index_dir(page).join(format!("page{:03}.html", page + 1))
        }
    }

    pub fn image_page_dir(&self) -> PathBuf {
        self.album_dir(&self.dirs.html_images)
    }

    pub fn image_page(&self, record: &ImageRecord) -> PathBuf {
        self.album_file(
            &self.dirs.html_images,
            &format!("{}.html", record.dest_filename),
        )
    }

    pub fn thumbnail(&self, record: &ImageRecord) -> PathBuf {
        self.album_file(
            &self.dirs.thumbnails,
            &format!("{}.small.jpeg", record.dest_filename),
        )
    }

    /// Preview file, or the image itself when the two share a size.
    pub fn preview(&self, record: &ImageRecord) -> Location {
        if record.no_preview {
            self.image(record)
        } else {
            Location::Album(self.album_file(
                &self.dirs.previews,
                &format!("{}.medium.jpeg", record.dest_filename),
            ))
        }
    }

    /// Copied original, or the source file when originals stay in place.
    pub fn image(&self, record: &ImageRecord) -> Location {
        if self.copy_images {
            Location::Album(self.album_file(&self.dirs.images, &record.dest_filename))
        } else {
            Location::Source(record.source.clone())
        }
    }

    pub fn theme_file(&self, name: &str) -> PathBuf {
        self.album_file(&self.dirs.theme_files, name)
    }

    /// Directories to create before anything is written.
    pub fn directories(&self, page_count: usize) -> Vec<PathBuf> {
        if !self.use_subfolders {
            return Vec::new();
        }
        let mut dirs = vec![
            PathBuf::from(&self.dirs.previews),
            PathBuf::from(&self.dirs.thumbnails),
        ];
        if self.copy_images {
            dirs.push(PathBuf::from(&self.dirs.images));
        }
        dirs.push(PathBuf::from(&self.dirs.html_images));
        if page_count > 1 {
            dirs.push(PathBuf::from(&self.dirs.html_indexes));
        }
        dirs.push(PathBuf::from(&self.dirs.theme_files));
        dirs.dedup();
        dirs
    }
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Path segments leading from directory `from_dir` to `target`.
fn relative_segments(target: &Path, from_dir: &Path) -> Vec<String> {
    let target = normal_components(target);
    let from = normal_components(from_dir);
    let common = target
        .iter()
        .zip(&from)
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments = vec!["..".to_string(); from.len() - common];
    segments.extend(target[common..].iter().cloned());
    segments
}

/// Percent-encoded relative URI from album directory `from_dir` to `target`.
pub fn relative_uri(target: &Path, from_dir: &Path) -> String {
    relative_segments(target, from_dir)
        .iter()
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// `file://` URI for an absolute path.
pub fn file_uri(path: &Path) -> String {
    let encoded: Vec<String> = normal_components(path)
        .iter()
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect();
    format!("file:///{}", encoded.join("/"))
}
