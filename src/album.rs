//! In-memory album: per-image records, pagination cursors and sorting.
//!
//! [`ImageRecord`] is everything the renderer needs to know about one source
//! image once it has been loaded. [`ExporterState`] holds the cursors that
//! loop tags advance and the page geometry frozen by [`ExporterState::paginate`].

use crate::imaging::{Dimensions, ExifData, is_supported_image};
use crate::metadata::Captions;
use crate::variables::CaptionFields;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// An input file selected for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
}

/// Expand `inputs` into the ordered list of images to export.
///
/// Files are taken as given. Directories are walked recursively in path
/// order, keeping only extensions with a decoder. Returned paths are
/// absolute, resolved against the current directory.
pub fn collect_sources(inputs: &[PathBuf]) -> io::Result<Vec<SourceFile>> {
    let mut sources = Vec::new();
    for input in inputs {
        let input = &std::path::absolute(input)?;
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry.map_err(io::Error::other)?;
                if entry.file_type().is_file() && is_supported_image(entry.path()) {
                    sources.push(SourceFile {
                        path: entry.into_path(),
                    });
                }
            }
        } else if input.is_file() {
            sources.push(SourceFile {
                path: input.to_path_buf(),
            });
        } else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("input not found: {}", input.display()),
            ));
        }
    }
    Ok(sources)
}

/// Destination base name: list position and source file name, `007-dawn.jpg`.
pub fn dest_filename(position: usize, source: &Path) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{position:03}-{name}")
}

/// A loaded source image.
#[derive(Debug, Clone, Default)]
pub struct ImageRecord {
    pub source: PathBuf,
    pub dest_filename: String,
    pub file_size: u64,
    pub modified: Option<SystemTime>,
    pub captions: Captions,
    pub exif: ExifData,
    pub image: Dimensions,
    pub preview: Dimensions,
    pub thumbnail: Dimensions,
    /// Preview and image share a size; pages link the image instead.
    pub no_preview: bool,
    /// Encoded thumbnail waiting for the thumbnail phase.
    pub pending_thumbnail: Option<Vec<u8>>,
}

impl ImageRecord {
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Number of index pages for `image_count` images.
///
/// A single index always has one page. Otherwise pages hold `rows * cols`
/// images and the last one may be short.
pub fn page_count(image_count: usize, rows: usize, cols: usize, single_index: bool) -> usize {
    if single_index {
        return 1;
    }
    let per_page = rows * cols;
    if per_page == 0 {
        return 0;
    }
    image_count.div_ceil(per_page)
}

/// Pagination geometry and render cursors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExporterState {
    /// Image cursor, `0..=image_count`.
    pub image: usize,
    /// Page cursor, `0..=page_count`.
    pub page: usize,
    pub image_count: usize,
    pub page_count: usize,
    pub rows: usize,
    pub cols: usize,
    pub index_caption: CaptionFields,
    pub image_caption: CaptionFields,
    pub single_index: bool,
    /// Image whose raster sizes answer `image_width` and friends.
    pub eval_image: Option<usize>,
}

impl ExporterState {
    pub fn new(rows: usize, cols: usize, single_index: bool) -> Self {
        Self {
            rows,
            cols,
            single_index,
            ..Self::default()
        }
    }

    /// Freeze counts and geometry for `image_count` images and rewind the
    /// cursors. With a single index the row count grows to fit every image.
    pub fn paginate(&mut self, image_count: usize) {
        self.image_count = image_count;
        self.cols = self.cols.max(1);
        self.rows = self.rows.max(1);
        if self.single_index {
            self.rows = image_count.div_ceil(self.cols).max(1);
        }
        self.page_count = page_count(image_count, self.rows, self.cols, self.single_index);
        self.image = 0;
        self.page = 0;
        self.eval_image = None;
    }

    pub fn images_per_page(&self) -> usize {
        self.rows * self.cols
    }

    /// Page that lists image `idx`.
    pub fn page_of(&self, idx: usize) -> usize {
        if self.single_index || self.images_per_page() == 0 {
            0
        } else {
            idx / self.images_per_page()
        }
    }

    /// Point the cursors at the start of index page `page`.
    pub fn bind_page(&mut self, page: usize) {
        self.page = page.min(self.page_count);
        self.image = (self.page * self.images_per_page()).min(self.image_count);
        self.eval_image = None;
    }

    /// Point the cursors at image `idx` and the page that lists it.
    pub fn bind_image(&mut self, idx: usize) {
        self.image = idx.min(self.image_count);
        self.page = self.page_of(self.image).min(self.page_count.saturating_sub(1));
        self.eval_image = (self.image < self.image_count).then_some(self.image);
    }

    /// Move past the current image. Returns false once every image is used.
    pub fn advance_image(&mut self) -> bool {
        if self.image < self.image_count {
            self.image += 1;
        }
        self.image < self.image_count
    }

    pub fn has_current_image(&self) -> bool {
        self.image < self.image_count
    }
}

/// Sort key for the image list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMethod {
    #[default]
    None,
    /// The input order is the intended order.
    Manual,
    Name,
    Path,
    Time,
    Size,
    ExifDate,
    Comment,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

fn compare(method: SortMethod, a: &ImageRecord, b: &ImageRecord) -> Ordering {
    match method {
        SortMethod::None | SortMethod::Manual => Ordering::Equal,
        SortMethod::Name => a.file_name().cmp(&b.file_name()),
        SortMethod::Path => a.source.cmp(&b.source),
        SortMethod::Time => a.modified.cmp(&b.modified),
        SortMethod::Size => a.file_size.cmp(&b.file_size),
        SortMethod::ExifDate => a.exif.date_time.cmp(&b.exif.date_time),
        SortMethod::Comment => a.captions.comment.cmp(&b.captions.comment),
    }
}

/// Stable sort by `method`, then reverse for descending order.
pub fn sort_images(images: &mut [ImageRecord], method: SortMethod, order: SortOrder) {
    images.sort_by(|a, b| compare(method, a, b));
    if order == SortOrder::Descending {
        images.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::record;
    use chrono::NaiveDate;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    // =========================================================================
    // Pagination
    // =========================================================================

    #[rstest]
    #[case(10, 2, 3, 2)]
    #[case(12, 2, 3, 2)]
    #[case(13, 2, 3, 3)]
    #[case(1, 4, 4, 1)]
    #[case(16, 4, 4, 1)]
    #[case(17, 4, 4, 2)]
    #[case(0, 4, 4, 0)]
    fn pages_hold_rows_times_cols(
        #[case] images: usize,
        #[case] rows: usize,
        #[case] cols: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(page_count(images, rows, cols, false), expected);
    }

    #[rstest]
    #[case(0, 2, 3)]
    #[case(10, 2, 3)]
    #[case(100, 1, 1)]
    fn single_index_has_one_page(#[case] images: usize, #[case] rows: usize, #[case] cols: usize) {
        assert_eq!(page_count(images, rows, cols, true), 1);
    }

    #[test]
    fn single_index_rows_fit_every_image() {
        let mut state = ExporterState::new(2, 3, true);
        state.paginate(10);
        assert_eq!(state.page_count, 1);
        assert_eq!(state.rows, 4);
        assert!(state.images_per_page() >= 10);
    }

    #[test]
    fn bind_page_moves_image_cursor_to_page_start() {
        let mut state = ExporterState::new(2, 3, false);
        state.paginate(10);
        state.bind_page(1);
        assert_eq!((state.page, state.image), (1, 6));
        state.bind_page(0);
        assert_eq!((state.page, state.image), (0, 0));
    }

    #[test]
    fn bind_image_selects_containing_page() {
        let mut state = ExporterState::new(2, 3, false);
        state.paginate(10);
        state.bind_image(7);
        assert_eq!((state.page, state.image), (1, 7));
        assert_eq!(state.eval_image, Some(7));
        state.bind_image(5);
        assert_eq!(state.page, 0);
    }

    #[test]
    fn advance_stops_at_image_count() {
        let mut state = ExporterState::new(1, 1, false);
        state.paginate(2);
        assert!(state.advance_image());
        assert!(!state.advance_image());
        assert!(!state.advance_image());
        assert_eq!(state.image, 2);
    }

    // =========================================================================
    // Sources
    // =========================================================================

    #[test]
    fn collect_walks_directories_in_path_order() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        for name in ["b.jpg", "a.png", "notes.txt", "sub/c.jpeg"] {
            fs::write(tmp.path().join(name), b"x").unwrap();
        }
        let sources = collect_sources(&[tmp.path().to_path_buf()]).unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|s| s.path.strip_prefix(tmp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.png"),
                PathBuf::from("b.jpg"),
                PathBuf::from("sub/c.jpeg")
            ]
        );
    }

    #[test]
    fn collect_makes_relative_inputs_absolute() {
        let tmp = tempfile::Builder::new()
            .prefix("relative-sources")
            .tempdir_in(".")
            .unwrap();
        fs::write(tmp.path().join("a.jpg"), b"x").unwrap();
        let relative = PathBuf::from(tmp.path().file_name().unwrap());

        let sources = collect_sources(&[relative.clone()]).unwrap();
        let expected = std::env::current_dir().unwrap().join(&relative).join("a.jpg");
        assert_eq!(sources, vec![SourceFile { path: expected.clone() }]);

        let sources = collect_sources(&[relative.join("a.jpg")]).unwrap();
        assert_eq!(sources[0].path, expected);
    }

    #[test]
    fn collect_missing_input_is_error() {
        let result = collect_sources(&[PathBuf::from("/nonexistent/album")]);
        assert!(result.is_err());
    }

    #[test]
    fn dest_names_are_position_prefixed() {
        assert_eq!(dest_filename(7, Path::new("/in/dawn.jpg")), "007-dawn.jpg");
        assert_eq!(dest_filename(123, Path::new("x.png")), "123-x.png");
    }

    // =========================================================================
    // Sorting
    // =========================================================================

    fn names(images: &[ImageRecord]) -> Vec<String> {
        images.iter().map(ImageRecord::file_name).collect()
    }

    #[test]
    fn sort_by_name_and_reverse() {
        let mut images = vec![
            record("b.jpg", 1, 1),
            record("c.jpg", 1, 1),
            record("a.jpg", 1, 1),
        ];
        sort_images(&mut images, SortMethod::Name, SortOrder::Ascending);
        assert_eq!(names(&images), ["a.jpg", "b.jpg", "c.jpg"]);
        sort_images(&mut images, SortMethod::Name, SortOrder::Descending);
        assert_eq!(names(&images), ["c.jpg", "b.jpg", "a.jpg"]);
    }

    #[test]
    fn manual_sort_keeps_input_order() {
        let mut images = vec![record("b.jpg", 1, 1), record("a.jpg", 1, 1)];
        sort_images(&mut images, SortMethod::Manual, SortOrder::Ascending);
        assert_eq!(names(&images), ["b.jpg", "a.jpg"]);
    }

    #[test]
    fn sort_by_size_and_exif_date() {
        let mut big = record("big.jpg", 1, 1);
        big.file_size = 900;
        let mut small = record("small.jpg", 1, 1);
        small.file_size = 10;
        let mut images = vec![big, small];
        sort_images(&mut images, SortMethod::Size, SortOrder::Ascending);
        assert_eq!(names(&images), ["small.jpg", "big.jpg"]);

        let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        images[0].exif.date_time = day.and_hms_opt(12, 0, 0);
        images[1].exif.date_time = day.and_hms_opt(8, 0, 0);
        sort_images(&mut images, SortMethod::ExifDate, SortOrder::Ascending);
        assert_eq!(names(&images), ["big.jpg", "small.jpg"]);
    }
}
