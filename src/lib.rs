//! # Web Album
//!
//! Exports a list of photos as a static HTML album whose look is defined by
//! a theme. A theme is three templates (index page, thumbnail cell, image
//! page) plus static files; templates are tag trees interpreted once per
//! output page.
//!
//! # Architecture
//!
//! ```text
//! expr      cells + stack machine          (7 - 3  =>  [7, 3, sub]  =>  4)
//!   ↑
//! template  Tag / Condition / Document     (parsed template tree)
//!   ↑
//! render    walks a Document per page      (if, table, thumbs, per-image tags)
//!   ↑
//! exporter  Load → Sort → Paginate → Parse → Index pages → Image pages
//!           → Thumbnails → Theme files → Transfer
//! ```
//!
//! Expressions never look variables up on their own: the evaluator is handed
//! a [`expr::VarResolver`], and during an export that resolver is the render
//! context, which answers from the exporter's cursors and image list
//! ([`variables`]).
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`expr`] | Cell model, operator set, stack machine, resolver protocol |
//! | [`template`] | Var / Condition / Tag / Document tree and built-in default templates |
//! | [`theme`] | Template parser seam, theme lookup, `set-var` settings, theme assets |
//! | [`render`] | Document evaluator |
//! | [`variables`] | Template variables and caption-field visibility |
//! | [`album`] | Image records, cursors and pagination, sorting, source collection |
//! | [`layout`] | File layout of the album and relative links |
//! | [`exporter`] | The step-wise export pipeline with cancellation and status events |
//! | [`metadata`] | Captions and human readable values |
//! | [`imaging`] | Image loading: identify, EXIF/IPTC, resize to JPEG |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Step-Wise Pipeline
//!
//! [`exporter::WebExporter::step`] does one bounded unit of work (one image,
//! one page) and returns. Cancellation through an
//! [`exporter::InterruptHandle`] is observed between steps, never in the
//! middle of an image, and always ends with the scratch directory removed and
//! a single `Done` event.
//!
//! ## Rendering Never Fails
//!
//! Unknown variables are `0`, tags pointing outside the album render nothing
//! and a broken template is replaced by a built-in default. Only filesystem
//! errors stop an export.
//!
//! ## Scratch Then Transfer
//!
//! Albums are assembled in a temporary directory and copied to the
//! destination as the last step, so an interrupted export leaves the
//! destination untouched.

pub mod album;
pub mod config;
pub mod exporter;
pub mod expr;
pub mod imaging;
pub mod layout;
pub mod metadata;
pub mod output;
pub mod render;
pub mod template;
pub mod theme;
pub mod variables;

#[cfg(test)]
pub(crate) mod test_helpers;
