//! The parsed template tree: documents, tags, conditions and arguments.
//!
//! A theme consists of three templates (index page, thumbnail cell, image
//! page). Each one is a [`Document`]: an ordered list of [`Tag`]s rendered
//! top to bottom.
//!
//! ```text
//! Document
//! ├── Html("<h1>")
//! ├── WithArgs { kind: Header }
//! ├── If
//! │   ├── Condition { guard: pages > 1, body: Document [...] }
//! │   └── Condition { guard: 1,         body: Document [...] }
//! └── WithArgs { kind: Table }
//! ```
//!
//! Ownership is strictly top-down. A tag owns its argument list and its
//! optional child document, and a condition owns its body. Guard and argument
//! expressions sit behind `Rc` because default arguments are shared between
//! tags, and they never change once built.
//!
//! The serialized form of this tree is what the theme loader reads; see
//! [`crate::theme`].

use crate::expr::{Cell, Expr, VarResolver};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Payload of an argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarValue {
    Expr(Rc<Expr>),
    String(String),
}

/// A named argument binding. An unnamed expression models a positional
/// constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Var {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub value: VarValue,
}

impl Var {
    /// An unnamed integer constant.
    pub fn constant(value: i64) -> Self {
        Self {
            name: None,
            value: VarValue::Expr(Rc::new(Expr::constant(value))),
        }
    }

    /// A named integer constant, e.g. `thumbnail=1`.
    pub fn int(name: &str, value: i64) -> Self {
        Self::expr(name, Expr::constant(value))
    }

    pub fn expr(name: &str, expr: Expr) -> Self {
        Self {
            name: Some(name.to_string()),
            value: VarValue::Expr(Rc::new(expr)),
        }
    }

    pub fn string(name: &str, value: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            value: VarValue::String(value.to_string()),
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    /// Integer value. String arguments count as `0`.
    pub fn int_value<R>(&self, resolver: &R) -> i64
    where
        R: VarResolver + ?Sized,
    {
        match &self.value {
            VarValue::Expr(expr) => expr.eval(resolver),
            VarValue::String(_) => 0,
        }
    }

    /// String value.
    ///
    /// Template authors write string arguments unquoted (`class=thumb`), which
    /// the parser stores as an expression whose last cell is a bare variable.
    /// The variable's *name* is the string.
    pub fn str_value(&self) -> Option<&str> {
        match &self.value {
            VarValue::String(s) => Some(s.as_str()),
            VarValue::Expr(expr) => match expr.top() {
                Some(Cell::Var(name)) => Some(name.as_ref()),
                _ => None,
            },
        }
    }
}

/// One arm of an `if` / `else if` / `else` chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub guard: Rc<Expr>,
    pub body: Document,
}

impl Condition {
    pub fn new(guard: Expr, body: Document) -> Self {
        Self {
            guard: Rc::new(guard),
            body,
        }
    }

    /// The trailing `else` arm: a guard that is always true.
    pub fn otherwise(body: Document) -> Self {
        Self::new(Expr::constant(1), body)
    }
}

/// Every tag kind a template can use besides literal HTML and `if`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagKind {
    Header,
    Footer,
    Language,
    ThemeLink,
    Image,
    ImageLink,
    ImageIdx,
    ImageDim,
    Images,
    #[serde(rename = "filename")]
    FileName,
    #[serde(rename = "filepath")]
    FilePath,
    #[serde(rename = "filesize")]
    FileSize,
    Comment,
    Place,
    DateTime,
    PageLink,
    PageIdx,
    PageRows,
    PageCols,
    Pages,
    Table,
    Thumbs,
    Date,
    Text,
    SetVar,
    Eval,
    ExifExposureTime,
    ExifExposureMode,
    ExifFlash,
    ExifShutterSpeed,
    ExifApertureValue,
    ExifFocalLength,
    ExifDateTime,
    ExifCameraModel,
}

impl TagKind {
    /// Name as written by template authors.
    pub fn name(self) -> &'static str {
        match self {
            TagKind::Header => "header",
            TagKind::Footer => "footer",
            TagKind::Language => "language",
            TagKind::ThemeLink => "theme-link",
            TagKind::Image => "image",
            TagKind::ImageLink => "image-link",
            TagKind::ImageIdx => "image-idx",
            TagKind::ImageDim => "image-dim",
            TagKind::Images => "images",
            TagKind::FileName => "filename",
            TagKind::FilePath => "filepath",
            TagKind::FileSize => "filesize",
            TagKind::Comment => "comment",
            TagKind::Place => "place",
            TagKind::DateTime => "date-time",
            TagKind::PageLink => "page-link",
            TagKind::PageIdx => "page-idx",
            TagKind::PageRows => "page-rows",
            TagKind::PageCols => "page-cols",
            TagKind::Pages => "pages",
            TagKind::Table => "table",
            TagKind::Thumbs => "thumbs",
            TagKind::Date => "date",
            TagKind::Text => "text",
            TagKind::SetVar => "set-var",
            TagKind::Eval => "eval",
            TagKind::ExifExposureTime => "exif-exposure-time",
            TagKind::ExifExposureMode => "exif-exposure-mode",
            TagKind::ExifFlash => "exif-flash",
            TagKind::ExifShutterSpeed => "exif-shutter-speed",
            TagKind::ExifApertureValue => "exif-aperture-value",
            TagKind::ExifFocalLength => "exif-focal-length",
            TagKind::ExifDateTime => "exif-date-time",
            TagKind::ExifCameraModel => "exif-camera-model",
        }
    }

    /// Loop tags render the thumbnail template once per cell or image.
    pub fn is_loop(self) -> bool {
        matches!(self, TagKind::Table | TagKind::Thumbs)
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A node of the template tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Html(String),
    If(Vec<Condition>),
    #[serde(rename = "tag")]
    WithArgs {
        kind: TagKind,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Var>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Document>,
    },
}

impl Tag {
    pub fn html(text: impl Into<String>) -> Self {
        Tag::Html(text.into())
    }

    /// An `if` chain. Arms are tried in order; the first nonzero guard wins.
    pub fn if_chain(conditions: Vec<Condition>) -> Self {
        Tag::If(conditions)
    }

    pub fn with_args(kind: TagKind, args: Vec<Var>) -> Self {
        Tag::WithArgs {
            kind,
            args,
            body: None,
        }
    }

    pub fn with_body(kind: TagKind, args: Vec<Var>, body: Document) -> Self {
        Tag::WithArgs {
            kind,
            args,
            body: Some(body),
        }
    }

    pub fn kind(&self) -> Option<TagKind> {
        match self {
            Tag::WithArgs { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn args(&self) -> &[Var] {
        match self {
            Tag::WithArgs { args, .. } => args,
            _ => &[],
        }
    }

    pub fn arg(&self, name: &str) -> Option<&Var> {
        self.args().iter().find(|var| var.is_named(name))
    }

    /// Integer value of a named argument, or `0` when absent.
    pub fn int_arg<R>(&self, name: &str, resolver: &R) -> i64
    where
        R: VarResolver + ?Sized,
    {
        self.arg(name).map_or(0, |var| var.int_value(resolver))
    }

    /// True when the argument is present and evaluates nonzero.
    pub fn flag<R>(&self, name: &str, resolver: &R) -> bool
    where
        R: VarResolver + ?Sized,
    {
        self.int_arg(name, resolver) != 0
    }

    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.arg(name).and_then(Var::str_value)
    }
}

/// An ordered list of tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    pub tags: Vec<Tag>,
}

impl Document {
    pub fn new(tags: Vec<Tag>) -> Self {
        Self { tags }
    }

    pub fn push(&mut self, tag: Tag) {
        self.tags.push(tag);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Index template used when a theme has none: a bare thumbnail table.
    pub fn default_index() -> Self {
        Self::new(vec![Tag::with_args(TagKind::Table, Vec::new())])
    }

    /// Thumbnail-cell template used when a theme has none.
    pub fn default_thumbnail() -> Self {
        Self::new(vec![Tag::with_args(
            TagKind::Image,
            vec![Var::int("idx_relative", 0), Var::int("thumbnail", 1)],
        )])
    }

    /// Image-page template used when a theme has none.
    pub fn default_image() -> Self {
        Self::new(vec![Tag::with_args(
            TagKind::Image,
            vec![Var::int("idx_relative", 0), Var::int("thumbnail", 0)],
        )])
    }

    /// Visit every tag, descending into `if` arms and tag bodies.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Tag, usize)) {
        self.walk_at(0, visit);
    }

    fn walk_at<'a>(&'a self, depth: usize, visit: &mut dyn FnMut(&'a Tag, usize)) {
        for tag in &self.tags {
            visit(tag, depth);
            match tag {
                Tag::If(conditions) => {
                    for condition in conditions {
                        condition.body.walk_at(depth + 1, visit);
                    }
                }
                Tag::WithArgs {
                    body: Some(body), ..
                } => body.walk_at(depth + 1, visit),
                _ => {}
            }
        }
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}
