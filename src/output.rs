//! CLI output formatting.
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! # Export
//!
//! ```text
//! Loading images
//!     [ 33%]
//!     Skipped broken.jpg: Processing failed: unsupported format
//! Sorting images
//! ...
//! Copying files to destination → album/
//! Done
//! ```
//!
//! # Theme outline
//!
//! ```text
//! index.gthtml
//!     html "<h1>"
//!     header
//!     if
//!         when pages 1 >
//!             page-link idx=[1]
//!     table
//! ```

use crate::exporter::{ExportEvent, ExportOutcome, ExportReport};
use crate::template::{Document, Tag, VarValue};
use std::path::Path;

/// Longest literal shown in an outline before truncation.
const HTML_PREVIEW: usize = 40;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

// ============================================================================
// Export events
// ============================================================================

/// Lines for one exporter status event.
pub fn format_export_event(event: &ExportEvent) -> Vec<String> {
    match event {
        ExportEvent::Phase { description } => vec![description.to_string()],
        ExportEvent::Progress { fraction } => {
            vec![format!("{}[{:>3.0}%]", indent(1), fraction * 100.0)]
        }
        ExportEvent::ImageSkipped { source, reason } => {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.display().to_string());
            vec![format!("{}Skipped {name}: {reason}", indent(1))]
        }
        ExportEvent::BeginCopy { destination } => {
            vec![format!("Copying files to destination → {}", destination.display())]
        }
        ExportEvent::Done { outcome, error } => match (outcome, error) {
            (ExportOutcome::Completed, _) => vec!["Done".to_string()],
            (ExportOutcome::Cancelled, _) => vec!["Cancelled".to_string()],
            (ExportOutcome::Failed, Some(error)) => vec![format!("Failed: {error}")],
            (ExportOutcome::Failed, None) => vec!["Failed".to_string()],
        },
    }
}

/// Summary line printed after the export returns.
pub fn format_export_report(report: &ExportReport) -> Vec<String> {
    match report {
        ExportReport::Completed {
            destination,
            images,
            pages,
        } => vec![format!(
            "Exported {images} image{} on {pages} index page{} to {}",
            if *images == 1 { "" } else { "s" },
            if *pages == 1 { "" } else { "s" },
            destination.display()
        )],
        ExportReport::Cancelled => vec!["Export cancelled".to_string()],
    }
}

pub fn print_export_report(report: &ExportReport) {
    for line in format_export_report(report) {
        println!("{line}");
    }
}

// ============================================================================
// Theme outline
// ============================================================================

fn describe_args(tag: &Tag) -> String {
    tag.args()
        .iter()
        .map(|var| {
            let value = match &var.value {
                VarValue::Expr(expr) => format!("[{expr}]"),
                VarValue::String(s) => format!("{s:?}"),
            };
            match &var.name {
                Some(name) => format!(" {name}={value}"),
                None => format!(" {value}"),
            }
        })
        .collect()
}

fn outline_document(document: &Document, depth: usize, lines: &mut Vec<String>) {
    for tag in document {
        match tag {
            Tag::Html(text) => lines.push(format!(
                "{}html {:?}",
                indent(depth),
                truncate(text.trim(), HTML_PREVIEW)
            )),
            Tag::If(conditions) => {
                lines.push(format!("{}if", indent(depth)));
                for condition in conditions {
                    lines.push(format!("{}when {}", indent(depth + 1), condition.guard));
                    outline_document(&condition.body, depth + 2, lines);
                }
            }
            Tag::WithArgs { kind, body, .. } => {
                lines.push(format!("{}{}{}", indent(depth), kind.name(), describe_args(tag)));
                if let Some(body) = body {
                    outline_document(body, depth + 1, lines);
                }
            }
        }
    }
}

/// Tag-tree outline of one template, expressions shown in postfix order.
pub fn format_outline(name: &str, document: &Document) -> Vec<String> {
    let mut lines = vec![name.to_string()];
    if document.is_empty() {
        lines.push(format!("{}(empty)", indent(1)));
    }
    outline_document(document, 1, &mut lines);
    lines
}

/// Outline of a template that could not be read.
pub fn format_template_error(name: &str, path: &Path, error: &dyn std::error::Error) -> Vec<String> {
    vec![
        name.to_string(),
        format!("{}{}: {error}", indent(1), path.display()),
        format!("{}(the built-in default is used)", indent(1)),
    ]
}

pub fn print_outline(name: &str, document: &Document) {
    for line in format_outline(name, document) {
        println!("{line}");
    }
}
