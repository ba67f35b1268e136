//! Language parsing: locating the byte range of a named target inside a source file.
//!
//! Two dialects are recognized by file extension (§4.5): `code` for `.py`-style files with
//! `class`/`def` declarations, `document` for `.tex`-style files with sectioning commands and
//! environments. Both report the same `ParserResult` shape so the replace coordinator and
//! reflow/validate stages never need to know which dialect produced it.

pub mod code;
pub mod document;
pub mod fuzzy;

use crate::encoding::LineEnding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Code,
    Document,
}

impl Dialect {
    pub fn from_extension(path: &str) -> Option<Dialect> {
        let ext = path.rsplit('.').next()?;
        match ext {
            "py" => Some(Dialect::Code),
            "tex" => Some(Dialect::Document),
            _ => None,
        }
    }
}

/// Metadata extracted for a code-dialect target, used by the signature-compatibility checks in
/// §4.7. Empty/default for document-dialect results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetMetadata {
    pub parameters: Vec<String>,
    pub calls_super: bool,
    pub base_classes: Vec<String>,
    pub return_annotation: Option<String>,
}

/// The byte range and surrounding context of a resolved target, shared by both dialects.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserResult {
    pub start: usize,
    pub end: usize,
    pub indentation: String,
    pub decorators: Vec<String>,
    pub leading_comments: Vec<String>,
    pub trailing_comments: Vec<String>,
    pub line_ending: LineEnding,
    pub metadata: TargetMetadata,
}

impl ParserResult {
    pub fn block_text<'a>(&self, content: &'a str) -> &'a str {
        &content[self.start..self.end]
    }
}

/// Collect contiguous decorator lines (`@...`) walking backwards from `header_line_idx`.
pub(crate) fn collect_decorators(lines: &[&str], header_line_idx: usize) -> (usize, Vec<String>) {
    let mut decorators = Vec::new();
    let mut idx = header_line_idx;
    while idx > 0 {
        let candidate = lines[idx - 1];
        if candidate.trim_start().starts_with('@') {
            decorators.insert(0, candidate.to_string());
            idx -= 1;
        } else {
            break;
        }
    }
    (idx, decorators)
}

/// Collect contiguous blank/comment lines walking backwards from `start_line_idx`, stopping at
/// the first other token.
pub(crate) fn collect_leading_comments(
    lines: &[&str],
    start_line_idx: usize,
    comment_prefix: &str,
) -> (usize, Vec<String>) {
    let mut comments = Vec::new();
    let mut idx = start_line_idx;
    while idx > 0 {
        let candidate = lines[idx - 1];
        let trimmed = candidate.trim_start();
        if trimmed.is_empty() || trimmed.starts_with(comment_prefix) {
            comments.insert(0, candidate.to_string());
            idx -= 1;
        } else {
            break;
        }
    }
    (idx, comments)
}

/// Collect contiguous blank/comment lines walking forwards from `end_line_idx` (exclusive).
pub(crate) fn collect_trailing_comments(
    lines: &[&str],
    end_line_idx: usize,
    comment_prefix: &str,
) -> (usize, Vec<String>) {
    let mut comments = Vec::new();
    let mut idx = end_line_idx;
    while idx < lines.len() {
        let candidate = lines[idx];
        let trimmed = candidate.trim_start();
        if trimmed.is_empty() || trimmed.starts_with(comment_prefix) {
            comments.push(candidate.to_string());
            idx += 1;
        } else {
            break;
        }
    }
    (idx, comments)
}
