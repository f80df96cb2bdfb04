//! Source locations (spec.md S3 "Source location").
//!
//! A location is four 1-indexed integers plus an optional `path` tag: the
//! origin fragment's `executionEventId`, attached by the program builder
//! (component G) so that identical `(line, column)` ranges coming from two
//! different cells never compare equal.

use ruff_text_size::Ranged;
use std::sync::Arc;

/// A half-open-by-convention textual range: `(first_line, first_column)` to
/// `(last_line, last_column)`, 1-indexed, plus an optional fragment tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct SourceLocation {
    pub first_line: u32,
    pub first_column: u32,
    pub last_line: u32,
    pub last_column: u32,
    pub path: Option<Arc<str>>,
}

impl SourceLocation {
    pub fn new(first_line: u32, first_column: u32, last_line: u32, last_column: u32) -> Self {
        Self { first_line, first_column, last_line, last_column, path: None }
    }

    pub fn with_path(mut self, path: impl Into<Arc<str>>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Identity ignoring the path, used when two locations are known to
    /// originate from the same fragment and only the numeric range matters.
    pub fn numeric_key(&self) -> (u32, u32, u32, u32) {
        (self.first_line, self.first_column, self.last_line, self.last_column)
    }

    /// Canonical string used to key the def/use cache (spec.md S3 invariant:
    /// "keyed by the canonical location string").
    pub fn canonical_key(&self) -> String {
        match &self.path {
            Some(p) => format!("{p}:{}:{}-{}:{}", self.first_line, self.first_column, self.last_line, self.last_column),
            None => format!("{}:{}-{}:{}", self.first_line, self.first_column, self.last_line, self.last_column),
        }
    }

    /// Textual nesting: `self` fully encloses `other`.
    pub fn contains(&self, other: &SourceLocation) -> bool {
        if self.path != other.path {
            return false;
        }
        let starts_after_or_at = (self.first_line, self.first_column) <= (other.first_line, other.first_column);
        let ends_before_or_at = (other.last_line, other.last_column) <= (self.last_line, self.last_column);
        starts_after_or_at && ends_before_or_at
    }

    /// Textual overlap or nesting in either direction.
    pub fn intersects(&self, other: &SourceLocation) -> bool {
        if self.path != other.path {
            return false;
        }
        let self_starts_before_other_ends = (self.first_line, self.first_column) <= (other.last_line, other.last_column);
        let other_starts_before_self_ends = (other.first_line, other.first_column) <= (self.last_line, self.last_column);
        self_starts_before_other_ends && other_starts_before_self_ends
    }

    /// Shift every line number by `delta`, used when the program builder
    /// concatenates fragments into a single virtual program.
    pub fn shifted(&self, delta: u32) -> Self {
        Self {
            first_line: self.first_line + delta,
            last_line: self.last_line + delta,
            ..self.clone()
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}:{}", self.first_line, self.first_column, self.last_line, self.last_column)
    }
}

/// Converts byte offsets from `ruff_text_size` into 1-indexed `(line,
/// column)` pairs. Built once per cell's source text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line (line 0's start is always 0).
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Returns 1-indexed `(line, column)` for a byte offset.
    pub fn line_column(&self, offset: u32) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts[line_idx];
        (line_idx as u32 + 1, offset - line_start)
    }

    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    /// Converts a node's byte range into a `SourceLocation`, tagging it with
    /// `path` if given. Shared by every parsed fragment (`ParsedModule`,
    /// `Program`) so the line/column math lives in exactly one place.
    pub fn location_of(&self, node: &impl Ranged, path: Option<&Arc<str>>) -> SourceLocation {
        let range = node.range();
        let (first_line, first_column) = self.line_column(u32::from(range.start()));
        let (last_line, last_column) = self.line_column(u32::from(range.end()));
        let mut loc = SourceLocation::new(first_line, first_column, last_line, last_column);
        if let Some(path) = path {
            loc = loc.with_path(Arc::clone(path));
        }
        loc
    }

    /// A reusable closure form of [`LineIndex::location_of`] for callers that
    /// need `impl Fn(TextRange) -> SourceLocation`, e.g. the extractor's
    /// `LocationOf` trait.
    pub fn location_closure(&self, path: Option<Arc<str>>) -> impl Fn(ruff_text_size::TextRange) -> SourceLocation + '_ {
        move |range| {
            let (first_line, first_column) = self.line_column(u32::from(range.start()));
            let (last_line, last_column) = self.line_column(u32::from(range.end()));
            let mut loc = SourceLocation::new(first_line, first_column, last_line, last_column);
            if let Some(path) = &path {
                loc = loc.with_path(Arc::clone(path));
            }
            loc
        }
    }
}
