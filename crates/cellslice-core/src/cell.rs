//! Cell contract and per-cell parsed program (spec.md S3 "Cell", "Cell
//! program"; S6 "Cell contract").

use crate::location::LineIndex;
use crate::refs::RefSet;
use ruff_python_ast::Stmt;
use std::sync::Arc;

/// A code fragment submitted for execution, provided externally by whatever
/// notebook front end owns the kernel. Two occurrences of the same cell in
/// the log share `persistent_id` but differ in `execution_event_id`.
#[derive(Debug, Clone)]
pub struct Cell {
    pub text: String,
    pub execution_count: u64,
    pub execution_event_id: Arc<str>,
    pub persistent_id: Arc<str>,
    pub has_error: bool,
}

impl Cell {
    pub fn new(text: impl Into<String>, execution_count: u64, execution_event_id: impl Into<Arc<str>>, persistent_id: impl Into<Arc<str>>) -> Self {
        Self { text: text.into(), execution_count, execution_event_id: execution_event_id.into(), persistent_id: persistent_id.into(), has_error: false }
    }

    pub fn with_error(mut self, has_error: bool) -> Self {
        self.has_error = has_error;
        self
    }

    pub fn deep_copy(&self) -> Self {
        self.clone()
    }
}

/// Parsed form of a single cell (spec.md S3 "Cell program"): created once
/// when the cell is logged by [`crate::program::ProgramBuilder::add`], and
/// never mutated afterwards.
///
/// `defs`/`uses` are a single forward scan over the cell's own statements
/// (threading each statement's definitions into the next statement's
/// `incoming_defs`), not a full control-flow fixed point -- this field is a
/// diagnostic summary of what the cell produces and depends on in isolation;
/// actual slicing re-analyzes the assembled [`crate::program::Program`].
pub struct CellProgram {
    pub cell: Cell,
    pub body: Vec<Stmt>,
    pub line_index: LineIndex,
    pub defs: RefSet,
    pub uses: RefSet,
    failed: bool,
}

impl CellProgram {
    pub fn new(cell: Cell, body: Vec<Stmt>, line_index: LineIndex, defs: RefSet, uses: RefSet) -> Self {
        Self { cell, body, line_index, defs, uses, failed: false }
    }

    /// Stored in place of a successful parse on any parse or analysis
    /// failure (spec.md S4.G "On any parse or analysis failure...").
    pub fn failed_record(cell: Cell) -> Self {
        Self { cell, body: Vec::new(), line_index: LineIndex::new(""), defs: crate::refs::ref_set(), uses: crate::refs::ref_set(), failed: true }
    }

    /// Whether this cell should be treated as an error for `buildTo`'s
    /// traversal (spec.md S4.G): either the cell's own execution errored, or
    /// parsing/analysis of it failed here.
    pub fn has_error(&self) -> bool {
        self.cell.has_error || self.failed
    }

    pub fn line_count(&self) -> u32 {
        self.line_index.line_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_record_has_no_statements_and_counts_as_an_error() {
        let cell = Cell::new("def (:", 1, "evt-1", "cell-1");
        let program = CellProgram::failed_record(cell);
        assert!(program.body.is_empty());
        assert!(program.has_error());
    }

    #[test]
    fn a_successful_cell_is_not_an_error() {
        let cell = Cell::new("a = 1", 1, "evt-1", "cell-1");
        let program = CellProgram::new(cell, Vec::new(), LineIndex::new("a = 1\n"), crate::refs::ref_set(), crate::refs::ref_set());
        assert!(!program.has_error());
    }
}
