//! Program builder (spec.md S4.G): turns a history of cell executions into
//! per-cell `CellProgram`s and, on request, a single assembled `Program`
//! spanning the cells relevant to one endpoint.
//!
//! `ruff`'s AST nodes carry an immutable byte-range `TextRange` local to
//! whichever text they were parsed from -- there is no field to stash a
//! cross-fragment location into after the fact, unlike a mutable-AST
//! source where every node's `location` can simply be overwritten (spec.md
//! S4.G: "annotate every parsed node's location with the cell's
//! executionEventId"). `Program` reproduces the same externally observable
//! behavior (contiguous, disjoint line numbers per cell; a working
//! `cellToLineMap`/`lineToCellMap`) by re-parsing the concatenated,
//! magic-rewritten text of the contributing cells as a single fragment
//! instead of shifting already-parsed per-cell ASTs in place. See DESIGN.md.

use crate::cell::{Cell, CellProgram};
use crate::extractor::Extractor;
use crate::location::{LineIndex, SourceLocation};
use crate::refs::ref_set;
use crate::symtab::SymbolTable;
use indexmap::IndexMap;
use ruff_python_ast::Stmt;
use ruff_text_size::TextRange;
use std::collections::HashSet;
use std::sync::Arc;

/// An assembled program spanning one or more cells, ready to be fed to the
/// CFG builder and dataflow analyzer as a single unit (spec.md S3
/// "Program").
pub struct Program {
    pub body: Vec<Stmt>,
    pub line_index: LineIndex,
    /// Cell identity (its `execution_event_id`) -> the global line numbers
    /// it occupies in `body`.
    pub cell_to_lines: IndexMap<Arc<str>, Vec<u32>>,
    /// Global line number -> the cell identity that owns it.
    pub line_to_cell: IndexMap<u32, Arc<str>>,
    pub full_text: String,
}

impl Program {
    pub fn location_closure(&self) -> impl Fn(TextRange) -> SourceLocation + '_ {
        self.line_index.location_closure(None)
    }

    pub fn cell_for_line(&self, line: u32) -> Option<&Arc<str>> {
        self.line_to_cell.get(&line)
    }
}

/// `ProgramBuilder` (spec.md S4.G): owns the symbol table shared across all
/// per-cell parses (spec.md S5: "the symbol table... accumulates imports as
/// statements are analysed... owned exclusively by the analyzer instance").
pub struct ProgramBuilder {
    symtab: SymbolTable,
    order: Vec<Arc<str>>,
    cells: IndexMap<Arc<str>, CellProgram>,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self { symtab: SymbolTable::with_default_specs(), order: Vec::new(), cells: IndexMap::new() }
    }

    /// `add(cell)` (spec.md S4.G): parse after magic-rewriting, extract
    /// cell-level defs/uses, and store the resulting `CellProgram`.
    pub fn add(&mut self, cell: Cell) {
        let event_id = cell.execution_event_id.clone();
        let rewritten = crate::magics::rewrite(&cell.text);
        let program = match crate::parsing::parse(&rewritten, Some(event_id.clone())) {
            Ok(parsed) => {
                let loc = parsed.location_closure();
                let (defs, uses) = scan_cell_def_use(&parsed.body, &mut self.symtab, &loc);
                drop(loc);
                CellProgram::new(cell.clone(), parsed.body, parsed.line_index, defs, uses)
            }
            Err(e) => {
                log::warn!("cell {event_id} failed to parse: {e}");
                CellProgram::failed_record(cell.clone())
            }
        };
        self.order.push(event_id.clone());
        self.cells.insert(event_id, program);
    }

    /// `getCellProgram(id)`: most-recent `CellProgram` with that event id.
    pub fn get_cell_program(&self, event_id: &str) -> Option<&CellProgram> {
        self.cells.get(event_id)
    }

    /// `buildTo(eventId)` (spec.md S4.G). Walks backward from the target,
    /// keeping at most one occurrence of each `persistentId`: the first one
    /// encountered walking backward (i.e. the one nearest the target in
    /// time) wins, and any older occurrence of the same cell identity found
    /// further back is a stale re-execution that has since been superseded
    /// (skipped, scan continues further back). A cell that recorded an
    /// error is likewise skipped unless it is the target itself (spec.md S7:
    /// "Subsequent buildTo skips error cells unless the error cell is the
    /// target").
    ///
    /// Open question (spec.md S9): the staleness check must key off
    /// `persistentId`, not compare `executionCount` as one counter shared
    /// across every cell in the log -- a single shared threshold breaks the
    /// ordinary case of two independent cells each run exactly once (both
    /// carry `executionCount == 1`, so the very first prior cell checked
    /// would already satisfy "count >= last-seen" and wrongly end the scan).
    /// See DESIGN.md.
    pub fn build_to(&self, event_id: &str) -> Option<Program> {
        let target_pos = self.order.iter().position(|id| id.as_ref() == event_id)?;

        let mut collected = Vec::new();
        let mut seen_persistent_ids: HashSet<Arc<str>> = HashSet::new();
        for (offset, prior_id) in self.order[..=target_pos].iter().rev().enumerate() {
            let prior = &self.cells[prior_id];
            let is_target = offset == 0;
            if seen_persistent_ids.contains(&prior.cell.persistent_id) {
                continue;
            }
            if prior.has_error() && !is_target {
                continue;
            }
            seen_persistent_ids.insert(prior.cell.persistent_id.clone());
            collected.push(prior);
        }
        collected.reverse();
        Some(assemble(&collected))
    }

    /// `buildFrom(eventId)`: from the first cell anywhere in the log sharing
    /// the target's `persistentId`, through the rest of the log.
    pub fn build_from(&self, event_id: &str) -> Option<Program> {
        let target = self.cells.get(event_id)?;
        let persistent_id = target.cell.persistent_id.clone();
        let start_pos = self.order.iter().position(|id| self.cells[id].cell.persistent_id == persistent_id)?;
        let collected: Vec<&CellProgram> = self.order[start_pos..].iter().map(|id| &self.cells[id]).collect();
        Some(assemble(&collected))
    }
}

fn scan_cell_def_use(body: &[Stmt], symtab: &mut SymbolTable, loc_of: &impl crate::extractor::LocationOf) -> (crate::refs::RefSet, crate::refs::RefSet) {
    let mut extractor = Extractor::new();
    let mut running_defs = ref_set();
    let mut defs = ref_set();
    let mut uses = ref_set();
    for stmt in body {
        let du = extractor.get_def_use_for_statement(stmt, &running_defs, symtab, loc_of);
        defs = defs.union([du.defs()]);
        uses = uses.union([du.uses.clone()]);
        running_defs = running_defs.union([du.defs()]);
    }
    (defs, uses)
}

/// Concatenates the rewritten text of `collected` and re-parses it as one
/// fragment, building `cellToLineMap`/`lineToCellMap` from each cell's known
/// line count (spec.md S4.G: "assigning line ranges by concatenating
/// fragment line lengths").
fn assemble(collected: &[&CellProgram]) -> Program {
    let mut full_text = String::new();
    let mut cell_to_lines: IndexMap<Arc<str>, Vec<u32>> = IndexMap::new();
    let mut line_to_cell: IndexMap<u32, Arc<str>> = IndexMap::new();
    let mut line_offset: u32 = 0;

    for cp in collected {
        let rewritten = crate::magics::rewrite(&cp.cell.text);
        let lines_in_cell = LineIndex::new(&rewritten).line_count();
        let event_id = cp.cell.execution_event_id.clone();

        let mut lines = Vec::with_capacity(lines_in_cell as usize);
        for l in 1..=lines_in_cell {
            let global_line = line_offset + l;
            lines.push(global_line);
            line_to_cell.insert(global_line, event_id.clone());
        }
        cell_to_lines.insert(event_id, lines);

        full_text.push_str(&rewritten);
        if !rewritten.ends_with('\n') {
            full_text.push('\n');
        }
        line_offset += lines_in_cell;
    }

    let (body, line_index) = match crate::parsing::parse(&full_text, None) {
        Ok(parsed) => (parsed.body, parsed.line_index),
        Err(e) => {
            log::warn!("assembled program failed to parse: {e}");
            (Vec::new(), LineIndex::new(&full_text))
        }
    };

    Program { body, line_index, cell_to_lines, line_to_cell, full_text }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(text: &str, count: u64, event_id: &str, persistent_id: &str) -> Cell {
        Cell::new(text, count, event_id, persistent_id)
    }

    #[test]
    fn build_to_concatenates_prior_cells_in_order() {
        let mut builder = ProgramBuilder::new();
        builder.add(cell("a = 1\n", 1, "e0", "c0"));
        builder.add(cell("b = a\n", 1, "e1", "c1"));
        let program = builder.build_to("e1").unwrap();
        assert_eq!(program.body.len(), 2);
        assert_eq!(program.cell_to_lines.get("e0").unwrap(), &vec![1]);
        assert_eq!(program.cell_to_lines.get("e1").unwrap(), &vec![2]);
    }

    #[test]
    fn build_to_excludes_only_the_stale_reexecution_of_the_same_cell() {
        let mut builder = ProgramBuilder::new();
        builder.add(cell("x = 2\n", 1, "e0", "c0"));
        builder.add(cell("y = x + 1\n", 1, "e1", "c1"));
        builder.add(cell("q = 2\n", 1, "e2", "c2"));
        builder.add(cell("x = 20\n", 2, "e3", "c0"));
        let program = builder.build_to("e3").unwrap();
        assert!(!program.cell_to_lines.contains_key("e0"), "e0 is c0's stale, superseded execution");
        assert!(program.cell_to_lines.contains_key("e1"));
        assert!(program.cell_to_lines.contains_key("e2"));
        assert!(program.cell_to_lines.contains_key("e3"));
    }

    #[test]
    fn build_to_skips_an_erroring_cell_but_keeps_scanning() {
        let mut builder = ProgramBuilder::new();
        builder.add(cell("a = 1\n", 1, "e0", "c0"));
        builder.add(cell("raise ValueError()\n", 2, "e1", "c0").with_error(true));
        builder.add(cell("b = a\n", 3, "e2", "c1"));
        let program = builder.build_to("e2").unwrap();
        assert!(program.cell_to_lines.contains_key("e0"));
        assert!(!program.cell_to_lines.contains_key("e1"));
        assert!(program.cell_to_lines.contains_key("e2"));
    }

    #[test]
    fn build_from_starts_at_first_occurrence_of_persistent_id() {
        let mut builder = ProgramBuilder::new();
        builder.add(cell("x = 2\n", 1, "e0", "c0"));
        builder.add(cell("y = x + 1\n", 1, "e1", "c1"));
        builder.add(cell("x = 20\n", 2, "e2", "c0"));
        let program = builder.build_from("e2").unwrap();
        assert!(program.cell_to_lines.contains_key("e0"));
        assert!(program.cell_to_lines.contains_key("e1"));
        assert!(program.cell_to_lines.contains_key("e2"));
    }
}
