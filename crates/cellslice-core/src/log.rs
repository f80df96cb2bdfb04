//! Execution-log slicer (spec.md S4.H): the crate's top-level public API.
//! Owns a history of cell executions and a [`ProgramBuilder`], and answers
//! "what does this cell depend on" / "what depends on this cell" queries by
//! assembling the relevant program and running the slicer (component F)
//! over it.

use crate::cell::Cell;
use crate::error::SliceError;
use crate::location::SourceLocation;
use crate::program::{Program, ProgramBuilder};
use crate::slicer::{self, Direction, LocationSet};
use crate::symtab::SymbolTable;
use std::sync::Arc;

/// One logged execution: the cell as submitted, plus the wall-clock time it
/// was logged (spec.md S3 "Cell execution").
#[derive(Debug, Clone)]
pub struct CellExecution {
    pub cell: Cell,
    pub time: chrono::DateTime<chrono::Utc>,
}

/// Per-cell locations kept relative to that cell's own text, the result of
/// mapping an absolute-program slice back down through `lineToCellMap`
/// (spec.md S4.H "sliceAllExecutions").
#[derive(Debug, Clone, Default)]
pub struct CellSlice {
    pub execution_event_id: Arc<str>,
    pub execution_count: u64,
    pub locations: Vec<SourceLocation>,
}

/// The result of slicing one logged execution (spec.md S3 "Sliced
/// execution"): the time it ran, and its contributing cells' locations, in
/// the order those cells first appear in the slice.
#[derive(Debug, Clone)]
pub struct SlicedExecution {
    pub time: chrono::DateTime<chrono::Utc>,
    pub cell_slices: Vec<CellSlice>,
}

impl SlicedExecution {
    /// `merge(others...)` (spec.md S4.H): unions locations per cell across
    /// every sliced execution given, keeping the earliest time. Returns
    /// `cellSlices` sorted by execution count (spec.md S4.H "Merging
    /// slices"), with `executionEventId` as a deterministic tiebreaker, so
    /// the result is stable under permutation of `others` (spec.md S8).
    pub fn merge(&self, others: &[SlicedExecution]) -> SlicedExecution {
        struct Merged {
            execution_count: u64,
            locations: Vec<SourceLocation>,
        }
        let mut by_cell: indexmap::IndexMap<Arc<str>, Merged> = indexmap::IndexMap::new();
        let mut earliest = self.time;
        for exec in std::iter::once(self).chain(others.iter()) {
            if exec.time < earliest {
                earliest = exec.time;
            }
            for cs in &exec.cell_slices {
                let entry = by_cell.entry(cs.execution_event_id.clone()).or_insert_with(|| Merged { execution_count: cs.execution_count, locations: Vec::new() });
                for loc in &cs.locations {
                    if !entry.locations.contains(loc) {
                        entry.locations.push(loc.clone());
                    }
                }
            }
        }
        let mut cell_slices: Vec<CellSlice> =
            by_cell.into_iter().map(|(execution_event_id, m)| CellSlice { execution_event_id, execution_count: m.execution_count, locations: m.locations }).collect();
        cell_slices.sort_by(|a, b| a.execution_count.cmp(&b.execution_count).then_with(|| a.execution_event_id.cmp(&b.execution_event_id)));
        SlicedExecution { time: earliest, cell_slices }
    }
}

type Subscriber = Box<dyn Fn(&CellExecution)>;

/// `ExecutionLogSlicer` (spec.md S4.H).
pub struct ExecutionLogSlicer {
    builder: ProgramBuilder,
    log: Vec<CellExecution>,
    subscribers: Vec<Subscriber>,
}

impl Default for ExecutionLogSlicer {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionLogSlicer {
    pub fn new() -> Self {
        Self { builder: ProgramBuilder::new(), log: Vec::new(), subscribers: Vec::new() }
    }

    pub fn subscribe(&mut self, f: impl Fn(&CellExecution) + 'static) {
        self.subscribers.push(Box::new(f));
    }

    /// `logExecution(cell)`: stamps the current time, parses through the
    /// program builder, and appends to the log.
    pub fn log_execution(&mut self, cell: Cell) {
        let exec = CellExecution { cell, time: chrono::Utc::now() };
        self.add_execution_to_log(exec);
    }

    /// `addExecutionToLog(exec)`: same as `logExecution` without
    /// re-stamping the time, for replaying a log captured elsewhere.
    pub fn add_execution_to_log(&mut self, exec: CellExecution) {
        self.builder.add(exec.cell.clone());
        self.log.push(exec.clone());
        for sub in &self.subscribers {
            sub(&exec);
        }
    }

    pub fn reset(&mut self) {
        self.builder = ProgramBuilder::new();
        self.log.clear();
    }

    pub fn log(&self) -> &[CellExecution] {
        &self.log
    }

    /// `sliceAllExecutions(persistentId, seedLocations?)` (spec.md S4.H):
    /// one `SlicedExecution` per logged execution of `persistent_id`, in log
    /// order.
    pub fn slice_all_executions(&self, persistent_id: &str, seed_locations: Option<&[SourceLocation]>) -> Result<Vec<SlicedExecution>, SliceError> {
        let mut out = Vec::new();
        for exec in &self.log {
            if exec.cell.persistent_id.as_ref() != persistent_id {
                continue;
            }
            let event_id = exec.cell.execution_event_id.clone();
            let program = self.builder.build_to(&event_id).ok_or_else(|| SliceError::UnknownEvent(event_id.to_string()))?;

            let seeds = match seed_locations {
                Some(seeds) => seeds
                    .iter()
                    .flat_map(|seed| shift_into_program(&program, &event_id, seed))
                    .collect::<Vec<_>>(),
                None => whole_cell_locations(&program, &event_id),
            };

            let mut symtab = SymbolTable::with_default_specs();
            let loc_of = program.location_closure();
            let sliced = slicer::slice(&program.body, &seeds, &mut symtab, &loc_of, Direction::Backward);
            out.push(self.locations_to_sliced_execution(exec.time, &program, sliced));
        }
        Ok(out)
    }

    /// `sliceLatestExecution(persistentId, seedLocations?)`.
    pub fn slice_latest_execution(&self, persistent_id: &str, seed_locations: Option<&[SourceLocation]>) -> Result<Option<SlicedExecution>, SliceError> {
        Ok(self.slice_all_executions(persistent_id, seed_locations)?.into_iter().last())
    }

    /// `getDependentCells(eventId)` (spec.md S4.H): builds a program from
    /// the target cell onward, forward-slices seeded with every line
    /// belonging to any cell sharing the target's `persistentId`, and
    /// returns the distinct downstream cells (excluding the target itself),
    /// in first-occurrence order.
    pub fn get_dependent_cells(&self, event_id: &str) -> Result<Vec<Arc<str>>, SliceError> {
        let target = self.builder.get_cell_program(event_id).ok_or_else(|| SliceError::UnknownEvent(event_id.to_string()))?;
        let target_persistent_id = target.cell.persistent_id.clone();

        let program = self.builder.build_from(event_id).ok_or_else(|| SliceError::UnknownEvent(event_id.to_string()))?;

        let mut seeds = Vec::new();
        for (cell_id, lines) in &program.cell_to_lines {
            let Some(cp) = self.builder.get_cell_program(cell_id) else { continue };
            if cp.cell.persistent_id == target_persistent_id {
                for line in lines {
                    seeds.push(SourceLocation::new(*line, 0, *line, u32::MAX));
                }
            }
        }

        let mut symtab = SymbolTable::with_default_specs();
        let loc_of = program.location_closure();
        let sliced = slicer::slice(&program.body, &seeds, &mut symtab, &loc_of, Direction::Forward);

        let mut dependents = Vec::new();
        for loc in sliced.items() {
            if let Some(cell_id) = program.cell_for_line(loc.first_line) {
                let cp = self.builder.get_cell_program(cell_id);
                let is_target_cell = cp.map(|cp| cp.cell.persistent_id == target_persistent_id).unwrap_or(false);
                if !is_target_cell && !dependents.contains(cell_id) {
                    dependents.push(cell_id.clone());
                }
            }
        }
        Ok(dependents)
    }

    /// Converts an absolute-program location set into per-cell,
    /// cell-relative `CellSlice`s, in the order those cells first appear
    /// among the retained lines. Looks up each owning cell's current
    /// `executionCount` through `builder` so `CellSlice::execution_count`
    /// is available for `SlicedExecution::merge`'s ordering.
    fn locations_to_sliced_execution(&self, time: chrono::DateTime<chrono::Utc>, program: &Program, sliced: LocationSet) -> SlicedExecution {
        let mut ordered: Vec<SourceLocation> = sliced.into_items().collect();
        ordered.sort_by_key(|l| l.first_line);

        let mut order: Vec<Arc<str>> = Vec::new();
        let mut by_cell: indexmap::IndexMap<Arc<str>, Vec<SourceLocation>> = indexmap::IndexMap::new();
        for loc in ordered {
            let Some(cell_id) = program.cell_for_line(loc.first_line) else { continue };
            if !by_cell.contains_key(cell_id) {
                order.push(cell_id.clone());
            }
            let base = program.cell_to_lines.get(cell_id).and_then(|lines| lines.first()).copied().unwrap_or(1);
            let relative = SourceLocation { first_line: loc.first_line - base + 1, last_line: loc.last_line - base + 1, ..loc.clone() };
            by_cell.entry(cell_id.clone()).or_default().push(relative);
        }

        let cell_slices = order
            .into_iter()
            .map(|id| {
                let execution_count = self.builder.get_cell_program(&id).map(|cp| cp.cell.execution_count).unwrap_or_default();
                CellSlice { locations: by_cell.shift_remove(&id).unwrap_or_default(), execution_count, execution_event_id: id }
            })
            .collect();
        SlicedExecution { time, cell_slices }
    }
}

fn whole_cell_locations(program: &Program, event_id: &str) -> Vec<SourceLocation> {
    match program.cell_to_lines.get(event_id) {
        Some(lines) => lines.iter().map(|l| SourceLocation::new(*l, 0, *l, u32::MAX)).collect(),
        None => Vec::new(),
    }
}

/// Shifts a cell-relative seed location into the assembled program's
/// absolute line numbering, using the cell's own position in
/// `cellToLineMap`.
fn shift_into_program(program: &Program, event_id: &str, seed: &SourceLocation) -> Option<SourceLocation> {
    let lines = program.cell_to_lines.get(event_id)?;
    let base = *lines.first()?;
    let delta = base - 1;
    Some(seed.shifted(delta))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(text: &str, count: u64, event_id: &str, persistent_id: &str) -> Cell {
        Cell::new(text, count, event_id, persistent_id)
    }

    #[test]
    fn slice_all_executions_returns_one_entry_per_logged_run() {
        let mut log = ExecutionLogSlicer::new();
        log.log_execution(cell("a = 1\n", 1, "e0", "c0"));
        log.log_execution(cell("b = a\n", 1, "e1", "c1"));

        let results = log.slice_all_executions("c1", None).unwrap();
        assert_eq!(results.len(), 1);
        let cell_ids: Vec<&str> = results[0].cell_slices.iter().map(|cs| cs.execution_event_id.as_ref()).collect();
        assert!(cell_ids.contains(&"e0"));
        assert!(cell_ids.contains(&"e1"));
    }

    #[test]
    fn get_dependent_cells_finds_downstream_consumer() {
        let mut log = ExecutionLogSlicer::new();
        log.log_execution(cell("a = 1\n", 1, "e0", "c0"));
        log.log_execution(cell("b = a\n", 1, "e1", "c1"));
        log.log_execution(cell("c = 2\n", 1, "e2", "c2"));

        let deps = log.get_dependent_cells("e0").unwrap();
        assert!(deps.contains(&Arc::from("e1")));
        assert!(!deps.contains(&Arc::from("e2")));
        assert!(!deps.contains(&Arc::from("e0")));
    }

    #[test]
    fn reset_clears_log_and_builder() {
        let mut log = ExecutionLogSlicer::new();
        log.log_execution(cell("a = 1\n", 1, "e0", "c0"));
        log.reset();
        assert!(log.log().is_empty());
        assert!(log.builder.get_cell_program("e0").is_none());
    }

    #[test]
    fn merge_unions_locations_per_cell_and_keeps_earliest_time() {
        let early = chrono::Utc::now();
        let late = early + chrono::Duration::seconds(5);
        let a = SlicedExecution {
            time: early,
            cell_slices: vec![CellSlice { execution_event_id: Arc::from("e0"), execution_count: 1, locations: vec![SourceLocation::new(1, 0, 1, 3)] }],
        };
        let b = SlicedExecution {
            time: late,
            cell_slices: vec![CellSlice { execution_event_id: Arc::from("e0"), execution_count: 1, locations: vec![SourceLocation::new(2, 0, 2, 3)] }],
        };
        let merged = a.merge(&[b]);
        assert_eq!(merged.time, early);
        assert_eq!(merged.cell_slices[0].locations.len(), 2);
    }

    #[test]
    fn merge_sorts_result_by_execution_count_regardless_of_argument_order() {
        let t = chrono::Utc::now();
        let later = CellSlice { execution_event_id: Arc::from("e2"), execution_count: 5, locations: vec![SourceLocation::new(1, 0, 1, 1)] };
        let earlier = CellSlice { execution_event_id: Arc::from("e0"), execution_count: 1, locations: vec![SourceLocation::new(1, 0, 1, 1)] };
        let middle = CellSlice { execution_event_id: Arc::from("e1"), execution_count: 3, locations: vec![SourceLocation::new(1, 0, 1, 1)] };

        let first = SlicedExecution { time: t, cell_slices: vec![later.clone()] };
        let second = SlicedExecution { time: t, cell_slices: vec![earlier.clone(), middle.clone()] };
        let forward = first.merge(&[second.clone()]);

        let third = SlicedExecution { time: t, cell_slices: vec![middle, earlier] };
        let backward = third.merge(&[SlicedExecution { time: t, cell_slices: vec![later] }]);

        let forward_ids: Vec<&str> = forward.cell_slices.iter().map(|cs| cs.execution_event_id.as_ref()).collect();
        let backward_ids: Vec<&str> = backward.cell_slices.iter().map(|cs| cs.execution_event_id.as_ref()).collect();
        assert_eq!(forward_ids, vec!["e0", "e1", "e2"]);
        assert_eq!(forward_ids, backward_ids, "merge must be stable under permutation of its arguments");
    }
}
