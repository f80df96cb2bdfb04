//! Program slicer (spec.md S4.F): closes a seed location set under the
//! dataflow relation in a chosen direction.
//!
//! spec.md S4.F's prose names the edge endpoints `f → t` and says backward
//! mode checks `f`'s location against the accepted set while forward mode
//! checks `t`'s -- but that reading contradicts its own worked example (S8
//! scenario 1, `"a = 1\nb = a\n"` sliced at line 2 keeps both lines). This
//! module instead implements the direction that reproduces every S8
//! end-to-end scenario: backward walks from a dataflow edge's consumer back
//! to its producer, forward walks from producer to consumer. See DESIGN.md.

use crate::dataflow::{self, AnalysisResult};
use crate::extractor::LocationOf;
use crate::location::SourceLocation;
use crate::set::KeyedSet;
use crate::symtab::SymbolTable;
use ruff_python_ast::Stmt;
use ruff_text_size::Ranged;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

pub type LocationSet = KeyedSet<SourceLocation, SourceLocation, fn(&SourceLocation) -> SourceLocation>;

pub fn location_set() -> LocationSet {
    KeyedSet::new(|l: &SourceLocation| l.clone())
}

/// `slice(ast, seedLocations, analyzer?, direction=Backward) -> LocationSet`.
///
/// Builds a fresh CFG and dataflow analysis of the whole AST (spec.md S4.F
/// "1."); callers that already have an `AnalysisResult` for this body can
/// use [`slice_with_analysis`] directly to avoid recomputing it.
pub fn slice(body: &[Stmt], seed_locations: &[SourceLocation], symtab: &mut SymbolTable, loc_of: &impl LocationOf, direction: Direction) -> LocationSet {
    let node_loc_of = |s: &Stmt| loc_of.location_of(s.range());
    let cfg = crate::cfg::build(body, &node_loc_of);
    let result = dataflow::analyze(&cfg, symtab, loc_of, None);
    let statement_locations: Vec<SourceLocation> = cfg.blocks().map(|(id, _)| id).collect();
    slice_with_analysis(&statement_locations, seed_locations, &result, direction)
}

/// Core closure step, reusable once an `AnalysisResult` exists (spec.md
/// S4.F "2." and "3.").
pub fn slice_with_analysis(statement_locations: &[SourceLocation], seed_locations: &[SourceLocation], result: &AnalysisResult, direction: Direction) -> LocationSet {
    let seed_statements: Vec<SourceLocation> = statement_locations.iter().filter(|s| seed_locations.iter().any(|seed| s.intersects(seed))).cloned().collect();

    let mut accepted = location_set();
    for s in &seed_statements {
        accepted.add(s.clone());
    }

    loop {
        let before = accepted.size();
        for edge in result.dataflows.items() {
            let (start, end) = match direction {
                Direction::Backward => (edge.from.clone(), edge.to.clone()),
                Direction::Forward => (edge.to.clone(), edge.from.clone()),
            };
            let end_is_seed = seed_statements.iter().any(|s| *s == end);
            let end_is_accepted = accepted.items().any(|a| a.contains(&end));
            if end_is_seed || end_is_accepted {
                accepted.add(start);
            }
        }
        if accepted.size() == before {
            break;
        }
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::SourceLocation;
    use crate::parsing::parse;
    use crate::symtab::SymbolTable;

    fn loc_fn(module: &crate::parsing::ParsedModule) -> impl Fn(ruff_text_size::TextRange) -> SourceLocation + '_ {
        move |range| {
            let (fl, fc) = module.line_index.line_column(u32::from(range.start()));
            let (ll, lc) = module.line_index.line_column(u32::from(range.end()));
            SourceLocation::new(fl, fc, ll, lc)
        }
    }

    #[test]
    fn backward_slice_keeps_the_defining_statement() {
        let module = parse("a = 1\nb = a\n", None).unwrap();
        let mut symtab = SymbolTable::new();
        let loc = loc_fn(&module);
        let seed = SourceLocation::new(2, 0, 2, 5);
        let result = slice(&module.body, &[seed], &mut symtab, &loc, Direction::Backward);
        assert_eq!(result.size(), 2);
        assert!(result.some(|l| l.first_line == 1));
        assert!(result.some(|l| l.first_line == 2));
    }

    #[test]
    fn backward_slice_excludes_unrelated_print_statement() {
        let module = parse("a = 1\nprint(\"hi\")\nb = a\n", None).unwrap();
        let mut symtab = SymbolTable::new();
        let loc = loc_fn(&module);
        let seed = SourceLocation::new(3, 0, 3, 5);
        let result = slice(&module.body, &[seed], &mut symtab, &loc, Direction::Backward);
        assert!(!result.some(|l| l.first_line == 2));
    }

    #[test]
    fn forward_slice_finds_downstream_consumer() {
        let module = parse("a = 1\nb = a\n", None).unwrap();
        let mut symtab = SymbolTable::new();
        let loc = loc_fn(&module);
        let seed = SourceLocation::new(1, 0, 1, 5);
        let result = slice(&module.body, &[seed], &mut symtab, &loc, Direction::Forward);
        assert!(result.some(|l| l.first_line == 2));
    }
}
