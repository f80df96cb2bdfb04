//! Dataflow analyzer (spec.md S4.E): a fixed-point over a control-flow graph
//! producing dataflow edges and a set of undefined references.
//!
//! Gen/kill rules are encoded as static tables rather than inlined per-kind
//! code (spec.md S9 "Gen/kill rules as a table"): a `Definition` or `Update`
//! ref produced by a statement is folded into the block's running state for
//! the kinds that rule says it feeds, and evicts same-named entries from the
//! kinds it kills.

use crate::cfg::Cfg;
use crate::extractor::{Extractor, LocationOf};
use crate::refs::{DefUse, NodeId, Ref, RefLevel, RefSet, ref_set};
use crate::set::KeyedSet;
use crate::spec::UpdateEntry;
use crate::symtab::SymbolTable;
use indexmap::IndexMap;
use ruff_python_ast::{Expr, Stmt};
use ruff_text_size::Ranged;
use std::collections::{HashSet, VecDeque};

const LEVELS: [RefLevel; 3] = [RefLevel::Definition, RefLevel::Update, RefLevel::Use];

fn gen_sources(k: RefLevel) -> &'static [RefLevel] {
    match k {
        RefLevel::Definition => &[],
        RefLevel::Update => &[RefLevel::Definition],
        RefLevel::Use => &[RefLevel::Update, RefLevel::Definition],
    }
}

fn kill_triggers(target: RefLevel) -> &'static [RefLevel] {
    match target {
        RefLevel::Definition => &[RefLevel::Definition, RefLevel::Update],
        RefLevel::Update => &[RefLevel::Definition, RefLevel::Update],
        RefLevel::Use => &[],
    }
}

fn bucket(du: &DefUse, k: RefLevel) -> &RefSet {
    match k {
        RefLevel::Definition => &du.definition,
        RefLevel::Update => &du.update,
        RefLevel::Use => &du.uses,
    }
}

fn set_bucket(du: &mut DefUse, k: RefLevel, value: RefSet) {
    match k {
        RefLevel::Definition => du.definition = value,
        RefLevel::Update => du.update = value,
        RefLevel::Use => du.uses = value,
    }
}

/// `blockIn ← (blockIn[K] \ kill) ∪ gen`, applied independently per kind
/// (spec.md S4.E "2.d").
fn apply_gen_kill(old: &DefUse, produced: &DefUse) -> DefUse {
    let mut next = DefUse::new();
    for k in LEVELS {
        let killed_names: HashSet<&str> = kill_triggers(k).iter().flat_map(|t| bucket(produced, *t).items()).map(|r| r.name.as_str()).collect();
        let survivors = bucket(old, k).filter(|r| !killed_names.contains(r.name.as_str()));
        let mut genned = bucket(produced, k).clone();
        for src in gen_sources(k) {
            genned = genned.union([bucket(produced, *src).clone()]);
        }
        set_bucket(&mut next, k, survivors.union([genned]));
    }
    next
}

/// A dataflow edge between two statements (spec.md S3 "Dataflow edge").
/// Identity is `(from, to)`; control-dependency edges carry no refs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataflowEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub from_ref: Option<Ref>,
    pub to_ref: Option<Ref>,
}

fn edge_key(e: &DataflowEdge) -> (NodeId, NodeId) {
    (e.from.clone(), e.to.clone())
}

pub type EdgeSet = KeyedSet<DataflowEdge, (NodeId, NodeId), fn(&DataflowEdge) -> (NodeId, NodeId)>;

pub fn edge_set() -> EdgeSet {
    KeyedSet::new(edge_key)
}

pub struct AnalysisResult {
    pub dataflows: EdgeSet,
    pub undefined_refs: RefSet,
}

/// `analyze(cfg, seedRefs?) -> {dataflows, undefinedRefs}` (spec.md S4.E).
///
/// Runs in two passes: a fixed-point pass that only settles each block's
/// incoming `DefUse` state, then a single readout pass that derives edges
/// and undefined refs from the converged state. The extractor's per-location
/// cache (spec.md S3 "never invalidated") makes the readout pass free of
/// redundant parsing work -- every statement was already visited at least
/// once during the fixed point.
pub fn analyze(cfg: &Cfg, symtab: &mut SymbolTable, loc_of: &impl LocationOf, seed_refs: Option<RefSet>) -> AnalysisResult {
    let mut extractor = Extractor::new();
    let mut block_in: IndexMap<NodeId, DefUse> = cfg.blocks().map(|(id, _)| (id, DefUse::new())).collect();

    if let (Some(seed), Some(entry)) = (seed_refs, cfg.entry()) {
        if let Some(du) = block_in.get_mut(&entry) {
            du.definition = du.definition.union([seed]);
        }
    }

    let mut worklist: VecDeque<NodeId> = cfg.blocks().map(|(id, _)| id).rev().collect();
    let mut queued: HashSet<NodeId> = worklist.iter().cloned().collect();

    while let Some(id) = worklist.pop_front() {
        queued.remove(&id);
        let merged = merge_predecessors(cfg, &block_in, &id);
        let Some(stmt) = cfg.statement(&id) else { continue };
        let produced = extractor.get_def_use_for_statement(stmt, &merged.defs(), symtab, loc_of);
        let next = apply_gen_kill(&merged, &produced);

        let changed = block_in.get(&id).map(|old| !old.equals(&next)).unwrap_or(true);
        if changed {
            block_in.insert(id.clone(), next);
            for succ in cfg.get_successors(&id) {
                if queued.insert(succ.clone()) {
                    worklist.push_back(succ);
                }
            }
        }
    }

    let mut dataflows = edge_set();
    let mut undefined_refs = ref_set();
    for (id, stmt) in cfg.blocks() {
        let merged = merge_predecessors(cfg, &block_in, &id);
        let produced = extractor.get_def_use_for_statement(stmt, &merged.defs(), symtab, loc_of);

        let mut resolved: HashSet<String> = HashSet::new();
        for k in LEVELS {
            for to in bucket(&produced, k).items() {
                for from in bucket(&merged, k).items() {
                    if from.name == to.name {
                        dataflows.add(DataflowEdge { from: from.node.clone(), to: to.node.clone(), from_ref: Some(from.clone()), to_ref: Some(to.clone()) });
                        resolved.insert(to.name.clone());
                    }
                }
            }
        }
        for u in produced.uses.items() {
            if !resolved.contains(&u.name) {
                undefined_refs.add(u.clone());
            }
        }
    }

    cfg.visit_control_dependencies(|controller, dependent| {
        dataflows.add(DataflowEdge { from: controller.clone(), to: dependent.clone(), from_ref: None, to_ref: None });
    });

    AnalysisResult { dataflows, undefined_refs }
}

fn merge_predecessors(cfg: &Cfg, block_in: &IndexMap<NodeId, DefUse>, id: &NodeId) -> DefUse {
    let mut merged = block_in.get(id).cloned().unwrap_or_default();
    for pred in cfg.get_predecessors(id) {
        if let Some(pred_du) = block_in.get(&pred) {
            merged = merged.union(pred_du);
        }
    }
    merged
}

/// Builds a local CFG for `body`, seeds `params` as definitions at the
/// function's own node, and runs the analysis. Shared by both uses below.
fn analyze_body<'a>(body: &'a [Stmt], params: &[String], symtab: &mut SymbolTable, loc_of: &impl LocationOf) -> Option<(Cfg<'a>, AnalysisResult)> {
    let node_loc_of = |s: &Stmt| loc_of.location_of(s.range());
    let cfg = crate::cfg::build(body, &node_loc_of);
    let entry = cfg.entry()?;
    let mut seed = ref_set();
    for p in params {
        seed.add(Ref::new(p.clone(), crate::refs::RefKind::Variable, RefLevel::Definition, entry.clone(), entry.clone()));
    }
    let result = analyze(&cfg, symtab, loc_of, Some(seed));
    Some((cfg, result))
}

/// `getUses` "def" case (spec.md S4.D): the body's undefined uses are its
/// free variables.
pub fn free_variables_of_function_body(body: &[Stmt], params: &[String], symtab: &mut SymbolTable, loc_of: &impl LocationOf) -> RefSet {
    match analyze_body(body, params, symtab, loc_of) {
        Some((_, result)) => result.undefined_refs,
        None => ref_set(),
    }
}

/// Parameter side-effect analysis (spec.md S4.E): for every parameter,
/// whether dataflow reaches a statement that mutates through it.
pub fn analyze_parameter_side_effects(body: &[Stmt], params: &[String], symtab: &mut SymbolTable, loc_of: &impl LocationOf) -> Vec<UpdateEntry> {
    let Some((_, result)) = analyze_body(body, params, symtab, loc_of) else { return Vec::new() };

    let side_effecting_locations: HashSet<NodeId> = body.iter().filter(|s| is_side_effecting(s)).map(|s| loc_of.location_of(s.range())).collect();

    let mut updates = Vec::new();
    for (i, p) in params.iter().enumerate() {
        let reaches = result.dataflows.items().any(|e| {
            let from_matches = e.from_ref.as_ref().map(|r| r.name == *p).unwrap_or(false);
            from_matches && side_effecting_locations.contains(&e.to)
        });
        if reaches {
            updates.push(UpdateEntry::Position(i + 1));
        }
    }
    updates
}

fn is_side_effecting(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Assign(a) => a.targets.iter().any(is_mutating_target),
        Stmt::AugAssign(a) => is_mutating_target(&a.target),
        Stmt::Expr(e) => matches!(e.value.as_ref(), Expr::Call(_)),
        _ => false,
    }
}

fn is_mutating_target(target: &Expr) -> bool {
    matches!(target, Expr::Attribute(_) | Expr::Subscript(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::SourceLocation;
    use crate::parsing::parse;

    fn loc_fn(module: &crate::parsing::ParsedModule) -> impl Fn(ruff_text_size::TextRange) -> SourceLocation + '_ {
        move |range| {
            let (fl, fc) = module.line_index.line_column(u32::from(range.start()));
            let (ll, lc) = module.line_index.line_column(u32::from(range.end()));
            SourceLocation::new(fl, fc, ll, lc)
        }
    }

    #[test]
    fn straight_line_flow_connects_definition_to_use() {
        let module = parse("a = 1\nb = a\n", None).unwrap();
        let mut symtab = SymbolTable::new();
        let loc = loc_fn(&module);
        let cfg = crate::cfg::build(&module.body, &|s: &Stmt| loc(s.range()));
        let result = analyze(&cfg, &mut symtab, &loc, None);
        assert!(result.dataflows.some(|e| e.from_ref.as_ref().map(|r| r.name == "a").unwrap_or(false)));
    }

    #[test]
    fn use_of_undeclared_name_is_undefined() {
        let module = parse("print(unknown_name)\n", None).unwrap();
        let mut symtab = SymbolTable::new();
        let loc = loc_fn(&module);
        let cfg = crate::cfg::build(&module.body, &|s: &Stmt| loc(s.range()));
        let result = analyze(&cfg, &mut symtab, &loc, None);
        assert!(result.undefined_refs.some(|r| r.name == "unknown_name"));
    }

    #[test]
    fn function_body_reports_free_variables() {
        let module = parse("def f(x):\n    return x + y\n", None).unwrap();
        let Stmt::FunctionDef(f) = &module.body[0] else { panic!("expected a function") };
        let mut symtab = SymbolTable::new();
        let loc = loc_fn(&module);
        let free = free_variables_of_function_body(&f.body, &["x".to_string()], &mut symtab, &loc);
        assert!(free.some(|r| r.name == "y"));
        assert!(!free.some(|r| r.name == "x"));
    }

    #[test]
    fn parameter_mutated_through_attribute_assignment_is_flagged() {
        let module = parse("def f(obj):\n    obj.value = 1\n", None).unwrap();
        let Stmt::FunctionDef(f) = &module.body[0] else { panic!("expected a function") };
        let mut symtab = SymbolTable::new();
        let loc = loc_fn(&module);
        let updates = analyze_parameter_side_effects(&f.body, &["obj".to_string()], &mut symtab, &loc);
        assert_eq!(updates, vec![UpdateEntry::Position(1)]);
    }
}
