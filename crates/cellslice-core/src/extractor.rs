//! Per-statement def/use extractor (spec.md S4.D).
//!
//! `Extractor::get_def_use_for_statement` is the single place that turns a
//! parsed statement into the three ref-sets the dataflow analyzer (component
//! E) propagates. It leans on the tree walker for "every call"/"every bare
//! name" subtree scans and on the symbol table to decide whether a call
//! mutates its arguments.

use crate::location::SourceLocation;
use crate::refs::{DefUse, NodeId, Ref, RefKind, RefLevel, RefSet, ref_set};
use crate::spec::{FunctionSpec, TypeSpecId, UpdateEntry};
use crate::symtab::SymbolTable;
use crate::walker::{collect_calls_in_stmt, collect_names_in_expr, collect_string_literals_in_stmt};
use ruff_python_ast::{self as ast, Expr, Stmt};
use ruff_text_size::Ranged;
use std::collections::HashMap;
use std::sync::Arc;

/// Converts an AST node's byte range into a `SourceLocation`, already tagged
/// with the originating fragment's identity. Supplied by whoever owns the
/// parsed module (see `ParsedModule::location_of`).
pub trait LocationOf {
    fn location_of(&self, range: ruff_text_size::TextRange) -> SourceLocation;
}

impl<F: Fn(ruff_text_size::TextRange) -> SourceLocation> LocationOf for F {
    fn location_of(&self, range: ruff_text_size::TextRange) -> SourceLocation {
        self(range)
    }
}

/// Caches `DefUse` triples by canonical location string (spec.md S3: "never
/// invalidated; locations are effectively unique per cell parse").
#[derive(Default)]
pub struct Extractor {
    cache: HashMap<String, DefUse>,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_def_use_for_statement(&mut self, stmt: &Stmt, incoming_defs: &RefSet, symtab: &mut SymbolTable, loc_of: &impl LocationOf) -> DefUse {
        let key = loc_of.location_of(stmt.range()).canonical_key();
        if let Some(cached) = self.cache.get(&key) {
            return cached.clone();
        }
        let du = compute_def_use(stmt, incoming_defs, symtab, loc_of);
        self.cache.insert(key, du.clone());
        du
    }
}

fn compute_def_use(stmt: &Stmt, incoming_defs: &RefSet, symtab: &mut SymbolTable, loc_of: &impl LocationOf) -> DefUse {
    let stmt_loc: NodeId = loc_of.location_of(stmt.range());
    let mut definition = ref_set();
    let mut update = ref_set();

    call_analysis(stmt, incoming_defs, symtab, loc_of, &stmt_loc, &mut update);
    def_annotation_analysis(stmt, loc_of, &stmt_loc, &mut definition);
    shape_rules(stmt, incoming_defs, symtab, loc_of, &stmt_loc, &mut definition, &mut update);

    let uses = get_uses(stmt, incoming_defs, symtab, loc_of, &stmt_loc);

    DefUse { definition, update, uses }
}

fn call_analysis(stmt: &Stmt, incoming_defs: &RefSet, symtab: &SymbolTable, loc_of: &impl LocationOf, stmt_loc: &NodeId, update: &mut RefSet) {
    for call in collect_calls_in_stmt(stmt) {
        match resolve_callee(call, symtab, incoming_defs) {
            Some((spec, receiver)) if !spec.updates.is_empty() => {
                for entry in &spec.updates {
                    match entry {
                        UpdateEntry::Position(n) if *n >= 1 => {
                            if let Some(Expr::Name(name_expr)) = call.arguments.args.get(n - 1) {
                                update.add(Ref::new(name_expr.id.to_string(), RefKind::Mutation, RefLevel::Update, loc_of.location_of(name_expr.range()), stmt_loc.clone()));
                            }
                        }
                        UpdateEntry::Position(_) => {
                            if let Some(name) = &receiver {
                                update.add(Ref::new(name.clone(), RefKind::Mutation, RefLevel::Update, loc_of.location_of(call.func.range()), stmt_loc.clone()));
                            }
                        }
                        UpdateEntry::Global(_) => {}
                    }
                }
            }
            Some(_) => {}
            None => {
                for arg in call.arguments.args.iter() {
                    if let Expr::Name(n) = arg {
                        update.add(Ref::new(n.id.to_string(), RefKind::Mutation, RefLevel::Update, loc_of.location_of(n.range()), stmt_loc.clone()));
                    }
                }
                if let Expr::Attribute(a) = call.func.as_ref() {
                    if let Expr::Name(n) = a.value.as_ref() {
                        update.add(Ref::new(n.id.to_string(), RefKind::Mutation, RefLevel::Update, loc_of.location_of(n.range()), stmt_loc.clone()));
                    }
                }
            }
        }
    }
}

/// Resolves a call's callee to a function spec and, for a dotted callee, the
/// bare receiver name (spec.md S4.D "call analysis").
fn resolve_callee(call: &ast::ExprCall, symtab: &SymbolTable, incoming_defs: &RefSet) -> Option<(FunctionSpec, Option<String>)> {
    match call.func.as_ref() {
        Expr::Name(n) => symtab.lookup_function(n.id.as_str()).map(|f| (f, None)),
        Expr::Attribute(a) => {
            let Expr::Name(recv) = a.value.as_ref() else { return None };
            let recv_name = recv.id.to_string();
            let attr = a.attr.id.to_string();
            if symtab.is_known_module(&recv_name) {
                symtab.lookup_module_function(&recv_name, &attr).map(|f| (f, Some(recv_name)))
            } else if let Some(ty) = inferred_type_of(&recv_name, incoming_defs) {
                symtab.lookup_type_method(ty, &attr).map(|f| (f, Some(recv_name)))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn inferred_type_of<'a>(name: &str, incoming_defs: &'a RefSet) -> Option<&'a TypeSpecId> {
    incoming_defs.items().filter(|r| r.name == name).last().and_then(|r| r.inferred_type.as_ref())
}

#[derive(serde::Deserialize)]
struct DefAnnotationEntry {
    name: String,
    pos: Vec<Vec<i64>>,
}

/// Scans string literals for a `"defs: <JSON>"` prefix (spec.md S4.D
/// "Def-annotation analysis"). Malformed JSON is silently ignored (spec.md
/// S7).
fn def_annotation_analysis(stmt: &Stmt, loc_of: &impl LocationOf, stmt_loc: &NodeId, definition: &mut RefSet) {
    for lit in collect_string_literals_in_stmt(stmt) {
        let text = lit.value.to_string();
        let Some(json) = text.strip_prefix("defs: ") else { continue };
        let Ok(entries) = serde_json::from_str::<Vec<DefAnnotationEntry>>(json) else { continue };
        let lit_loc = loc_of.location_of(lit.range());
        for entry in entries {
            if entry.pos.len() != 2 || entry.pos[0].len() != 2 || entry.pos[1].len() != 2 {
                continue;
            }
            let first_line = (lit_loc.first_line as i64 + entry.pos[0][0]).max(0) as u32;
            let last_line = (lit_loc.first_line as i64 + entry.pos[1][0]).max(0) as u32;
            let mut loc = SourceLocation::new(first_line, entry.pos[0][1].max(0) as u32, last_line, entry.pos[1][1].max(0) as u32);
            if let Some(path) = &lit_loc.path {
                loc = loc.with_path(Arc::clone(path));
            }
            definition.add(Ref::new(entry.name, RefKind::Magic, RefLevel::Definition, loc, stmt_loc.clone()));
        }
    }
}

fn shape_rules(stmt: &Stmt, incoming_defs: &RefSet, symtab: &mut SymbolTable, loc_of: &impl LocationOf, stmt_loc: &NodeId, definition: &mut RefSet, update: &mut RefSet) {
    match stmt {
        Stmt::Import(imp) => {
            for alias in &imp.names {
                let local = alias.asname.as_ref().map(|a| a.id.to_string()).unwrap_or_else(|| alias.name.id.to_string());
                definition.add(Ref::new(local, RefKind::Import, RefLevel::Definition, loc_of.location_of(alias.range()), stmt_loc.clone()));
                symtab.import_module(alias.name.id.as_str(), alias.asname.as_ref().map(|a| a.id.as_str()));
            }
        }
        Stmt::ImportFrom(imp) => {
            let module_path = imp.module.as_ref().map(|m| m.id.to_string()).unwrap_or_default();
            let mut names = Vec::new();
            for alias in &imp.names {
                let local = alias.asname.as_ref().map(|a| a.id.to_string()).unwrap_or_else(|| alias.name.id.to_string());
                definition.add(Ref::new(local, RefKind::Import, RefLevel::Definition, loc_of.location_of(alias.range()), stmt_loc.clone()));
                names.push(alias.name.id.to_string());
            }
            symtab.import_module_definitions(&module_path, &names);
        }
        Stmt::FunctionDef(f) => {
            definition.add(Ref::new(f.name.id.to_string(), RefKind::Function, RefLevel::Definition, loc_of.location_of(f.name.range()), stmt_loc.clone()));
            let params = parameter_names(f);
            let updates = crate::dataflow::analyze_parameter_side_effects(&f.body, &params, symtab, loc_of);
            symtab.register_function(FunctionSpec { name: f.name.id.to_string(), reads: Vec::new(), updates, returns: None, returns_type: None, higherorder: false });
        }
        Stmt::ClassDef(c) => {
            definition.add(Ref::new(c.name.id.to_string(), RefKind::Class, RefLevel::Definition, loc_of.location_of(c.name.range()), stmt_loc.clone()));
        }
        Stmt::Assign(a) => {
            target_analysis(&a.targets, Some(a.value.as_ref()), false, incoming_defs, symtab, loc_of, stmt_loc, definition, update);
        }
        Stmt::AugAssign(a) => {
            target_analysis(std::slice::from_ref(a.target.as_ref()), Some(a.value.as_ref()), true, incoming_defs, symtab, loc_of, stmt_loc, definition, update);
        }
        Stmt::AnnAssign(a) => {
            if let Some(value) = &a.value {
                target_analysis(std::slice::from_ref(a.target.as_ref()), Some(value.as_ref()), false, incoming_defs, symtab, loc_of, stmt_loc, definition, update);
            }
        }
        _ => {}
    }
}

fn parameter_names(f: &ast::StmtFunctionDef) -> Vec<String> {
    let params = &f.parameters;
    params.posonlyargs.iter().chain(params.args.iter()).chain(params.kwonlyargs.iter()).map(|p| p.parameter.name.id.to_string()).collect()
}

/// Target analysis for assignment statements (spec.md S4.D "2. Target
/// analysis"). `source` is the single right-hand-side expression, used only
/// to attach an inferred type to a single bare-name target.
fn target_analysis(targets: &[Expr], source: Option<&Expr>, augmented: bool, incoming_defs: &RefSet, symtab: &SymbolTable, loc_of: &impl LocationOf, stmt_loc: &NodeId, definition: &mut RefSet, update: &mut RefSet) {
    let source_spec = source.and_then(|s| match s {
        Expr::Call(call) => resolve_callee(call, symtab, incoming_defs).map(|(spec, _)| spec),
        _ => None,
    });

    for target in targets {
        link_target(target, augmented, source_spec.as_ref(), targets.len() == 1, loc_of, stmt_loc, definition, update);
    }
}

fn link_target(target: &Expr, augmented: bool, source_spec: Option<&FunctionSpec>, is_sole_target: bool, loc_of: &impl LocationOf, stmt_loc: &NodeId, definition: &mut RefSet, update: &mut RefSet) {
    match target {
        Expr::Name(n) => {
            let level = if augmented { RefLevel::Update } else { RefLevel::Definition };
            let mut r = Ref::new(n.id.to_string(), RefKind::Variable, level, loc_of.location_of(n.range()), stmt_loc.clone());
            if is_sole_target {
                if let Some(spec) = source_spec {
                    if let Some(ty) = &spec.returns_type {
                        r = r.with_inferred_type(ty.clone());
                    }
                }
            }
            match level {
                RefLevel::Definition => definition.add(r),
                _ => update.add(r),
            }
        }
        Expr::Attribute(_) | Expr::Subscript(_) => {
            if let Some((name, range)) = base_name_of(target) {
                update.add(Ref::new(name, RefKind::Variable, RefLevel::Update, loc_of.location_of(range), stmt_loc.clone()));
            }
        }
        Expr::Tuple(t) => {
            for elt in &t.elts {
                link_target(elt, augmented, None, false, loc_of, stmt_loc, definition, update);
            }
        }
        Expr::List(l) => {
            for elt in &l.elts {
                link_target(elt, augmented, None, false, loc_of, stmt_loc, definition, update);
            }
        }
        Expr::Starred(s) => link_target(&s.value, augmented, None, false, loc_of, stmt_loc, definition, update),
        _ => {}
    }
}

/// Walks an attribute/subscript chain down to its root bare name, e.g.
/// `a.b[0].c` -> `a`.
fn base_name_of(expr: &Expr) -> Option<(String, ruff_text_size::TextRange)> {
    match expr {
        Expr::Name(n) => Some((n.id.to_string(), n.range())),
        Expr::Attribute(a) => base_name_of(&a.value),
        Expr::Subscript(s) => base_name_of(&s.value),
        _ => None,
    }
}

/// `getUses(stmt)` (spec.md S4.D "3.").
fn get_uses(stmt: &Stmt, incoming_defs: &RefSet, symtab: &mut SymbolTable, loc_of: &impl LocationOf, stmt_loc: &NodeId) -> RefSet {
    let mut uses = ref_set();
    match stmt {
        Stmt::Assign(a) => add_name_uses(&a.value, loc_of, stmt_loc, &mut uses),
        Stmt::AnnAssign(a) => {
            if let Some(value) = &a.value {
                add_name_uses(value, loc_of, stmt_loc, &mut uses);
            }
        }
        Stmt::AugAssign(a) => {
            add_name_uses(&a.value, loc_of, stmt_loc, &mut uses);
            add_name_uses(&a.target, loc_of, stmt_loc, &mut uses);
        }
        Stmt::FunctionDef(f) => {
            let params = parameter_names(f);
            uses = crate::dataflow::free_variables_of_function_body(&f.body, &params, symtab, loc_of);
        }
        Stmt::ClassDef(c) => {
            let mut extractor = Extractor::new();
            for body_stmt in &c.body {
                let du = extractor.get_def_use_for_statement(body_stmt, incoming_defs, symtab, loc_of);
                uses = uses.union([du.uses]);
            }
        }
        _ => {
            for name in crate::walker::collect_names_in_stmt(stmt) {
                uses.add(Ref::new(name, RefKind::Variable, RefLevel::Use, stmt_loc.clone(), stmt_loc.clone()));
            }
        }
    }
    uses
}

fn add_name_uses(expr: &Expr, loc_of: &impl LocationOf, stmt_loc: &NodeId, uses: &mut RefSet) {
    for name in collect_names_in_expr(expr) {
        uses.add(Ref::new(name, RefKind::Variable, RefLevel::Use, loc_of.location_of(expr.range()), stmt_loc.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn plain_assignment_defines_target_and_uses_value() {
        let module = parse("a = 1\nb = a\n", None).unwrap();
        let mut symtab = SymbolTable::new();
        let mut extractor = Extractor::new();
        let incoming = ref_set();
        let loc = loc_fn(&module);
        let du = extractor.get_def_use_for_statement(&module.body[1], &incoming, &mut symtab, &loc);
        assert_eq!(du.definition.size(), 1);
        assert!(du.uses.some(|r| r.name == "a"));
    }

    #[test]
    fn augmented_assignment_both_updates_and_uses() {
        let module = parse("a += 1\n", None).unwrap();
        let mut symtab = SymbolTable::new();
        let mut extractor = Extractor::new();
        let incoming = ref_set();
        let loc = loc_fn(&module);
        let du = extractor.get_def_use_for_statement(&module.body[0], &incoming, &mut symtab, &loc);
        assert_eq!(du.update.size(), 1);
        assert!(du.uses.some(|r| r.name == "a"));
    }

    #[test]
    fn subscript_target_updates_container_not_defines() {
        let module = parse("d['k'] = v\n", None).unwrap();
        let mut symtab = SymbolTable::new();
        let mut extractor = Extractor::new();
        let incoming = ref_set();
        let loc = loc_fn(&module);
        let du = extractor.get_def_use_for_statement(&module.body[0], &incoming, &mut symtab, &loc);
        assert!(du.definition.empty());
        assert!(du.update.some(|r| r.name == "d"));
    }

    #[test]
    fn unknown_callee_mutates_every_bare_argument() {
        let module = parse("mystery(x, y)\n", None).unwrap();
        let mut symtab = SymbolTable::new();
        let mut extractor = Extractor::new();
        let incoming = ref_set();
        let loc = loc_fn(&module);
        let du = extractor.get_def_use_for_statement(&module.body[0], &incoming, &mut symtab, &loc);
        assert!(du.update.some(|r| r.name == "x"));
        assert!(du.update.some(|r| r.name == "y"));
    }

    #[test]
    fn cache_returns_equal_triples_on_repeat_lookup() {
        let module = parse("a = 1\n", None).unwrap();
        let mut symtab = SymbolTable::new();
        let mut extractor = Extractor::new();
        let incoming = ref_set();
        let loc = loc_fn(&module);
        let first = extractor.get_def_use_for_statement(&module.body[0], &incoming, &mut symtab, &loc);
        let second = extractor.get_def_use_for_statement(&module.body[0], &incoming, &mut symtab, &loc);
        assert!(first.equals(&second));
    }
}
