//! CFG builder collaborator (spec.md S6).
//!
//! Builds a statement-granularity control-flow graph: every statement
//! (including ones nested inside `if`/`while`/`for`/`with`/`try`, but *not*
//! inside a nested `def`/`class` body, which gets its own CFG when needed)
//! is one block. This is a legitimate simplification of "a block" for a
//! collaborator spec.md explicitly puts out of scope for the core -- the
//! dataflow analyzer (component E) only ever needs per-block predecessors/
//! successors and a statement to process, both of which a singleton block
//! provides directly.

use crate::refs::NodeId;
use indexmap::{IndexMap, IndexSet};
use ruff_python_ast::Stmt;

pub struct Cfg<'a> {
    /// Statements in program (pre)order, each tagged with its location.
    order: Vec<NodeId>,
    statements: IndexMap<NodeId, &'a Stmt>,
    successors: IndexMap<NodeId, IndexSet<NodeId>>,
    predecessors: IndexMap<NodeId, IndexSet<NodeId>>,
    /// `(controller, dependent)` pairs: `dependent` only runs if control
    /// reaches `controller` and takes the branch/loop it guards.
    control_deps: Vec<(NodeId, NodeId)>,
}

impl<'a> Cfg<'a> {
    pub fn blocks(&self) -> impl DoubleEndedIterator<Item = (NodeId, &'a Stmt)> + '_ {
        self.order.iter().map(move |id| (id.clone(), *self.statements.get(id).unwrap()))
    }

    pub fn entry(&self) -> Option<NodeId> {
        self.order.first().cloned()
    }

    pub fn exit(&self) -> Option<NodeId> {
        self.order.last().cloned()
    }

    pub fn get_predecessors(&self, id: &NodeId) -> Vec<NodeId> {
        self.predecessors.get(id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn get_successors(&self, id: &NodeId) -> Vec<NodeId> {
        self.successors.get(id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn visit_control_dependencies(&self, mut cb: impl FnMut(&NodeId, &NodeId)) {
        for (controller, dependent) in &self.control_deps {
            cb(controller, dependent);
        }
    }

    pub fn statement(&self, id: &NodeId) -> Option<&'a Stmt> {
        self.statements.get(id).copied()
    }
}

/// Builds a CFG over a flat statement list (either a whole module body or a
/// single function's body, per spec.md S4.D `getUses` "def" case).
pub fn build<'a>(body: &'a [Stmt], loc_of: &impl Fn(&Stmt) -> NodeId) -> Cfg<'a> {
    let mut builder = Builder { order: Vec::new(), statements: IndexMap::new(), successors: IndexMap::new(), predecessors: IndexMap::new(), control_deps: Vec::new(), loc_of };
    let exits = builder.link_block(body);
    // Nothing follows the top-level block; `exits` intentionally unused
    // past this point other than to drive construction order.
    let _ = exits;
    Cfg { order: builder.order, statements: builder.statements, successors: builder.successors, predecessors: builder.predecessors, control_deps: builder.control_deps }
}

struct Builder<'a, 'b, F: Fn(&Stmt) -> NodeId> {
    order: Vec<NodeId>,
    statements: IndexMap<NodeId, &'a Stmt>,
    successors: IndexMap<NodeId, IndexSet<NodeId>>,
    predecessors: IndexMap<NodeId, IndexSet<NodeId>>,
    control_deps: Vec<(NodeId, NodeId)>,
    loc_of: &'b F,
}

impl<'a, 'b, F: Fn(&Stmt) -> NodeId> Builder<'a, 'b, F> {
    fn add_statement(&mut self, stmt: &'a Stmt) -> NodeId {
        let id = (self.loc_of)(stmt);
        self.order.push(id.clone());
        self.statements.insert(id.clone(), stmt);
        self.successors.entry(id.clone()).or_default();
        self.predecessors.entry(id.clone()).or_default();
        id
    }

    fn add_edge(&mut self, from: &NodeId, to: &NodeId) {
        self.successors.entry(from.clone()).or_default().insert(to.clone());
        self.predecessors.entry(to.clone()).or_default().insert(from.clone());
    }

    /// Links a straight-line or branching block of statements, returning
    /// the set of "exit" statement ids -- blocks that fall through to
    /// whatever follows this one (there can be more than one, e.g. the last
    /// statement of each branch of an `if`).
    fn link_block(&mut self, body: &'a [Stmt]) -> IndexSet<NodeId> {
        let mut exits: IndexSet<NodeId> = IndexSet::new();
        for stmt in body {
            let id = self.add_statement(stmt);
            for prev in &exits {
                self.add_edge(prev, &id);
            }
            exits = self.link_statement(stmt, id);
        }
        exits
    }

    /// Links a single statement's internal branching structure, returning
    /// its fall-through exits (usually just itself).
    fn link_statement(&mut self, stmt: &'a Stmt, id: NodeId) -> IndexSet<NodeId> {
        match stmt {
            Stmt::If(i) => {
                let mut exits = IndexSet::new();
                for sub in self.link_controlled_block(&id, &i.body) {
                    exits.insert(sub);
                }
                let mut had_else = false;
                for clause in &i.elif_else_clauses {
                    if clause.test.is_none() {
                        had_else = true;
                    }
                    for sub in self.link_controlled_block(&id, &clause.body) {
                        exits.insert(sub);
                    }
                }
                if !had_else {
                    exits.insert(id.clone());
                }
                exits
            }
            Stmt::While(w) => {
                let body_exits = self.link_controlled_block(&id, &w.body);
                for exit in &body_exits {
                    self.add_edge(exit, &id);
                }
                let mut exits: IndexSet<NodeId> = self.link_controlled_block(&id, &w.orelse);
                exits.insert(id.clone());
                exits
            }
            Stmt::For(f) => {
                let body_exits = self.link_controlled_block(&id, &f.body);
                for exit in &body_exits {
                    self.add_edge(exit, &id);
                }
                let mut exits: IndexSet<NodeId> = self.link_controlled_block(&id, &f.orelse);
                exits.insert(id.clone());
                exits
            }
            Stmt::With(w) => self.link_controlled_block(&id, &w.body),
            Stmt::Try(t) => {
                let mut exits = self.link_controlled_block(&id, &t.body);
                for handler in &t.handlers {
                    let ruff_python_ast::ExceptHandler::ExceptHandler(h) = handler;
                    for sub in self.link_controlled_block(&id, &h.body) {
                        exits.insert(sub);
                    }
                }
                for sub in self.link_controlled_block(&id, &t.orelse) {
                    exits.insert(sub);
                }
                if !t.finalbody.is_empty() {
                    let final_exits = self.link_controlled_block(&id, &t.finalbody);
                    let order = self.order.clone();
                    for exit in &exits {
                        for fin_first in order.iter() {
                            if t.finalbody.iter().any(|s| (self.loc_of)(s) == *fin_first) {
                                self.add_edge(exit, fin_first);
                                break;
                            }
                        }
                    }
                    return final_exits;
                }
                exits
            }
            // `def`/`class` bodies get their own CFG on demand (spec.md
            // S4.D, S4.E) and are not linked into this one; `match` arms,
            // `return`/`raise`/`break`/`continue` and everything else are
            // treated as straight-line for this simplified collaborator.
            _ => IndexSet::from([id]),
        }
    }

    fn link_controlled_block(&mut self, controller: &NodeId, body: &'a [Stmt]) -> IndexSet<NodeId> {
        let exits = self.link_block(body);
        for stmt in body {
            let id = (self.loc_of)(stmt);
            self.control_deps.push((controller.clone(), id));
        }
        exits
    }
}
