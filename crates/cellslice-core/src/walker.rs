//! Tree walker collaborator (spec.md S6): preorder/postorder traversal with
//! `on_enter`/`on_exit` callbacks over the subject language's parse tree.
//!
//! The core never pattern-matches the full `Stmt`/`Expr` grammar more than
//! once -- every component that needs "every bare name in this subtree" or
//! "every call in this subtree" drives this walker instead of re-deriving
//! its own recursion, matching spec.md S9's "tagged variant... each
//! component handles the shapes it needs and treats the rest uniformly."

use ruff_python_ast::{self as ast, Expr, Stmt};

/// A node handed to the walker's callbacks. Borrows rather than owns so the
/// walker stays a thin, zero-copy traversal.
#[derive(Debug, Clone, Copy)]
pub enum AnyNode<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
}

pub trait Visitor<'a> {
    fn on_enter(&mut self, _node: AnyNode<'a>, _ancestors: &[AnyNode<'a>]) {}
    fn on_exit(&mut self, _node: AnyNode<'a>, _ancestors: &[AnyNode<'a>]) {}
}

/// Walks every statement in `body` in source order.
pub fn walk_block<'a, V: Visitor<'a>>(body: &'a [Stmt], ancestors: &mut Vec<AnyNode<'a>>, v: &mut V) {
    for stmt in body {
        walk_stmt(stmt, ancestors, v);
    }
}

pub fn walk_stmt<'a, V: Visitor<'a>>(stmt: &'a Stmt, ancestors: &mut Vec<AnyNode<'a>>, v: &mut V) {
    let node = AnyNode::Stmt(stmt);
    v.on_enter(node, ancestors);
    ancestors.push(node);

    match stmt {
        Stmt::FunctionDef(f) => {
            for d in &f.decorator_list {
                walk_expr(&d.expression, ancestors, v);
            }
            let params = &f.parameters;
            for p in params.posonlyargs.iter().chain(params.args.iter()).chain(params.kwonlyargs.iter()) {
                if let Some(default) = &p.default {
                    walk_expr(default, ancestors, v);
                }
                if let Some(annotation) = &p.parameter.annotation {
                    walk_expr(annotation, ancestors, v);
                }
            }
            if let Some(r) = &f.returns {
                walk_expr(r, ancestors, v);
            }
            walk_block(&f.body, ancestors, v);
        }
        Stmt::ClassDef(c) => {
            for d in &c.decorator_list {
                walk_expr(&d.expression, ancestors, v);
            }
            if let Some(args) = &c.arguments {
                for a in &args.args {
                    walk_expr(a, ancestors, v);
                }
                for kw in &args.keywords {
                    walk_expr(&kw.value, ancestors, v);
                }
            }
            walk_block(&c.body, ancestors, v);
        }
        Stmt::Return(r) => {
            if let Some(value) = &r.value {
                walk_expr(value, ancestors, v);
            }
        }
        Stmt::Delete(d) => {
            for t in &d.targets {
                walk_expr(t, ancestors, v);
            }
        }
        Stmt::TypeAlias(t) => {
            walk_expr(&t.value, ancestors, v);
        }
        Stmt::Assign(a) => {
            for t in &a.targets {
                walk_expr(t, ancestors, v);
            }
            walk_expr(&a.value, ancestors, v);
        }
        Stmt::AugAssign(a) => {
            walk_expr(&a.target, ancestors, v);
            walk_expr(&a.value, ancestors, v);
        }
        Stmt::AnnAssign(a) => {
            walk_expr(&a.target, ancestors, v);
            walk_expr(&a.annotation, ancestors, v);
            if let Some(value) = &a.value {
                walk_expr(value, ancestors, v);
            }
        }
        Stmt::For(f) => {
            walk_expr(&f.target, ancestors, v);
            walk_expr(&f.iter, ancestors, v);
            walk_block(&f.body, ancestors, v);
            walk_block(&f.orelse, ancestors, v);
        }
        Stmt::While(w) => {
            walk_expr(&w.test, ancestors, v);
            walk_block(&w.body, ancestors, v);
            walk_block(&w.orelse, ancestors, v);
        }
        Stmt::If(i) => {
            walk_expr(&i.test, ancestors, v);
            walk_block(&i.body, ancestors, v);
            for clause in &i.elif_else_clauses {
                if let Some(test) = &clause.test {
                    walk_expr(test, ancestors, v);
                }
                walk_block(&clause.body, ancestors, v);
            }
        }
        Stmt::With(w) => {
            for item in &w.items {
                walk_expr(&item.context_expr, ancestors, v);
                if let Some(vars) = &item.optional_vars {
                    walk_expr(vars, ancestors, v);
                }
            }
            walk_block(&w.body, ancestors, v);
        }
        Stmt::Match(m) => {
            walk_expr(&m.subject, ancestors, v);
            for case in &m.cases {
                walk_block(&case.body, ancestors, v);
            }
        }
        Stmt::Raise(r) => {
            if let Some(exc) = &r.exc {
                walk_expr(exc, ancestors, v);
            }
            if let Some(cause) = &r.cause {
                walk_expr(cause, ancestors, v);
            }
        }
        Stmt::Try(t) => {
            walk_block(&t.body, ancestors, v);
            for handler in &t.handlers {
                let ast::ExceptHandler::ExceptHandler(h) = handler;
                if let Some(ty) = &h.type_ {
                    walk_expr(ty, ancestors, v);
                }
                walk_block(&h.body, ancestors, v);
            }
            walk_block(&t.orelse, ancestors, v);
            walk_block(&t.finalbody, ancestors, v);
        }
        Stmt::Assert(a) => {
            walk_expr(&a.test, ancestors, v);
            if let Some(msg) = &a.msg {
                walk_expr(msg, ancestors, v);
            }
        }
        Stmt::Import(_) | Stmt::ImportFrom(_) | Stmt::Global(_) | Stmt::Nonlocal(_) | Stmt::Pass(_) | Stmt::Break(_) | Stmt::Continue(_) | Stmt::IpyEscapeCommand(_) => {}
        Stmt::Expr(e) => walk_expr(&e.value, ancestors, v),
    }

    ancestors.pop();
    v.on_exit(node, ancestors);
}

pub fn walk_expr<'a, V: Visitor<'a>>(expr: &'a Expr, ancestors: &mut Vec<AnyNode<'a>>, v: &mut V) {
    let node = AnyNode::Expr(expr);
    v.on_enter(node, ancestors);
    ancestors.push(node);

    match expr {
        Expr::BoolOp(b) => {
            for v2 in &b.values {
                walk_expr(v2, ancestors, v);
            }
        }
        Expr::Named(n) => {
            walk_expr(&n.target, ancestors, v);
            walk_expr(&n.value, ancestors, v);
        }
        Expr::BinOp(b) => {
            walk_expr(&b.left, ancestors, v);
            walk_expr(&b.right, ancestors, v);
        }
        Expr::UnaryOp(u) => walk_expr(&u.operand, ancestors, v),
        Expr::Lambda(l) => walk_expr(&l.body, ancestors, v),
        Expr::If(i) => {
            walk_expr(&i.test, ancestors, v);
            walk_expr(&i.body, ancestors, v);
            walk_expr(&i.orelse, ancestors, v);
        }
        Expr::Dict(d) => {
            for item in &d.items {
                if let Some(key) = &item.key {
                    walk_expr(key, ancestors, v);
                }
                walk_expr(&item.value, ancestors, v);
            }
        }
        Expr::Set(s) => {
            for e in &s.elts {
                walk_expr(e, ancestors, v);
            }
        }
        Expr::ListComp(c) => {
            walk_expr(&c.elt, ancestors, v);
            walk_comprehensions(&c.generators, ancestors, v);
        }
        Expr::SetComp(c) => {
            walk_expr(&c.elt, ancestors, v);
            walk_comprehensions(&c.generators, ancestors, v);
        }
        Expr::DictComp(c) => {
            if let Some(key) = &c.key {
                walk_expr(key, ancestors, v);
            }
            walk_expr(&c.value, ancestors, v);
            walk_comprehensions(&c.generators, ancestors, v);
        }
        Expr::Generator(c) => {
            walk_expr(&c.elt, ancestors, v);
            walk_comprehensions(&c.generators, ancestors, v);
        }
        Expr::Await(a) => walk_expr(&a.value, ancestors, v),
        Expr::Yield(y) => {
            if let Some(value) = &y.value {
                walk_expr(value, ancestors, v);
            }
        }
        Expr::YieldFrom(y) => walk_expr(&y.value, ancestors, v),
        Expr::Compare(c) => {
            walk_expr(&c.left, ancestors, v);
            for comparator in &c.comparators {
                walk_expr(comparator, ancestors, v);
            }
        }
        Expr::Call(c) => {
            walk_expr(&c.func, ancestors, v);
            for a in &c.arguments.args {
                walk_expr(a, ancestors, v);
            }
            for kw in &c.arguments.keywords {
                walk_expr(&kw.value, ancestors, v);
            }
        }
        Expr::FString(f) => {
            for part in &f.value {
                if let ast::FStringPart::FString(fstring) = part {
                    for element in &fstring.elements {
                        if let ast::InterpolatedStringElement::Interpolation(interp) = element {
                            walk_expr(&interp.expression, ancestors, v);
                        }
                    }
                }
            }
        }
        Expr::TString(_) => {}
        Expr::StringLiteral(_) | Expr::BytesLiteral(_) | Expr::NumberLiteral(_) | Expr::BooleanLiteral(_) | Expr::NoneLiteral(_) | Expr::EllipsisLiteral(_) | Expr::Name(_) => {}
        Expr::Attribute(a) => walk_expr(&a.value, ancestors, v),
        Expr::Subscript(s) => {
            walk_expr(&s.value, ancestors, v);
            walk_expr(&s.slice, ancestors, v);
        }
        Expr::Starred(s) => walk_expr(&s.value, ancestors, v),
        Expr::List(l) => {
            for e in &l.elts {
                walk_expr(e, ancestors, v);
            }
        }
        Expr::Tuple(t) => {
            for e in &t.elts {
                walk_expr(e, ancestors, v);
            }
        }
        Expr::Slice(s) => {
            if let Some(lower) = &s.lower {
                walk_expr(lower, ancestors, v);
            }
            if let Some(upper) = &s.upper {
                walk_expr(upper, ancestors, v);
            }
            if let Some(step) = &s.step {
                walk_expr(step, ancestors, v);
            }
        }
        Expr::IpyEscapeCommand(_) => {}
    }

    ancestors.pop();
    v.on_exit(node, ancestors);
}

fn walk_comprehensions<'a, V: Visitor<'a>>(generators: &'a [ast::Comprehension], ancestors: &mut Vec<AnyNode<'a>>, v: &mut V) {
    for comp in generators {
        walk_expr(&comp.target, ancestors, v);
        walk_expr(&comp.iter, ancestors, v);
        for cond in &comp.ifs {
            walk_expr(cond, ancestors, v);
        }
    }
}

/// Collects every bare `Name` identifier under `expr`, in traversal order.
/// This backs the default "gather free names" rule (spec.md S4.D `getUses`
/// "otherwise" case, and `getDefs`' unresolved-call fallback).
pub fn collect_names_in_expr(expr: &Expr) -> Vec<String> {
    struct NameCollector(Vec<String>);
    impl<'a> Visitor<'a> for NameCollector {
        fn on_enter(&mut self, node: AnyNode<'a>, _ancestors: &[AnyNode<'a>]) {
            if let AnyNode::Expr(Expr::Name(n)) = node {
                self.0.push(n.id.to_string());
            }
        }
    }
    let mut collector = NameCollector(Vec::new());
    let mut ancestors = Vec::new();
    walk_expr(expr, &mut ancestors, &mut collector);
    collector.0
}

pub fn collect_names_in_stmt(stmt: &Stmt) -> Vec<String> {
    struct NameCollector(Vec<String>);
    impl<'a> Visitor<'a> for NameCollector {
        fn on_enter(&mut self, node: AnyNode<'a>, _ancestors: &[AnyNode<'a>]) {
            if let AnyNode::Expr(Expr::Name(n)) = node {
                self.0.push(n.id.to_string());
            }
        }
    }
    let mut collector = NameCollector(Vec::new());
    let mut ancestors = Vec::new();
    walk_stmt(stmt, &mut ancestors, &mut collector);
    collector.0
}

/// Collects every `Call` expression under `stmt`, in traversal order. Backs
/// the call analysis in spec.md S4.D.
pub fn collect_calls_in_stmt(stmt: &Stmt) -> Vec<&ast::ExprCall> {
    struct CallCollector<'a>(Vec<&'a ast::ExprCall>);
    impl<'a> Visitor<'a> for CallCollector<'a> {
        fn on_enter(&mut self, node: AnyNode<'a>, _ancestors: &[AnyNode<'a>]) {
            if let AnyNode::Expr(Expr::Call(c)) = node {
                self.0.push(c);
            }
        }
    }
    let mut collector = CallCollector(Vec::new());
    let mut ancestors = Vec::new();
    walk_stmt(stmt, &mut ancestors, &mut collector);
    collector.0
}

/// Collects every `StringLiteral` expression under `stmt` together with its
/// source range, used by the def-annotation scan (spec.md S4.D).
pub fn collect_string_literals_in_stmt(stmt: &Stmt) -> Vec<&ast::ExprStringLiteral> {
    struct StrCollector<'a>(Vec<&'a ast::ExprStringLiteral>);
    impl<'a> Visitor<'a> for StrCollector<'a> {
        fn on_enter(&mut self, node: AnyNode<'a>, _ancestors: &[AnyNode<'a>]) {
            if let AnyNode::Expr(Expr::StringLiteral(s)) = node {
                self.0.push(s);
            }
        }
    }
    let mut collector = StrCollector(Vec::new());
    let mut ancestors = Vec::new();
    walk_stmt(stmt, &mut ancestors, &mut collector);
    collector.0
}
