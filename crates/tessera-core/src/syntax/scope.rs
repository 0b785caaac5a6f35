//! Scope-aware reference scanning and rewriting.
//!
//! Arrow parameters and `const` / `let` declarations introduce bindings that
//! shadow outer names for the whole arrow (block declarations are hoisted to
//! the top of their block). A reference is *free* when its root identifier is
//! not bound by any enclosing arrow.

use std::collections::HashSet;

use super::ast::*;

/// A free identifier, plus the static member chain hanging off it.
///
/// `userFragment.spread()` yields `["userFragment", "spread"]`;
/// `ns["x"].y` yields `["ns", "x", "y"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FreeReference {
    pub path: Vec<String>,
}

impl FreeReference {
    pub fn root(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or("")
    }
}

/// All free references in `expr`, deduplicated, in first-occurrence order.
pub fn free_references(expr: &Expr) -> Vec<FreeReference> {
    let mut collector = Collector {
        scopes: Scopes::default(),
        seen: HashSet::new(),
        out: Vec::new(),
    };
    collector.expr(expr);
    collector.out
}

/// Replaces free references whose path `lookup` recognizes.
///
/// `lookup` is consulted for two-segment paths (`ns.member`) before the bare
/// root, and returns the replacement expression. Shorthand properties are
/// expanded so `{ a }` becomes `{ a: <replacement> }`.
pub fn rewrite_references<F>(expr: Expr, lookup: F) -> Expr
where
    F: Fn(&[&str]) -> Option<Expr>,
{
    let mut rewriter = Rewriter {
        scopes: Scopes::default(),
        lookup,
    };
    rewriter.expr(expr)
}

#[derive(Default)]
struct Scopes {
    frames: Vec<HashSet<String>>,
}

impl Scopes {
    fn is_bound(&self, name: &str) -> bool {
        self.frames.iter().any(|frame| frame.contains(name))
    }

    fn push(&mut self, names: Vec<String>) {
        self.frames.push(names.into_iter().collect());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }
}

fn param_names(params: &[Param]) -> Vec<String> {
    let mut names = Vec::new();
    for param in params {
        param.pattern.bound_names(&mut names);
    }
    names
}

fn block_names(stmts: &[Stmt]) -> Vec<String> {
    let mut names = Vec::new();
    for stmt in stmts {
        if let Stmt::Decl { declarators, .. } = stmt {
            for decl in declarators {
                decl.pattern.bound_names(&mut names);
            }
        }
    }
    names
}

/// Root identifier and static member names of a member chain.
fn static_chain(expr: &Expr) -> Option<Vec<&str>> {
    match expr {
        Expr::Ident(name) => Some(vec![name.as_str()]),
        Expr::Member {
            object, property, ..
        } => {
            let mut chain = static_chain(object)?;
            match property {
                MemberProp::Ident(name) => chain.push(name),
                MemberProp::Computed(key) => match key.as_ref() {
                    Expr::Lit(Lit::Str(name)) => chain.push(name),
                    _ => return None,
                },
            }
            Some(chain)
        }
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Collection
// ----------------------------------------------------------------------

struct Collector {
    scopes: Scopes,
    seen: HashSet<Vec<String>>,
    out: Vec<FreeReference>,
}

impl Collector {
    fn record(&mut self, path: Vec<String>) {
        if self.seen.insert(path.clone()) {
            self.out.push(FreeReference { path });
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(name) => {
                if !self.scopes.is_bound(name) {
                    self.record(vec![name.clone()]);
                }
            }
            Expr::Lit(_) => {}
            Expr::Template { exprs, .. } => exprs.iter().for_each(|e| self.expr(e)),
            Expr::Array(items) => {
                for item in items {
                    match item {
                        ArrayItem::Expr(e) | ArrayItem::Spread(e) => self.expr(e),
                        ArrayItem::Hole => {}
                    }
                }
            }
            Expr::Object(props) => {
                for prop in props {
                    match prop {
                        Property::KeyValue { key, value } => {
                            self.key(key);
                            self.expr(value);
                        }
                        Property::Shorthand(name) => {
                            if !self.scopes.is_bound(name) {
                                self.record(vec![name.clone()]);
                            }
                        }
                        Property::Spread(e) => self.expr(e),
                    }
                }
            }
            Expr::Member {
                object, property, ..
            } => {
                if let Some(chain) = static_chain(expr) {
                    if !self.scopes.is_bound(chain[0]) {
                        self.record(chain.iter().map(|s| s.to_string()).collect());
                    }
                    return;
                }
                self.expr(object);
                if let MemberProp::Computed(key) = property {
                    self.expr(key);
                }
            }
            Expr::Call { callee, args, .. } => {
                self.expr(callee);
                for arg in args {
                    match arg {
                        Argument::Expr(e) | Argument::Spread(e) => self.expr(e),
                    }
                }
            }
            Expr::Arrow { params, body } => {
                self.scopes.push(param_names(params));
                for param in params {
                    self.pattern(&param.pattern);
                    if let Some(default) = &param.default {
                        self.expr(default);
                    }
                }
                match body {
                    ArrowBody::Expr(e) => self.expr(e),
                    ArrowBody::Block(stmts) => {
                        self.scopes.push(block_names(stmts));
                        for stmt in stmts {
                            self.stmt(stmt);
                        }
                        self.scopes.pop();
                    }
                }
                self.scopes.pop();
            }
            Expr::Unary { arg, .. } => self.expr(arg),
            Expr::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                self.expr(consequent);
                self.expr(alternate);
            }
        }
    }

    fn key(&mut self, key: &PropKey) {
        if let PropKey::Computed(e) = key {
            self.expr(e);
        }
    }

    /// Default values and computed keys inside a pattern.
    fn pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Ident(_) => {}
            Pattern::Object { props, .. } => {
                for prop in props {
                    self.key(&prop.key);
                    self.pattern(&prop.value);
                    if let Some(default) = &prop.default {
                        self.expr(default);
                    }
                }
            }
            Pattern::Array { elems, rest } => {
                for elem in elems.iter().flatten() {
                    self.pattern(&elem.pattern);
                    if let Some(default) = &elem.default {
                        self.expr(default);
                    }
                }
                if let Some(rest) = rest {
                    self.pattern(rest);
                }
            }
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl { declarators, .. } => {
                for decl in declarators {
                    self.pattern(&decl.pattern);
                    if let Some(init) = &decl.init {
                        self.expr(init);
                    }
                }
            }
            Stmt::Return(Some(e)) | Stmt::Expr(e) => self.expr(e),
            Stmt::Return(None) => {}
        }
    }
}

// ----------------------------------------------------------------------
// Rewriting
// ----------------------------------------------------------------------

struct Rewriter<F> {
    scopes: Scopes,
    lookup: F,
}

impl<F> Rewriter<F>
where
    F: Fn(&[&str]) -> Option<Expr>,
{
    fn free_lookup(&self, path: &[&str]) -> Option<Expr> {
        if self.scopes.is_bound(path[0]) {
            return None;
        }
        (self.lookup)(path)
    }

    fn exprs(&mut self, exprs: Vec<Expr>) -> Vec<Expr> {
        exprs.into_iter().map(|e| self.expr(e)).collect()
    }

    fn boxed(&mut self, expr: Box<Expr>) -> Box<Expr> {
        Box::new(self.expr(*expr))
    }

    fn expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Ident(name) => match self.free_lookup(&[name.as_str()]) {
                Some(replacement) => replacement,
                None => Expr::Ident(name),
            },
            Expr::Lit(lit) => Expr::Lit(lit),
            Expr::Template { quasis, exprs } => Expr::Template {
                quasis,
                exprs: self.exprs(exprs),
            },
            Expr::Array(items) => Expr::Array(
                items
                    .into_iter()
                    .map(|item| match item {
                        ArrayItem::Expr(e) => ArrayItem::Expr(self.expr(e)),
                        ArrayItem::Spread(e) => ArrayItem::Spread(self.expr(e)),
                        ArrayItem::Hole => ArrayItem::Hole,
                    })
                    .collect(),
            ),
            Expr::Object(props) => Expr::Object(
                props
                    .into_iter()
                    .map(|prop| match prop {
                        Property::KeyValue { key, value } => Property::KeyValue {
                            key: self.key(key),
                            value: self.expr(value),
                        },
                        Property::Shorthand(name) => match self.free_lookup(&[name.as_str()]) {
                            Some(value) => Property::KeyValue {
                                key: PropKey::Ident(name),
                                value,
                            },
                            None => Property::Shorthand(name),
                        },
                        Property::Spread(e) => Property::Spread(self.expr(e)),
                    })
                    .collect(),
            ),
            Expr::Member {
                object,
                property,
                optional,
            } => {
                if let (Expr::Ident(root), MemberProp::Ident(member)) = (object.as_ref(), &property) {
                    if let Some(replacement) = self.free_lookup(&[root.as_str(), member.as_str()]) {
                        return replacement;
                    }
                }
                if let (Expr::Ident(root), MemberProp::Computed(key)) = (object.as_ref(), &property) {
                    if let Expr::Lit(Lit::Str(member)) = key.as_ref() {
                        if let Some(replacement) =
                            self.free_lookup(&[root.as_str(), member.as_str()])
                        {
                            return replacement;
                        }
                    }
                }
                let property = match property {
                    MemberProp::Ident(name) => MemberProp::Ident(name),
                    MemberProp::Computed(key) => MemberProp::Computed(self.boxed(key)),
                };
                Expr::Member {
                    object: self.boxed(object),
                    property,
                    optional,
                }
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => Expr::Call {
                callee: self.boxed(callee),
                args: args
                    .into_iter()
                    .map(|arg| match arg {
                        Argument::Expr(e) => Argument::Expr(self.expr(e)),
                        Argument::Spread(e) => Argument::Spread(self.expr(e)),
                    })
                    .collect(),
                optional,
            },
            Expr::Arrow { params, body } => {
                self.scopes.push(param_names(&params));
                let params = params
                    .into_iter()
                    .map(|param| Param {
                        pattern: self.pattern(param.pattern),
                        default: param.default.map(|d| self.expr(d)),
                        rest: param.rest,
                    })
                    .collect();
                let body = match body {
                    ArrowBody::Expr(e) => ArrowBody::Expr(self.boxed(e)),
                    ArrowBody::Block(stmts) => {
                        self.scopes.push(block_names(&stmts));
                        let stmts = stmts.into_iter().map(|s| self.stmt(s)).collect();
                        self.scopes.pop();
                        ArrowBody::Block(stmts)
                    }
                };
                self.scopes.pop();
                Expr::Arrow { params, body }
            }
            Expr::Unary { op, arg } => Expr::Unary {
                op,
                arg: self.boxed(arg),
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op,
                left: self.boxed(left),
                right: self.boxed(right),
            },
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => Expr::Conditional {
                test: self.boxed(test),
                consequent: self.boxed(consequent),
                alternate: self.boxed(alternate),
            },
        }
    }

    fn key(&mut self, key: PropKey) -> PropKey {
        match key {
            PropKey::Computed(e) => PropKey::Computed(self.boxed(e)),
            other => other,
        }
    }

    fn pattern(&mut self, pattern: Pattern) -> Pattern {
        match pattern {
            Pattern::Ident(name) => Pattern::Ident(name),
            Pattern::Object { props, rest } => Pattern::Object {
                props: props
                    .into_iter()
                    .map(|prop| ObjectPatternProp {
                        key: self.key(prop.key),
                        value: self.pattern(prop.value),
                        default: prop.default.map(|d| self.expr(d)),
                    })
                    .collect(),
                rest,
            },
            Pattern::Array { elems, rest } => Pattern::Array {
                elems: elems
                    .into_iter()
                    .map(|elem| {
                        elem.map(|elem| ArrayPatternElem {
                            pattern: self.pattern(elem.pattern),
                            default: elem.default.map(|d| self.expr(d)),
                        })
                    })
                    .collect(),
                rest: rest.map(|r| Box::new(self.pattern(*r))),
            },
        }
    }

    fn stmt(&mut self, stmt: Stmt) -> Stmt {
        match stmt {
            Stmt::Decl { kind, declarators } => Stmt::Decl {
                kind,
                declarators: declarators
                    .into_iter()
                    .map(|decl| Declarator {
                        pattern: self.pattern(decl.pattern),
                        init: decl.init.map(|i| self.expr(i)),
                    })
                    .collect(),
            },
            Stmt::Return(value) => Stmt::Return(value.map(|v| self.expr(v))),
            Stmt::Expr(e) => Stmt::Expr(self.expr(e)),
        }
    }
}
