//! Full-grammar parsing via `rustpython-parser`, and a read-only walk over the
//! resulting tree.
//!
//! The validator works on this tree so any syntactically valid program gets a
//! verdict on its imports and calls, even when it uses constructs the
//! interpreter does not run. Those are rejected later, by the compiler.

pub use rustpython_parser::ast as py;
use rustpython_parser::ast::Ranged;
use rustpython_parser::Parse;

use super::SyntaxError;

/// Name reported in parser diagnostics.
const SOURCE_PATH: &str = "<program>";

/// Parsed module plus the offsets needed to report line numbers.
#[derive(Debug)]
pub struct ParsedModule {
    pub body: Vec<py::Stmt>,
    pub lines: LineIndex,
}

/// Parse a whole program.
pub fn parse_module(source: &str) -> Result<ParsedModule, SyntaxError> {
    let lines = LineIndex::new(source);
    match py::Suite::parse(source, SOURCE_PATH) {
        Ok(body) => Ok(ParsedModule { body, lines }),
        Err(e) => Err(SyntaxError::new(
            e.error.to_string(),
            lines.line_at(usize::from(e.offset)),
        )),
    }
}

/// Byte offset to 1-based line number.
#[derive(Debug, Clone)]
pub struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        Self {
            newlines: source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i)
                .collect(),
        }
    }

    pub fn line_at(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&nl| nl < offset) + 1
    }

    /// Line on which `node` starts.
    pub fn line_of<T: Ranged>(&self, node: &T) -> usize {
        self.line_at(usize::from(node.start()))
    }
}

/// Override the hooks you need and call the matching `walk_*` to keep descending.
pub trait SyntaxVisitor {
    fn visit_stmt(&mut self, stmt: &py::Stmt, lines: &LineIndex) {
        walk_stmt(self, stmt, lines);
    }

    fn visit_expr(&mut self, expr: &py::Expr, lines: &LineIndex) {
        walk_expr(self, expr, lines);
    }
}

pub fn walk_suite<V: SyntaxVisitor + ?Sized>(v: &mut V, body: &[py::Stmt], lines: &LineIndex) {
    for stmt in body {
        v.visit_stmt(stmt, lines);
    }
}

fn walk_exprs<'a, V, I>(v: &mut V, exprs: I, lines: &LineIndex)
where
    V: SyntaxVisitor + ?Sized,
    I: IntoIterator<Item = &'a py::Expr>,
{
    for e in exprs {
        v.visit_expr(e, lines);
    }
}

fn walk_arguments<V: SyntaxVisitor + ?Sized>(v: &mut V, args: &py::Arguments, lines: &LineIndex) {
    let all = args
        .posonlyargs
        .iter()
        .chain(args.args.iter())
        .chain(args.kwonlyargs.iter());
    for a in all {
        if let Some(default) = &a.default {
            v.visit_expr(default, lines);
        }
        if let Some(annotation) = &a.def.annotation {
            v.visit_expr(annotation, lines);
        }
    }
}

pub fn walk_stmt<V: SyntaxVisitor + ?Sized>(v: &mut V, stmt: &py::Stmt, lines: &LineIndex) {
    match stmt {
        py::Stmt::FunctionDef(py::StmtFunctionDef {
            args,
            body,
            decorator_list,
            returns,
            ..
        })
        | py::Stmt::AsyncFunctionDef(py::StmtAsyncFunctionDef {
            args,
            body,
            decorator_list,
            returns,
            ..
        }) => {
            walk_exprs(v, decorator_list, lines);
            walk_arguments(v, args, lines);
            if let Some(r) = returns {
                v.visit_expr(r, lines);
            }
            walk_suite(v, body, lines);
        }
        py::Stmt::ClassDef(py::StmtClassDef {
            bases,
            keywords,
            body,
            decorator_list,
            ..
        }) => {
            walk_exprs(v, decorator_list, lines);
            walk_exprs(v, bases, lines);
            walk_exprs(v, keywords.iter().map(|k| &k.value), lines);
            walk_suite(v, body, lines);
        }
        py::Stmt::Return(py::StmtReturn { value, .. }) => {
            walk_exprs(v, value.as_deref(), lines);
        }
        py::Stmt::Delete(py::StmtDelete { targets, .. }) => walk_exprs(v, targets, lines),
        py::Stmt::Assign(py::StmtAssign { targets, value, .. }) => {
            v.visit_expr(value, lines);
            walk_exprs(v, targets, lines);
        }
        py::Stmt::AugAssign(py::StmtAugAssign { target, value, .. }) => {
            v.visit_expr(value, lines);
            v.visit_expr(target, lines);
        }
        py::Stmt::AnnAssign(py::StmtAnnAssign {
            target,
            annotation,
            value,
            ..
        }) => {
            walk_exprs(v, value.as_deref(), lines);
            v.visit_expr(annotation, lines);
            v.visit_expr(target, lines);
        }
        py::Stmt::For(py::StmtFor {
            target,
            iter,
            body,
            orelse,
            ..
        })
        | py::Stmt::AsyncFor(py::StmtAsyncFor {
            target,
            iter,
            body,
            orelse,
            ..
        }) => {
            v.visit_expr(iter, lines);
            v.visit_expr(target, lines);
            walk_suite(v, body, lines);
            walk_suite(v, orelse, lines);
        }
        py::Stmt::While(py::StmtWhile {
            test, body, orelse, ..
        })
        | py::Stmt::If(py::StmtIf {
            test, body, orelse, ..
        }) => {
            v.visit_expr(test, lines);
            walk_suite(v, body, lines);
            walk_suite(v, orelse, lines);
        }
        py::Stmt::With(py::StmtWith { items, body, .. })
        | py::Stmt::AsyncWith(py::StmtAsyncWith { items, body, .. }) => {
            for item in items {
                v.visit_expr(&item.context_expr, lines);
                walk_exprs(v, item.optional_vars.as_deref(), lines);
            }
            walk_suite(v, body, lines);
        }
        py::Stmt::Match(py::StmtMatch { subject, cases, .. }) => {
            v.visit_expr(subject, lines);
            for case in cases {
                walk_exprs(v, case.guard.as_deref(), lines);
                walk_suite(v, &case.body, lines);
            }
        }
        py::Stmt::Raise(py::StmtRaise { exc, cause, .. }) => {
            walk_exprs(v, exc.as_deref(), lines);
            walk_exprs(v, cause.as_deref(), lines);
        }
        py::Stmt::Try(py::StmtTry {
            body,
            handlers,
            orelse,
            finalbody,
            ..
        })
        | py::Stmt::TryStar(py::StmtTryStar {
            body,
            handlers,
            orelse,
            finalbody,
            ..
        }) => {
            walk_suite(v, body, lines);
            for handler in handlers {
                let py::ExceptHandler::ExceptHandler(h) = handler;
                walk_exprs(v, h.type_.as_deref(), lines);
                walk_suite(v, &h.body, lines);
            }
            walk_suite(v, orelse, lines);
            walk_suite(v, finalbody, lines);
        }
        py::Stmt::Assert(py::StmtAssert { test, msg, .. }) => {
            v.visit_expr(test, lines);
            walk_exprs(v, msg.as_deref(), lines);
        }
        py::Stmt::Expr(py::StmtExpr { value, .. }) => v.visit_expr(value, lines),
        // imports, global/nonlocal, pass, break, continue
        _ => {}
    }
}

fn walk_generators<V: SyntaxVisitor + ?Sized>(v: &mut V, generators: &[py::Comprehension], lines: &LineIndex) {
    for g in generators {
        v.visit_expr(&g.iter, lines);
        v.visit_expr(&g.target, lines);
        walk_exprs(v, &g.ifs, lines);
    }
}

pub fn walk_expr<V: SyntaxVisitor + ?Sized>(v: &mut V, expr: &py::Expr, lines: &LineIndex) {
    match expr {
        py::Expr::BoolOp(py::ExprBoolOp { values, .. }) => walk_exprs(v, values, lines),
        py::Expr::NamedExpr(py::ExprNamedExpr { target, value, .. }) => {
            v.visit_expr(value, lines);
            v.visit_expr(target, lines);
        }
        py::Expr::BinOp(py::ExprBinOp { left, right, .. }) => {
            v.visit_expr(left, lines);
            v.visit_expr(right, lines);
        }
        py::Expr::UnaryOp(py::ExprUnaryOp { operand, .. }) => v.visit_expr(operand, lines),
        py::Expr::Lambda(py::ExprLambda { args, body, .. }) => {
            walk_arguments(v, args, lines);
            v.visit_expr(body, lines);
        }
        py::Expr::IfExp(py::ExprIfExp {
            test, body, orelse, ..
        }) => {
            v.visit_expr(test, lines);
            v.visit_expr(body, lines);
            v.visit_expr(orelse, lines);
        }
        py::Expr::Dict(py::ExprDict { keys, values, .. }) => {
            walk_exprs(v, keys.iter().flatten(), lines);
            walk_exprs(v, values, lines);
        }
        py::Expr::Set(py::ExprSet { elts, .. })
        | py::Expr::List(py::ExprList { elts, .. })
        | py::Expr::Tuple(py::ExprTuple { elts, .. }) => walk_exprs(v, elts, lines),
        py::Expr::ListComp(py::ExprListComp { elt, generators, .. })
        | py::Expr::SetComp(py::ExprSetComp { elt, generators, .. })
        | py::Expr::GeneratorExp(py::ExprGeneratorExp { elt, generators, .. }) => {
            walk_generators(v, generators, lines);
            v.visit_expr(elt, lines);
        }
        py::Expr::DictComp(py::ExprDictComp {
            key,
            value,
            generators,
            ..
        }) => {
            walk_generators(v, generators, lines);
            v.visit_expr(key, lines);
            v.visit_expr(value, lines);
        }
        py::Expr::Await(py::ExprAwait { value, .. })
        | py::Expr::YieldFrom(py::ExprYieldFrom { value, .. })
        | py::Expr::Attribute(py::ExprAttribute { value, .. })
        | py::Expr::Starred(py::ExprStarred { value, .. }) => v.visit_expr(value, lines),
        py::Expr::Yield(py::ExprYield { value, .. }) => walk_exprs(v, value.as_deref(), lines),
        py::Expr::Compare(py::ExprCompare {
            left, comparators, ..
        }) => {
            v.visit_expr(left, lines);
            walk_exprs(v, comparators, lines);
        }
        py::Expr::Call(py::ExprCall {
            func,
            args,
            keywords,
            ..
        }) => {
            v.visit_expr(func, lines);
            walk_exprs(v, args, lines);
            walk_exprs(v, keywords.iter().map(|k| &k.value), lines);
        }
        py::Expr::FormattedValue(py::ExprFormattedValue {
            value, format_spec, ..
        }) => {
            v.visit_expr(value, lines);
            walk_exprs(v, format_spec.as_deref(), lines);
        }
        py::Expr::JoinedStr(py::ExprJoinedStr { values, .. }) => walk_exprs(v, values, lines),
        py::Expr::Subscript(py::ExprSubscript { value, slice, .. }) => {
            v.visit_expr(value, lines);
            v.visit_expr(slice, lines);
        }
        py::Expr::Slice(py::ExprSlice {
            lower, upper, step, ..
        }) => {
            walk_exprs(v, lower.as_deref(), lines);
            walk_exprs(v, upper.as_deref(), lines);
            walk_exprs(v, step.as_deref(), lines);
        }
        // constants and names
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Calls(Vec<(String, usize)>);

    impl SyntaxVisitor for Calls {
        fn visit_expr(&mut self, expr: &py::Expr, lines: &LineIndex) {
            if let py::Expr::Call(call) = expr {
                if let py::Expr::Name(name) = call.func.as_ref() {
                    self.0.push((name.id.as_str().to_string(), lines.line_of(expr)));
                }
            }
            walk_expr(self, expr, lines);
        }
    }

    #[test]
    fn test_line_index() {
        let lines = LineIndex::new("a\nbb\n\nc");
        assert_eq!(lines.line_at(0), 1);
        assert_eq!(lines.line_at(2), 2);
        assert_eq!(lines.line_at(5), 3);
        assert_eq!(lines.line_at(6), 4);
    }

    #[test]
    fn test_walk_reaches_constructs_the_interpreter_rejects() {
        let parsed = parse_module(
            "class A:\n    x = f()\nwith g() as h:\n    pass\ns = {k() for k in ks}\n",
        )
        .unwrap();
        let mut calls = Calls::default();
        walk_suite(&mut calls, &parsed.body, &parsed.lines);
        assert_eq!(
            calls.0,
            vec![("f".to_string(), 2), ("g".to_string(), 3), ("k".to_string(), 5)]
        );
    }

    #[test]
    fn test_syntax_error_has_line() {
        let err = parse_module("x = 1\ny = (2,\n").unwrap_err();
        assert!(err.line >= 2, "{:?}", err);
    }
}
