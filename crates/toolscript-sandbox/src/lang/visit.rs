//! Read-only syntax tree traversal shared by the validator and the compiler.
//!
//! Override the `visit_*` hooks you care about and call the matching `walk_*`
//! function to keep descending.

use super::ast::*;

pub trait Visitor {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr, line: usize) {
        walk_expr(self, expr, line);
    }

    /// Assignment, loop, comprehension and `del` targets.
    fn visit_target(&mut self, target: &Target, line: usize) {
        walk_target(self, target, line);
    }

    fn visit_param(&mut self, param: &Param, line: usize) {
        if let Some(default) = &param.default {
            self.visit_expr(default, line);
        }
    }
}

pub fn walk_body<V: Visitor + ?Sized>(v: &mut V, body: &[Stmt]) {
    for stmt in body {
        v.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(v: &mut V, stmt: &Stmt) {
    let line = stmt.line;
    match &stmt.kind {
        StmtKind::Expr(e) => v.visit_expr(e, line),
        StmtKind::Assign { targets, value } => {
            v.visit_expr(value, line);
            for t in targets {
                v.visit_target(t, line);
            }
        }
        StmtKind::AugAssign { target, value, .. } => {
            v.visit_expr(value, line);
            v.visit_target(target, line);
        }
        StmtKind::If { test, body, orelse } | StmtKind::While { test, body, orelse } => {
            v.visit_expr(test, line);
            walk_body(v, body);
            walk_body(v, orelse);
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } => {
            v.visit_expr(iter, line);
            v.visit_target(target, line);
            walk_body(v, body);
            walk_body(v, orelse);
        }
        StmtKind::FunctionDef(def) => {
            for p in &def.params {
                v.visit_param(p, def.line);
            }
            walk_body(v, &def.body);
        }
        StmtKind::Return(value) | StmtKind::Raise(value) => {
            if let Some(e) = value {
                v.visit_expr(e, line);
            }
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            walk_body(v, body);
            for h in handlers {
                if let Some(kind) = &h.kind {
                    v.visit_expr(kind, h.line);
                }
                walk_body(v, &h.body);
            }
            walk_body(v, orelse);
            walk_body(v, finalbody);
        }
        StmtKind::Assert { test, msg } => {
            v.visit_expr(test, line);
            if let Some(m) = msg {
                v.visit_expr(m, line);
            }
        }
        StmtKind::Delete(targets) => {
            for t in targets {
                v.visit_target(t, line);
            }
        }
        StmtKind::Import(_)
        | StmtKind::ImportFrom { .. }
        | StmtKind::Pass
        | StmtKind::Break
        | StmtKind::Continue => {}
    }
}

pub fn walk_target<V: Visitor + ?Sized>(v: &mut V, target: &Target, line: usize) {
    match target {
        Target::Name(_) => {}
        Target::Tuple(items) => {
            for t in items {
                v.visit_target(t, line);
            }
        }
        Target::Subscript { value, index } => {
            v.visit_expr(value, line);
            v.visit_expr(index, line);
        }
        Target::Attribute { value, .. } => v.visit_expr(value, line),
        Target::Starred(inner) => v.visit_target(inner, line),
    }
}

fn walk_generators<V: Visitor + ?Sized>(v: &mut V, generators: &[Comprehension], line: usize) {
    for g in generators {
        v.visit_expr(&g.iter, line);
        v.visit_target(&g.target, line);
        for cond in &g.ifs {
            v.visit_expr(cond, line);
        }
    }
}

fn walk_fstring<V: Visitor + ?Sized>(v: &mut V, parts: &[FStringPart], line: usize) {
    for part in parts {
        if let FStringPart::Field { expr, spec, .. } = part {
            v.visit_expr(expr, line);
            if let Some(spec) = spec {
                walk_fstring(v, spec, line);
            }
        }
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, expr: &Expr, line: usize) {
    match expr {
        Expr::None | Expr::Bool(_) | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) => {}
        Expr::Name(_) => {}
        Expr::FString(parts) => walk_fstring(v, parts, line),
        Expr::List(items) | Expr::Tuple(items) => {
            for e in items {
                v.visit_expr(e, line);
            }
        }
        Expr::Dict(items) => {
            for (k, val) in items {
                v.visit_expr(k, line);
                v.visit_expr(val, line);
            }
        }
        Expr::BinOp { left, right, .. } => {
            v.visit_expr(left, line);
            v.visit_expr(right, line);
        }
        Expr::UnaryOp { operand, .. } => v.visit_expr(operand, line),
        Expr::BoolOp { values, .. } => {
            for e in values {
                v.visit_expr(e, line);
            }
        }
        Expr::Compare {
            left, comparators, ..
        } => {
            v.visit_expr(left, line);
            for e in comparators {
                v.visit_expr(e, line);
            }
        }
        Expr::IfExp { test, body, orelse } => {
            v.visit_expr(test, line);
            v.visit_expr(body, line);
            v.visit_expr(orelse, line);
        }
        Expr::Call { func, args } => {
            v.visit_expr(func, line);
            for a in args {
                match a {
                    Arg::Positional(e) | Arg::Star(e) | Arg::DoubleStar(e) | Arg::Keyword(_, e) => {
                        v.visit_expr(e, line)
                    }
                }
            }
        }
        Expr::Attribute { value, .. } => v.visit_expr(value, line),
        Expr::Subscript { value, index } => {
            v.visit_expr(value, line);
            v.visit_expr(index, line);
        }
        Expr::Slice { lower, upper, step } => {
            for e in [lower, upper, step].into_iter().flatten() {
                v.visit_expr(e, line);
            }
        }
        Expr::Lambda(def) => {
            for p in &def.params {
                v.visit_param(p, def.line);
            }
            v.visit_expr(&def.body, def.line);
        }
        Expr::ListComp { elt, generators } | Expr::GeneratorExp { elt, generators } => {
            walk_generators(v, generators, line);
            v.visit_expr(elt, line);
        }
        Expr::DictComp {
            key,
            value,
            generators,
        } => {
            walk_generators(v, generators, line);
            v.visit_expr(key, line);
            v.visit_expr(value, line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    #[derive(Default)]
    struct Names(Vec<String>);

    impl Visitor for Names {
        fn visit_expr(&mut self, expr: &Expr, line: usize) {
            if let Expr::Name(n) = expr {
                self.0.push(n.clone());
            }
            walk_expr(self, expr, line);
        }
    }

    #[test]
    fn test_walk_reaches_nested_expressions() {
        let body = parse(
            "def f(a=dflt):\n    return [g(x) for x in xs if keep(x)]\ny = f'{inner}'\n",
        )
        .unwrap();
        let mut names = Names::default();
        walk_body(&mut names, &body);
        for expected in ["dflt", "g", "x", "xs", "keep", "inner"] {
            assert!(names.0.iter().any(|n| n == expected), "missing {}", expected);
        }
    }
}
