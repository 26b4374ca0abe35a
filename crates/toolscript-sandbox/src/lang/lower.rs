//! Lowering from the full parsed tree to the interpreter's syntax tree.
//!
//! Constructs the interpreter does not run (classes, `with`, sets, async,
//! generators, ...) are collected as `Line N: ... is not supported` messages so
//! the compiler can report every one of them at once.

use std::sync::Arc;

use rustpython_parser::ast as py;

use super::ast::*;
use super::syntax::LineIndex;

/// Lower a parsed module, or return every unsupported-construct message.
pub fn lower_module(body: &[py::Stmt], lines: &LineIndex) -> Result<Vec<Stmt>, Vec<String>> {
    let mut lower = Lowerer {
        lines,
        errors: Vec::new(),
    };
    let out = lower.body(body);
    if lower.errors.is_empty() {
        Ok(out)
    } else {
        Err(lower.errors)
    }
}

struct Lowerer<'a> {
    lines: &'a LineIndex,
    errors: Vec<String>,
}

impl Lowerer<'_> {
    fn unsupported(&mut self, what: &str, line: usize) {
        self.errors
            .push(format!("Line {}: {} not supported", line, what));
    }

    fn body(&mut self, body: &[py::Stmt]) -> Vec<Stmt> {
        body.iter().filter_map(|s| self.stmt(s)).collect()
    }

    fn stmt(&mut self, stmt: &py::Stmt) -> Option<Stmt> {
        let line = self.lines.line_of(stmt);
        let kind = match stmt {
            py::Stmt::Expr(s) => StmtKind::Expr(self.expr(&s.value, line)),
            py::Stmt::Assign(s) => StmtKind::Assign {
                targets: s.targets.iter().map(|t| self.target(t, line)).collect(),
                value: self.expr(&s.value, line),
            },
            py::Stmt::AugAssign(s) => StmtKind::AugAssign {
                target: self.target(&s.target, line),
                op: self.bin_op(s.op, line),
                value: self.expr(&s.value, line),
            },
            // an annotation without a value binds nothing
            py::Stmt::AnnAssign(s) => match &s.value {
                Some(value) => StmtKind::Assign {
                    targets: vec![self.target(&s.target, line)],
                    value: self.expr(value, line),
                },
                None => StmtKind::Pass,
            },
            py::Stmt::If(s) => StmtKind::If {
                test: self.expr(&s.test, line),
                body: self.body(&s.body),
                orelse: self.body(&s.orelse),
            },
            py::Stmt::While(s) => StmtKind::While {
                test: self.expr(&s.test, line),
                body: self.body(&s.body),
                orelse: self.body(&s.orelse),
            },
            py::Stmt::For(s) => StmtKind::For {
                target: self.target(&s.target, line),
                iter: self.expr(&s.iter, line),
                body: self.body(&s.body),
                orelse: self.body(&s.orelse),
            },
            py::Stmt::FunctionDef(s) => {
                if !s.decorator_list.is_empty() {
                    self.unsupported("decorators are", line);
                }
                StmtKind::FunctionDef(Arc::new(FunctionDef {
                    name: s.name.as_str().to_string(),
                    params: self.params(&s.args, line),
                    body: self.body(&s.body),
                    line,
                }))
            }
            py::Stmt::Return(s) => StmtKind::Return(s.value.as_deref().map(|e| self.expr(e, line))),
            py::Stmt::Try(s) => StmtKind::Try {
                body: self.body(&s.body),
                handlers: s.handlers.iter().map(|h| self.handler(h)).collect(),
                orelse: self.body(&s.orelse),
                finalbody: self.body(&s.finalbody),
            },
            // the cause of `raise X from Y` is not tracked
            py::Stmt::Raise(s) => StmtKind::Raise(s.exc.as_deref().map(|e| self.expr(e, line))),
            py::Stmt::Assert(s) => StmtKind::Assert {
                test: self.expr(&s.test, line),
                msg: s.msg.as_deref().map(|e| self.expr(e, line)),
            },
            py::Stmt::Import(s) => StmtKind::Import(s.names.iter().map(alias).collect()),
            py::Stmt::ImportFrom(s) => {
                let level = s.level.as_ref().map_or(0, |l| l.to_u32());
                match (&s.module, level) {
                    (Some(module), 0) => StmtKind::ImportFrom {
                        module: module.as_str().to_string(),
                        names: s.names.iter().map(alias).collect(),
                    },
                    _ => {
                        self.unsupported("relative imports are", line);
                        return None;
                    }
                }
            }
            py::Stmt::Delete(s) => StmtKind::Delete(s.targets.iter().map(|t| self.target(t, line)).collect()),
            py::Stmt::Pass(_) => StmtKind::Pass,
            py::Stmt::Break(_) => StmtKind::Break,
            py::Stmt::Continue(_) => StmtKind::Continue,
            other => {
                let what = match other {
                    py::Stmt::ClassDef(_) => "class definitions are",
                    py::Stmt::With(_) => "'with' statements are",
                    py::Stmt::Global(_) => "'global' statements are",
                    py::Stmt::Nonlocal(_) => "'nonlocal' statements are",
                    py::Stmt::Match(_) => "'match' statements are",
                    py::Stmt::TryStar(_) => "'except*' handlers are",
                    py::Stmt::AsyncFunctionDef(_) | py::Stmt::AsyncFor(_) | py::Stmt::AsyncWith(_) => {
                        "async code is"
                    }
                    _ => "this statement is",
                };
                self.unsupported(what, line);
                return None;
            }
        };
        Some(Stmt { line, kind })
    }

    fn handler(&mut self, handler: &py::ExceptHandler) -> ExceptHandler {
        let py::ExceptHandler::ExceptHandler(h) = handler;
        let line = self.lines.line_of(handler);
        ExceptHandler {
            kind: h.type_.as_deref().map(|e| self.expr(e, line)),
            name: h.name.as_ref().map(|n| n.as_str().to_string()),
            body: self.body(&h.body),
            line,
        }
    }

    /// Parameters in binding order: positional, `*args`, keyword-only, `**kwargs`.
    fn params(&mut self, args: &py::Arguments, line: usize) -> Vec<Param> {
        let mut params = Vec::new();
        for a in args.posonlyargs.iter().chain(args.args.iter()) {
            params.push(Param {
                name: a.def.arg.as_str().to_string(),
                default: a.default.as_deref().map(|e| self.expr(e, line)),
                kind: ParamKind::Normal,
            });
        }
        if let Some(a) = &args.vararg {
            params.push(Param {
                name: a.arg.as_str().to_string(),
                default: None,
                kind: ParamKind::VarArgs,
            });
        }
        for a in &args.kwonlyargs {
            params.push(Param {
                name: a.def.arg.as_str().to_string(),
                default: a.default.as_deref().map(|e| self.expr(e, line)),
                kind: ParamKind::KwOnly,
            });
        }
        if let Some(a) = &args.kwarg {
            params.push(Param {
                name: a.arg.as_str().to_string(),
                default: None,
                kind: ParamKind::KwArgs,
            });
        }
        params
    }

    fn target(&mut self, expr: &py::Expr, line: usize) -> Target {
        match expr {
            py::Expr::Name(n) => Target::Name(n.id.as_str().to_string()),
            py::Expr::Tuple(py::ExprTuple { elts, .. }) | py::Expr::List(py::ExprList { elts, .. }) => {
                if elts.iter().filter(|e| matches!(e, py::Expr::Starred(_))).count() > 1 {
                    self.unsupported("multiple starred targets are", line);
                }
                Target::Tuple(elts.iter().map(|e| self.target(e, line)).collect())
            }
            py::Expr::Starred(s) => Target::Starred(Box::new(self.target(&s.value, line))),
            py::Expr::Subscript(s) => Target::Subscript {
                value: self.expr(&s.value, line),
                index: self.expr(&s.slice, line),
            },
            py::Expr::Attribute(a) => Target::Attribute {
                value: self.expr(&a.value, line),
                attr: a.attr.as_str().to_string(),
            },
            _ => {
                self.unsupported("this assignment target is", line);
                Target::Name(String::new())
            }
        }
    }

    fn exprs(&mut self, exprs: &[py::Expr], line: usize) -> Vec<Expr> {
        exprs.iter().map(|e| self.expr(e, line)).collect()
    }

    fn boxed(&mut self, expr: &py::Expr, line: usize) -> Box<Expr> {
        Box::new(self.expr(expr, line))
    }

    fn expr(&mut self, expr: &py::Expr, line: usize) -> Expr {
        match expr {
            py::Expr::Constant(c) => self.constant(&c.value, line),
            py::Expr::Name(n) => Expr::Name(n.id.as_str().to_string()),
            py::Expr::List(l) => Expr::List(self.exprs(&l.elts, line)),
            py::Expr::Tuple(t) => Expr::Tuple(self.exprs(&t.elts, line)),
            py::Expr::Dict(d) => {
                let mut items = Vec::with_capacity(d.values.len());
                for (k, v) in d.keys.iter().zip(&d.values) {
                    match k {
                        Some(k) => {
                            let key = self.expr(k, line);
                            items.push((key, self.expr(v, line)));
                        }
                        None => self.unsupported("'**' in dict displays is", line),
                    }
                }
                Expr::Dict(items)
            }
            py::Expr::JoinedStr(j) => Expr::FString(self.fstring(&j.values, line)),
            py::Expr::BinOp(b) => Expr::BinOp {
                left: self.boxed(&b.left, line),
                op: self.bin_op(b.op, line),
                right: self.boxed(&b.right, line),
            },
            py::Expr::UnaryOp(u) => Expr::UnaryOp {
                op: match u.op {
                    py::UnaryOp::Not => UnaryOp::Not,
                    py::UnaryOp::USub => UnaryOp::Neg,
                    py::UnaryOp::UAdd => UnaryOp::Pos,
                    py::UnaryOp::Invert => UnaryOp::Invert,
                },
                operand: self.boxed(&u.operand, line),
            },
            py::Expr::BoolOp(b) => Expr::BoolOp {
                op: match b.op {
                    py::BoolOp::And => BoolOp::And,
                    py::BoolOp::Or => BoolOp::Or,
                },
                values: self.exprs(&b.values, line),
            },
            py::Expr::Compare(c) => Expr::Compare {
                left: self.boxed(&c.left, line),
                ops: c.ops.iter().map(|op| cmp_op(*op)).collect(),
                comparators: self.exprs(&c.comparators, line),
            },
            py::Expr::IfExp(i) => Expr::IfExp {
                test: self.boxed(&i.test, line),
                body: self.boxed(&i.body, line),
                orelse: self.boxed(&i.orelse, line),
            },
            py::Expr::Call(c) => {
                let mut args = Vec::with_capacity(c.args.len() + c.keywords.len());
                for a in &c.args {
                    args.push(match a {
                        py::Expr::Starred(s) => Arg::Star(self.expr(&s.value, line)),
                        other => Arg::Positional(self.expr(other, line)),
                    });
                }
                for k in &c.keywords {
                    let value = self.expr(&k.value, line);
                    args.push(match &k.arg {
                        Some(name) => Arg::Keyword(name.as_str().to_string(), value),
                        None => Arg::DoubleStar(value),
                    });
                }
                Expr::Call {
                    func: self.boxed(&c.func, line),
                    args,
                }
            }
            py::Expr::Attribute(a) => Expr::Attribute {
                value: self.boxed(&a.value, line),
                attr: a.attr.as_str().to_string(),
            },
            py::Expr::Subscript(s) => Expr::Subscript {
                value: self.boxed(&s.value, line),
                index: self.boxed(&s.slice, line),
            },
            py::Expr::Slice(s) => Expr::Slice {
                lower: s.lower.as_deref().map(|e| self.boxed(e, line)),
                upper: s.upper.as_deref().map(|e| self.boxed(e, line)),
                step: s.step.as_deref().map(|e| self.boxed(e, line)),
            },
            py::Expr::Lambda(l) => {
                let line = self.lines.line_of(expr);
                Expr::Lambda(Arc::new(LambdaDef {
                    params: self.params(&l.args, line),
                    body: self.expr(&l.body, line),
                    line,
                }))
            }
            py::Expr::ListComp(c) => Expr::ListComp {
                elt: self.boxed(&c.elt, line),
                generators: self.generators(&c.generators, line),
            },
            py::Expr::GeneratorExp(c) => Expr::GeneratorExp {
                elt: self.boxed(&c.elt, line),
                generators: self.generators(&c.generators, line),
            },
            py::Expr::DictComp(c) => Expr::DictComp {
                key: self.boxed(&c.key, line),
                value: self.boxed(&c.value, line),
                generators: self.generators(&c.generators, line),
            },
            other => {
                let what = match other {
                    py::Expr::Set(_) => "set literals are",
                    py::Expr::SetComp(_) => "set comprehensions are",
                    py::Expr::NamedExpr(_) => "assignment expressions are",
                    py::Expr::Await(_) => "'await' is",
                    py::Expr::Yield(_) | py::Expr::YieldFrom(_) => "generators are",
                    py::Expr::Starred(_) => "starred expressions here are",
                    _ => "this expression is",
                };
                self.unsupported(what, line);
                Expr::None
            }
        }
    }

    fn constant(&mut self, value: &py::Constant, line: usize) -> Expr {
        match value {
            py::Constant::None => Expr::None,
            py::Constant::Bool(b) => Expr::Bool(*b),
            py::Constant::Str(s) => Expr::Str(s.clone()),
            py::Constant::Float(f) => Expr::Float(*f),
            py::Constant::Int(i) => match i.to_string().parse::<i64>() {
                Ok(n) => Expr::Int(n),
                Err(_) => {
                    self.unsupported("integers outside the 64-bit range are", line);
                    Expr::Int(0)
                }
            },
            py::Constant::Tuple(items) => Expr::Tuple(items.iter().map(|c| self.constant(c, line)).collect()),
            py::Constant::Bytes(_) => {
                self.unsupported("bytes literals are", line);
                Expr::None
            }
            py::Constant::Complex { .. } => {
                self.unsupported("complex numbers are", line);
                Expr::None
            }
            py::Constant::Ellipsis => {
                self.unsupported("'...' is", line);
                Expr::None
            }
        }
    }

    fn fstring(&mut self, values: &[py::Expr], line: usize) -> Vec<FStringPart> {
        let mut parts = Vec::with_capacity(values.len());
        for v in values {
            match v {
                py::Expr::Constant(py::ExprConstant {
                    value: py::Constant::Str(s),
                    ..
                }) => parts.push(FStringPart::Literal(s.clone())),
                py::Expr::FormattedValue(f) => {
                    let conversion = match f.conversion {
                        py::ConversionFlag::Str => Some('s'),
                        py::ConversionFlag::Repr => Some('r'),
                        py::ConversionFlag::Ascii => Some('a'),
                        py::ConversionFlag::None => None,
                    };
                    let spec = match f.format_spec.as_deref() {
                        Some(py::Expr::JoinedStr(j)) => Some(self.fstring(&j.values, line)),
                        Some(other) => Some(vec![FStringPart::Field {
                            expr: self.expr(other, line),
                            conversion: None,
                            spec: None,
                        }]),
                        None => None,
                    };
                    parts.push(FStringPart::Field {
                        expr: self.expr(&f.value, line),
                        conversion,
                        spec,
                    });
                }
                other => parts.push(FStringPart::Field {
                    expr: self.expr(other, line),
                    conversion: None,
                    spec: None,
                }),
            }
        }
        parts
    }

    fn generators(&mut self, generators: &[py::Comprehension], line: usize) -> Vec<Comprehension> {
        generators
            .iter()
            .map(|g| {
                if g.is_async {
                    self.unsupported("async comprehensions are", line);
                }
                Comprehension {
                    target: self.target(&g.target, line),
                    iter: self.expr(&g.iter, line),
                    ifs: self.exprs(&g.ifs, line),
                }
            })
            .collect()
    }

    fn bin_op(&mut self, op: py::Operator, line: usize) -> BinOp {
        match op {
            py::Operator::Add => BinOp::Add,
            py::Operator::Sub => BinOp::Sub,
            py::Operator::Mult => BinOp::Mul,
            py::Operator::Div => BinOp::Div,
            py::Operator::FloorDiv => BinOp::FloorDiv,
            py::Operator::Mod => BinOp::Mod,
            py::Operator::Pow => BinOp::Pow,
            py::Operator::BitAnd => BinOp::BitAnd,
            py::Operator::BitOr => BinOp::BitOr,
            py::Operator::BitXor => BinOp::BitXor,
            py::Operator::LShift => BinOp::LShift,
            py::Operator::RShift => BinOp::RShift,
            py::Operator::MatMult => {
                self.unsupported("the '@' operator is", line);
                BinOp::Mul
            }
        }
    }
}

fn alias(a: &py::Alias) -> Alias {
    Alias {
        name: a.name.as_str().to_string(),
        asname: a.asname.as_ref().map(|n| n.as_str().to_string()),
    }
}

fn cmp_op(op: py::CmpOp) -> CmpOp {
    match op {
        py::CmpOp::Eq => CmpOp::Eq,
        py::CmpOp::NotEq => CmpOp::NotEq,
        py::CmpOp::Lt => CmpOp::Lt,
        py::CmpOp::LtE => CmpOp::LtE,
        py::CmpOp::Gt => CmpOp::Gt,
        py::CmpOp::GtE => CmpOp::GtE,
        py::CmpOp::In => CmpOp::In,
        py::CmpOp::NotIn => CmpOp::NotIn,
        py::CmpOp::Is => CmpOp::Is,
        py::CmpOp::IsNot => CmpOp::IsNot,
    }
}

#[cfg(test)]
mod tests {
    use super::super::syntax::parse_module;
    use super::*;

    fn lower(source: &str) -> Result<Vec<Stmt>, Vec<String>> {
        let parsed = parse_module(source).unwrap();
        lower_module(&parsed.body, &parsed.lines)
    }

    #[test]
    fn test_lines_follow_source() {
        let body = lower("x = 1\n\nif x:\n    y = 2\n").unwrap();
        assert_eq!(body[0].line, 1);
        assert_eq!(body[1].line, 3);
        let StmtKind::If { body: inner, .. } = &body[1].kind else {
            panic!("expected if");
        };
        assert_eq!(inner[0].line, 4);
    }

    #[test]
    fn test_unsupported_constructs_are_all_reported() {
        let errors = lower("s = {1, 2}\nwith x:\n    pass\nclass A:\n    pass\nn = 123456789012345678901234567890\n")
            .unwrap_err();
        assert_eq!(
            errors,
            vec![
                "Line 1: set literals are not supported".to_string(),
                "Line 2: 'with' statements are not supported".to_string(),
                "Line 4: class definitions are not supported".to_string(),
                "Line 6: integers outside the 64-bit range are not supported".to_string(),
            ]
        );
    }

    #[test]
    fn test_parameter_kinds_in_binding_order() {
        let body = lower("def f(a, b=2, *args, c, d=4, **kw):\n    pass\n").unwrap();
        let StmtKind::FunctionDef(def) = &body[0].kind else {
            panic!("expected def");
        };
        let kinds: Vec<(&str, ParamKind, bool)> = def
            .params
            .iter()
            .map(|p| (p.name.as_str(), p.kind, p.default.is_some()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("a", ParamKind::Normal, false),
                ("b", ParamKind::Normal, true),
                ("args", ParamKind::VarArgs, false),
                ("c", ParamKind::KwOnly, false),
                ("d", ParamKind::KwOnly, true),
                ("kw", ParamKind::KwArgs, false),
            ]
        );
    }

    #[test]
    fn test_starred_target_and_call_args() {
        let body = lower("a, *b = f(*xs, k=1, **opts)\n").unwrap();
        let StmtKind::Assign { targets, value } = &body[0].kind else {
            panic!("expected assign");
        };
        assert_eq!(
            targets[0],
            Target::Tuple(vec![
                Target::Name("a".into()),
                Target::Starred(Box::new(Target::Name("b".into())))
            ])
        );
        let Expr::Call { args, .. } = value else {
            panic!("expected call");
        };
        assert!(matches!(args[0], Arg::Star(_)));
        assert!(matches!(&args[1], Arg::Keyword(k, _) if k == "k"));
        assert!(matches!(args[2], Arg::DoubleStar(_)));
    }

    #[test]
    fn test_fstring_parts() {
        let body = lower("s = f'a{x!r:>{w}}b'\n").unwrap();
        let StmtKind::Assign { value: Expr::FString(parts), .. } = &body[0].kind else {
            panic!("expected f-string");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], FStringPart::Literal("a".into()));
        let FStringPart::Field { conversion, spec, .. } = &parts[1] else {
            panic!("expected field");
        };
        assert_eq!(*conversion, Some('r'));
        assert_eq!(spec.as_ref().map(|s| s.len()), Some(2));
    }

    #[test]
    fn test_relative_import_rejected() {
        assert_eq!(
            lower("from . import x\n").unwrap_err(),
            vec!["Line 1: relative imports are not supported".to_string()]
        );
    }
}
