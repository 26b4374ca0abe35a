//! Restricted compiler: parse, lower the supported subset, then reject private
//! names and attribute writes.
//!
//! The raw result mirrors a classic restricted compile: program (if any),
//! errors, warnings and the names the program reads. [`compile`] folds that
//! into `Result<CompiledProgram, CompileFault>`.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::interp::{Builtin, TypeKind};
use crate::lang::ast::{Alias, Arg, Expr, Param, Stmt, StmtKind, Target};
use crate::lang::visit::{walk_body, walk_expr, walk_stmt, walk_target, Visitor};

/// Program accepted by the restriction pass. Owned by the session that runs it.
#[derive(Debug)]
pub struct CompiledProgram {
    pub(crate) body: Vec<Stmt>,
    pub(crate) used_names: Vec<String>,
}

impl CompiledProgram {
    /// Names the program reads, sorted.
    pub fn used_names(&self) -> &[String] {
        &self.used_names
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileFault {
    #[error("Compilation errors: {}", .0.join("; "))]
    Violations(Vec<String>),
    #[error("Compilation failed: returned None")]
    Missing,
}

impl CompileFault {
    /// Messages in the validator's string-list vocabulary.
    pub fn messages(&self) -> Vec<String> {
        match self {
            CompileFault::Violations(errors) => errors.clone(),
            CompileFault::Missing => vec![self.to_string()],
        }
    }
}

/// Raw compiler output.
#[derive(Debug, Default)]
pub struct CompileResult {
    pub program: Option<CompiledProgram>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub used_names: Vec<String>,
}

impl CompileResult {
    pub fn into_program(self) -> Result<CompiledProgram, CompileFault> {
        if !self.errors.is_empty() {
            return Err(CompileFault::Violations(self.errors));
        }
        self.program.ok_or(CompileFault::Missing)
    }
}

/// Compile and fold the raw result.
pub fn compile(source: &str) -> Result<CompiledProgram, CompileFault> {
    compile_restricted(source).into_program()
}

pub fn compile_restricted(source: &str) -> CompileResult {
    let parsed = match crate::lang::syntax::parse_module(source) {
        Ok(parsed) => parsed,
        Err(e) => {
            return CompileResult {
                errors: vec![format!("Line {}: SyntaxError: {}", e.line, e.message)],
                ..CompileResult::default()
            }
        }
    };
    let body = match crate::lang::lower::lower_module(&parsed.body, &parsed.lines) {
        Ok(body) => body,
        Err(errors) => {
            return CompileResult {
                errors,
                ..CompileResult::default()
            }
        }
    };
    let mut pass = RestrictionPass::default();
    walk_body(&mut pass, &body);
    let used_names: Vec<String> = pass.used.into_iter().collect();
    let program = if pass.errors.is_empty() {
        Some(CompiledProgram {
            body,
            used_names: used_names.clone(),
        })
    } else {
        None
    };
    CompileResult {
        program,
        errors: pass.errors,
        warnings: pass.warnings,
        used_names,
    }
}

fn is_shadowing(name: &str) -> bool {
    Builtin::from_global(name).is_some() || TypeKind::from_global(name).is_some()
}

#[derive(Default)]
struct RestrictionPass {
    errors: Vec<String>,
    warnings: Vec<String>,
    used: BTreeSet<String>,
    deleting: bool,
}

impl RestrictionPass {
    fn check_name(&mut self, name: &str, line: usize) {
        if name.starts_with('_') {
            self.errors.push(format!(
                "Line {}: \"{}\" is an invalid variable name because it starts with \"_\"",
                line, name
            ));
        }
    }

    fn check_attr(&mut self, attr: &str, line: usize) {
        if attr.starts_with('_') {
            self.errors.push(format!(
                "Line {}: \"{}\" is an invalid attribute name because it starts with \"_\"",
                line, attr
            ));
        }
    }

    fn bind(&mut self, name: &str, line: usize) {
        self.check_name(name, line);
        if is_shadowing(name) {
            self.warnings
                .push(format!("Line {}: assignment shadows built-in '{}'", line, name));
        }
    }

    fn check_alias(&mut self, alias: &Alias, line: usize) {
        for part in alias.name.split('.').filter(|p| *p != "*") {
            self.check_name(part, line);
        }
        if let Some(asname) = &alias.asname {
            self.bind(asname, line);
        }
    }
}

impl Visitor for RestrictionPass {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        let line = stmt.line;
        match &stmt.kind {
            StmtKind::FunctionDef(def) => self.bind(&def.name, def.line),
            StmtKind::Import(names) => {
                for alias in names {
                    self.check_alias(alias, line);
                }
            }
            StmtKind::ImportFrom { module, names } => {
                for part in module.split('.') {
                    self.check_name(part, line);
                }
                for alias in names {
                    self.check_alias(alias, line);
                }
            }
            StmtKind::Try { handlers, .. } => {
                for h in handlers {
                    if let Some(name) = &h.name {
                        self.bind(name, h.line);
                    }
                }
            }
            StmtKind::Delete(targets) => {
                self.deleting = true;
                for t in targets {
                    self.visit_target(t, line);
                }
                self.deleting = false;
                return;
            }
            _ => {}
        }
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr, line: usize) {
        match expr {
            Expr::Name(name) => {
                self.check_name(name, line);
                self.used.insert(name.clone());
            }
            Expr::Attribute { attr, .. } => self.check_attr(attr, line),
            Expr::Call { args, .. } => {
                for arg in args {
                    if let Arg::Keyword(name, _) = arg {
                        self.check_name(name, line);
                    }
                }
            }
            _ => {}
        }
        walk_expr(self, expr, line);
    }

    fn visit_target(&mut self, target: &Target, line: usize) {
        match target {
            Target::Name(name) => {
                if self.deleting {
                    self.check_name(name, line);
                } else {
                    self.bind(name, line);
                }
            }
            Target::Attribute { attr, .. } => {
                self.check_attr(attr, line);
                self.errors.push(format!(
                    "Line {}: attribute {} is not allowed",
                    line,
                    if self.deleting { "deletion" } else { "assignment" }
                ));
            }
            _ => {}
        }
        walk_target(self, target, line);
    }

    fn visit_param(&mut self, param: &Param, line: usize) {
        self.check_name(&param.name, line);
        if let Some(default) = &param.default {
            self.visit_expr(default, line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_program_compiles() {
        let program = compile("x = len([1, 2])\nresult = x").unwrap();
        assert_eq!(program.used_names(), &["len".to_string(), "x".to_string()]);
    }

    #[test]
    fn test_private_attribute_rejected() {
        let err = compile("x = 'a'.__class__").unwrap_err();
        assert_eq!(
            err.messages(),
            vec!["Line 1: \"__class__\" is an invalid attribute name because it starts with \"_\"".to_string()]
        );
        assert!(err.to_string().starts_with("Compilation errors: Line 1:"));
    }

    #[test]
    fn test_private_names_everywhere() {
        let raw = compile_restricted("def _f(_a):\n    return _a\nimport json as _j\n");
        assert_eq!(raw.errors.len(), 4);
        assert!(raw.program.is_none());
        assert!(raw.errors[0].contains("\"_f\" is an invalid variable name"));
    }

    #[test]
    fn test_attribute_writes_rejected() {
        let err = compile("d = {}\nd.x = 1").unwrap_err();
        assert_eq!(
            err.messages(),
            vec!["Line 2: attribute assignment is not allowed".to_string()]
        );
        let err = compile("del d.x").unwrap_err();
        assert_eq!(
            err.messages(),
            vec!["Line 1: attribute deletion is not allowed".to_string()]
        );
    }

    #[test]
    fn test_shadowing_is_a_warning() {
        let raw = compile_restricted("len = 3\n");
        assert!(raw.errors.is_empty());
        assert_eq!(raw.warnings, vec!["Line 1: assignment shadows built-in 'len'".to_string()]);
        assert!(raw.into_program().is_ok());
    }

    #[test]
    fn test_missing_program_fault() {
        let raw = CompileResult::default();
        assert_eq!(raw.into_program().unwrap_err(), CompileFault::Missing);
        assert_eq!(CompileFault::Missing.to_string(), "Compilation failed: returned None");
    }

    #[test]
    fn test_syntax_error_reported_with_line() {
        let err = compile("x = (1,\n").unwrap_err();
        assert!(err.messages()[0].starts_with("Line "));
    }

    #[test]
    fn test_unsupported_constructs_are_compile_faults() {
        let err = compile("s = {1, 2}
with s:
    pass
").unwrap_err();
        assert_eq!(
            err.messages(),
            vec![
                "Line 1: set literals are not supported".to_string(),
                "Line 2: 'with' statements are not supported".to_string(),
            ]
        );
    }

    #[test]
    fn test_starred_targets_and_bitwise_ops_compile() {
        let program = compile("a, *b = 1, 2, 3
c = 5 & 3 | 1 << 2
").unwrap();
        assert!(program.used_names().is_empty());
    }
}
