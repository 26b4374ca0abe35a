//! Static validator: parse the program and reject dangerous imports and calls.
//!
//! Runs before compilation over the full parsed tree, including constructs the
//! interpreter later rejects, so `import os` inside a class body is caught and
//! a string containing `"eval("` is not.

use std::collections::HashSet;

use toolscript_core::protocol::ValidationVerdict;

use super::default_rules::{default_deny_calls, default_deny_modules};
use super::rules::RulesConfig;
use super::types::{ScanReport, Violation, ViolationKind};
use crate::lang::syntax::{self, py, walk_expr, walk_stmt, LineIndex, SyntaxVisitor};

/// Deny-list validator. Cheap to clone; holds no per-call state.
#[derive(Debug, Clone)]
pub struct StaticValidator {
    deny_modules: Vec<String>,
    deny_calls: HashSet<String>,
}

impl Default for StaticValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticValidator {
    /// Validator with the built-in deny lists
    pub fn new() -> Self {
        Self::with_config(&RulesConfig::default())
    }

    /// Validator with custom rules configuration
    pub fn with_config(config: &RulesConfig) -> Self {
        let mut modules = if config.use_default_rules {
            default_deny_modules()
        } else {
            Vec::new()
        };
        modules.extend(config.deny_modules.iter().cloned());
        modules.retain(|m| !config.allow_modules.contains(m));
        modules.sort();
        modules.dedup();

        let mut calls: HashSet<String> = if config.use_default_rules {
            default_deny_calls().into_iter().collect()
        } else {
            HashSet::new()
        };
        calls.extend(config.deny_calls.iter().cloned());
        for allowed in &config.allow_calls {
            calls.remove(allowed);
        }

        Self {
            deny_modules: modules,
            deny_calls: calls,
        }
    }

    /// True when `path` is a denied module or a submodule of one.
    pub fn is_denied_module(&self, path: &str) -> bool {
        self.deny_modules.iter().any(|denied| {
            path == denied
                || (path.starts_with(denied.as_str())
                    && path.as_bytes().get(denied.len()) == Some(&b'.'))
        })
    }

    pub fn is_denied_call(&self, name: &str) -> bool {
        self.deny_calls.contains(name)
    }

    /// Full findings with rule IDs and line numbers.
    pub fn scan(&self, source: &str) -> ScanReport {
        let parsed = match syntax::parse_module(source) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ScanReport {
                    violations: vec![Violation {
                        rule_id: "syntax".to_string(),
                        kind: ViolationKind::SyntaxError,
                        line_number: e.line,
                        subject: e.to_string(),
                    }],
                }
            }
        };
        let mut walker = DenyWalker {
            validator: self,
            violations: Vec::new(),
        };
        syntax::walk_suite(&mut walker, &parsed.body, &parsed.lines);
        ScanReport {
            violations: walker.violations,
        }
    }

    /// Verdict consumed by the session pipeline and the host boundary.
    pub fn validate(&self, source: &str) -> ValidationVerdict {
        let report = self.scan(source);
        ValidationVerdict::from_violations(report.violations.iter().map(Violation::message).collect())
    }
}

struct DenyWalker<'a> {
    validator: &'a StaticValidator,
    violations: Vec<Violation>,
}

impl DenyWalker<'_> {
    fn deny_import(&mut self, subject: String, line: usize) {
        self.violations.push(Violation {
            rule_id: "deny-module".to_string(),
            kind: ViolationKind::DangerousImport,
            line_number: line,
            subject,
        });
    }
}

impl SyntaxVisitor for DenyWalker<'_> {
    fn visit_stmt(&mut self, stmt: &py::Stmt, lines: &LineIndex) {
        match stmt {
            py::Stmt::Import(s) => {
                for alias in &s.names {
                    if self.validator.is_denied_module(alias.name.as_str()) {
                        self.deny_import(alias.name.as_str().to_string(), lines.line_of(stmt));
                    }
                }
            }
            py::Stmt::ImportFrom(s) => {
                if let Some(module) = &s.module {
                    let module = module.as_str();
                    if self.validator.is_denied_module(module) {
                        self.deny_import(module.to_string(), lines.line_of(stmt));
                    } else {
                        for alias in s.names.iter().filter(|a| a.name.as_str() != "*") {
                            let full = format!("{}.{}", module, alias.name.as_str());
                            if self.validator.is_denied_module(&full) {
                                self.deny_import(full, lines.line_of(stmt));
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        walk_stmt(self, stmt, lines);
    }

    fn visit_expr(&mut self, expr: &py::Expr, lines: &LineIndex) {
        if let py::Expr::Call(call) = expr {
            if let py::Expr::Name(name) = call.func.as_ref() {
                if self.validator.is_denied_call(name.id.as_str()) {
                    self.violations.push(Violation {
                        rule_id: "deny-call".to_string(),
                        kind: ViolationKind::DangerousCall,
                        line_number: lines.line_of(expr),
                        subject: name.id.as_str().to_string(),
                    });
                }
            }
        }
        walk_expr(self, expr, lines);
    }
}

/// Format a scan report for terminal display.
pub fn format_verdict(report: &ScanReport) -> String {
    if report.is_safe() {
        return "✅ No dangerous imports or calls found. Program may be compiled.".to_string();
    }
    let mut output = format!(
        "📋 Validation: {} violation(s) found\n\n",
        report.violations.len()
    );
    for (idx, v) in report.violations.iter().enumerate() {
        output.push_str(&format!("  🔴 #{} {}\n", idx + 1, v.kind));
        output.push_str(&format!("     ├─ Rule: {}\n", v.rule_id));
        output.push_str(&format!("     └─ Line {}: {}\n\n", v.line_number, v.message()));
    }
    output.push_str("⛔ Program rejected before compilation.");
    output
}

/// Format a scan report as structured JSON for machine parsing
pub fn format_verdict_json(report: &ScanReport) -> String {
    let violations: Vec<serde_json::Value> = report
        .violations
        .iter()
        .map(|v| {
            serde_json::json!({
                "rule_id": v.rule_id,
                "kind": v.kind,
                "line_number": v.line_number,
                "message": v.message(),
            })
        })
        .collect();
    let output = serde_json::json!({
        "valid": report.is_safe(),
        "errors": report.violations.iter().map(Violation::message).collect::<Vec<_>>(),
        "violations": violations,
    });
    serde_json::to_string(&output).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors(src: &str) -> Vec<String> {
        StaticValidator::new().validate(src).violations
    }

    #[test]
    fn test_clean_program_is_valid() {
        let verdict = StaticValidator::new().validate("x = 1\nresult = x + 1\n");
        assert!(verdict.valid);
        assert!(verdict.violations.is_empty());
    }

    #[test]
    fn test_dangerous_import() {
        assert_eq!(errors("import os"), vec!["Dangerous import: os"]);
    }

    #[test]
    fn test_dangerous_call() {
        assert_eq!(
            errors("eval('1+1')"),
            vec!["Dangerous function call: eval"]
        );
    }

    #[test]
    fn test_all_violations_reported_in_order() {
        let errs = errors("import os\nx = eval('1')\nimport subprocess\n");
        assert_eq!(
            errs,
            vec![
                "Dangerous import: os",
                "Dangerous function call: eval",
                "Dangerous import: subprocess",
            ]
        );
    }

    #[test]
    fn test_submodule_and_from_imports() {
        assert_eq!(errors("import os.path"), vec!["Dangerous import: os.path"]);
        assert_eq!(errors("from os import path"), vec!["Dangerous import: os"]);
        assert_eq!(
            errors("from urllib import request"),
            vec!["Dangerous import: urllib.request"]
        );
        assert!(errors("import urllib.parse").is_empty());
        assert!(errors("import json, math").is_empty());
    }

    #[test]
    fn test_prefix_is_not_substring() {
        assert!(errors("import osmosis").is_empty());
        assert!(errors("import system_tools").is_empty());
    }

    #[test]
    fn test_nested_constructs_are_found() {
        let src = "def f():\n    import shutil\n    return [open(p) for p in ps]\n";
        assert_eq!(
            errors(src),
            vec!["Dangerous import: shutil", "Dangerous function call: open"]
        );
    }

    #[test]
    fn test_string_mentions_are_not_calls() {
        assert!(errors("x = 'eval(1)'\nprint('import os')\n").is_empty());
    }

    #[test]
    fn test_attribute_call_with_denied_name_is_allowed() {
        // Only direct calls of the bare name are rejected.
        assert!(errors("x = obj.open()\n").is_empty());
    }

    #[test]
    fn test_syntax_error_is_single_violation() {
        let errs = errors("x = (\n");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].starts_with("Syntax error: "));
        assert!(errs[0].contains("(line "));
    }

    #[test]
    fn test_custom_rules() {
        let cfg = RulesConfig {
            deny_modules: vec!["requests".into()],
            deny_calls: vec!["exit".into()],
            allow_modules: vec!["glob".into()],
            ..Default::default()
        };
        let v = StaticValidator::with_config(&cfg);
        assert!(v.is_denied_module("requests.adapters"));
        assert!(!v.is_denied_module("glob"));
        assert!(v.is_denied_call("exit"));
        assert!(v.is_denied_call("eval"));
    }

    #[test]
    fn test_without_default_rules() {
        let cfg = RulesConfig {
            use_default_rules: false,
            ..Default::default()
        };
        let v = StaticValidator::with_config(&cfg);
        assert!(v.validate("import os\neval('1')\n").valid);
    }

    #[test]
    fn test_format_verdict_json_shape() {
        let report = StaticValidator::new().scan("import os\n");
        let parsed: serde_json::Value = serde_json::from_str(&format_verdict_json(&report)).unwrap();
        assert_eq!(parsed["valid"], false);
        assert_eq!(parsed["errors"][0], "Dangerous import: os");
        assert_eq!(parsed["violations"][0]["line_number"], 1);
    }

    #[test]
    fn test_any_valid_python_gets_a_verdict() {
        for src in [
            "a, *b = 1, 2, 3\n",
            "s = {1, 2}\n",
            "with x:\n    pass\n",
            "y = 5 & 3\n",
            "n = 123456789012345678901234567890\n",
            "class A:\n    pass\n",
        ] {
            assert!(StaticValidator::new().validate(src).valid, "{}", src);
        }
    }

    #[test]
    fn test_unsupported_constructs_are_still_scanned() {
        let src = "class A:\n    import os\nwith open(p) as f:\n    pass\n";
        assert_eq!(
            errors(src),
            vec!["Dangerous import: os", "Dangerous function call: open"]
        );
    }
}
