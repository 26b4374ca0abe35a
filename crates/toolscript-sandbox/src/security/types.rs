//! Violation types produced by the static validator.

use serde::{Deserialize, Serialize};

/// One reason a program was rejected before compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Rule ID that triggered this violation
    pub rule_id: String,
    pub kind: ViolationKind,
    /// Line number where the offending construct starts
    pub line_number: usize,
    /// Module path or function name that matched
    pub subject: String,
}

/// Categories of validator findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    DangerousImport,
    DangerousCall,
    /// Source did not parse; nothing else could be checked
    SyntaxError,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationKind::DangerousImport => write!(f, "Dangerous Import"),
            ViolationKind::DangerousCall => write!(f, "Dangerous Call"),
            ViolationKind::SyntaxError => write!(f, "Syntax Error"),
        }
    }
}

impl Violation {
    /// Message carried in `ValidationVerdict::violations`.
    pub fn message(&self) -> String {
        match self.kind {
            ViolationKind::DangerousImport => format!("Dangerous import: {}", self.subject),
            ViolationKind::DangerousCall => format!("Dangerous function call: {}", self.subject),
            ViolationKind::SyntaxError => format!("Syntax error: {}", self.subject),
        }
    }
}

/// Full validator findings, in source order
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub violations: Vec<Violation>,
}

impl ScanReport {
    pub fn is_safe(&self) -> bool {
        self.violations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_messages() {
        let v = Violation {
            rule_id: "deny-module".into(),
            kind: ViolationKind::DangerousImport,
            line_number: 1,
            subject: "os".into(),
        };
        assert_eq!(v.message(), "Dangerous import: os");
        let v = Violation {
            kind: ViolationKind::DangerousCall,
            subject: "eval".into(),
            ..v
        };
        assert_eq!(v.message(), "Dangerous function call: eval");
    }
}
