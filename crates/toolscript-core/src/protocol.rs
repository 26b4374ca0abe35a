//! Boundary types: the only values that leave the sandbox.
//!
//! Every execution attempt produces exactly one [`ResultEnvelope`]; static checks
//! produce a [`ValidationVerdict`]. Both are plain serde data so the CLI, the stdio
//! RPC and library callers share one vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which layer rejected or aborted an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultClass {
    /// Static validator rejected the source
    Validation,
    /// Restricted compiler rejected the source
    Compilation,
    /// The program raised while running
    Runtime,
    /// Wall-clock or step budget exhausted
    Timeout,
    /// Unknown skill name
    NotFound,
}

impl std::fmt::Display for FaultClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultClass::Validation => write!(f, "validation"),
            FaultClass::Compilation => write!(f, "compilation"),
            FaultClass::Runtime => write!(f, "runtime"),
            FaultClass::Timeout => write!(f, "timeout"),
            FaultClass::NotFound => write!(f, "not_found"),
        }
    }
}

/// Result of one execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub success: bool,
    /// Everything the program printed, including output produced before a fault.
    pub output: String,
    /// The program's `result` variable as JSON; `None` when never assigned.
    pub result: Option<Value>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultClass>,
}

impl ResultEnvelope {
    /// Successful completion.
    pub fn completed(output: String, result: Option<Value>) -> Self {
        Self {
            success: true,
            output,
            result,
            error: None,
            fault: None,
        }
    }

    /// Failed attempt; `output` keeps whatever was captured before the failure.
    pub fn failed(fault: FaultClass, error: impl Into<String>, output: String) -> Self {
        Self {
            success: false,
            output,
            result: None,
            error: Some(error.into()),
            fault: Some(fault),
        }
    }

    /// Rejected by the static validator; nothing ran.
    pub fn rejected(verdict: &ValidationVerdict) -> Self {
        Self::failed(
            FaultClass::Validation,
            format!("Code validation failed: {}", verdict.violations.join("; ")),
            String::new(),
        )
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Outcome of static validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    /// Human-readable violations in source order; empty when valid.
    #[serde(rename = "errors")]
    pub violations: Vec<String>,
}

impl ValidationVerdict {
    pub fn ok() -> Self {
        Self {
            valid: true,
            violations: Vec::new(),
        }
    }

    pub fn from_violations(violations: Vec<String>) -> Self {
        Self {
            valid: violations.is_empty(),
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completed_envelope_shape() {
        let env = ResultEnvelope::completed(String::new(), Some(json!({"a": 3})));
        assert_eq!(
            env.to_json(),
            json!({"success": true, "output": "", "result": {"a": 3}, "error": null})
        );
    }

    #[test]
    fn test_rejected_envelope_lists_every_violation() {
        let verdict = ValidationVerdict::from_violations(vec![
            "Dangerous import: os".to_string(),
            "Dangerous function call: eval".to_string(),
        ]);
        assert!(!verdict.valid);
        let env = ResultEnvelope::rejected(&verdict);
        assert!(!env.success);
        assert_eq!(env.fault, Some(FaultClass::Validation));
        assert_eq!(
            env.error.as_deref(),
            Some("Code validation failed: Dangerous import: os; Dangerous function call: eval")
        );
    }

    #[test]
    fn test_verdict_serializes_errors_key() {
        let verdict = ValidationVerdict::from_violations(vec!["Dangerous import: os".into()]);
        assert_eq!(
            serde_json::to_value(&verdict).unwrap(),
            json!({"valid": false, "errors": ["Dangerous import: os"]})
        );
    }
}
