//! Static validation of agent-written programs
//!
//! The validator is the first gate: it parses the program and rejects imports
//! of dangerous modules and direct calls of dangerous built-ins. Whatever it
//! misses is still confined by the restricted compiler and the guarded
//! interpreter; it is an early, explainable rejection, not the security boundary.
//!
//! ```rust,ignore
//! use toolscript_sandbox::security::{StaticValidator, format_verdict};
//!
//! let validator = StaticValidator::new();
//! let verdict = validator.validate("import os");
//! assert!(!verdict.valid);
//! println!("{}", format_verdict(&validator.scan("import os")));
//! ```

pub mod default_rules;
pub mod rules;
pub mod types;
pub mod validator;

pub use rules::RulesConfig;
pub use types::{ScanReport, Violation, ViolationKind};
pub use validator::{format_verdict, format_verdict_json, StaticValidator};
