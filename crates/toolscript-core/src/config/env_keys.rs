//! Environment variable keys.
//!
//! Primary variables use the `TOOLSCRIPT_*` prefix; short aliases are accepted where
//! noted.

/// Observability and logging
pub mod observability {
    pub const TOOLSCRIPT_QUIET: &str = "TOOLSCRIPT_QUIET";
    pub const QUIET_ALIASES: &[&str] = &["TS_QUIET"];

    pub const TOOLSCRIPT_LOG_LEVEL: &str = "TOOLSCRIPT_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &["TS_LOG_LEVEL"];

    pub const TOOLSCRIPT_LOG_JSON: &str = "TOOLSCRIPT_LOG_JSON";
    pub const LOG_JSON_ALIASES: &[&str] = &["TS_LOG_JSON"];

    pub const TOOLSCRIPT_AUDIT_LOG: &str = "TOOLSCRIPT_AUDIT_LOG";
    pub const AUDIT_LOG_ALIASES: &[&str] = &["TS_AUDIT_LOG"];

    pub const TOOLSCRIPT_SECURITY_EVENTS_LOG: &str = "TOOLSCRIPT_SECURITY_EVENTS_LOG";
}

/// Execution budget of a single sandbox session
pub mod sandbox {
    pub const TOOLSCRIPT_TIMEOUT_SECS: &str = "TOOLSCRIPT_TIMEOUT_SECS";
    pub const TIMEOUT_ALIASES: &[&str] = &["TS_TIMEOUT_SECS"];

    pub const TOOLSCRIPT_MAX_STEPS: &str = "TOOLSCRIPT_MAX_STEPS";
    pub const TOOLSCRIPT_MAX_CALL_DEPTH: &str = "TOOLSCRIPT_MAX_CALL_DEPTH";
    pub const TOOLSCRIPT_MAX_OUTPUT_BYTES: &str = "TOOLSCRIPT_MAX_OUTPUT_BYTES";
    pub const TOOLSCRIPT_MAX_COLLECTION_LEN: &str = "TOOLSCRIPT_MAX_COLLECTION_LEN";

    /// Path to a YAML file extending the validator deny-lists.
    pub const TOOLSCRIPT_RULES_FILE: &str = "TOOLSCRIPT_RULES_FILE";
}

/// Skill store and workspace paths
pub mod paths {
    pub const TOOLSCRIPT_HOME: &str = "TOOLSCRIPT_HOME";
    pub const TOOLSCRIPT_SKILLS_FILE: &str = "TOOLSCRIPT_SKILLS_FILE";
    pub const SKILLS_FILE_ALIASES: &[&str] = &["TS_SKILLS_FILE"];
}
