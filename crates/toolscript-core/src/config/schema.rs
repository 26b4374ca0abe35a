//! Configuration structs grouped by domain, loaded from the environment.

use super::env_keys::{observability as obv_keys, paths as path_keys, sandbox as sbx_keys};
use super::loader::{env_bool, env_optional, env_or, env_parse};
use std::path::PathBuf;

/// Default wall-clock budget of one execution, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default interpreter step budget (statements + loop iterations + calls)
pub const DEFAULT_MAX_STEPS: u64 = 5_000_000;

/// Default maximum nesting of user function calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Default cap on captured output (1 MiB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Default cap on the length of a single list/str/dict built by a program
pub const DEFAULT_MAX_COLLECTION_LEN: usize = 1_000_000;

/// Observability: quiet, log_level, log_json, audit_log, security_events_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
    pub security_events_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::TOOLSCRIPT_QUIET, obv_keys::QUIET_ALIASES, false),
                log_level: env_or(
                    obv_keys::TOOLSCRIPT_LOG_LEVEL,
                    obv_keys::LOG_LEVEL_ALIASES,
                    || "toolscript=info".to_string(),
                ),
                log_json: env_bool(obv_keys::TOOLSCRIPT_LOG_JSON, obv_keys::LOG_JSON_ALIASES, false),
                audit_log: env_optional(obv_keys::TOOLSCRIPT_AUDIT_LOG, obv_keys::AUDIT_LOG_ALIASES),
                security_events_log: env_optional(obv_keys::TOOLSCRIPT_SECURITY_EVENTS_LOG, &[]),
            }
        })
    }
}

/// Execution budget and validator rule source for sandbox sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    pub timeout_secs: u64,
    pub max_steps: u64,
    pub max_call_depth: usize,
    pub max_output_bytes: usize,
    pub max_collection_len: usize,
    /// Extra validator rules (YAML). `None` means defaults only.
    pub rules_file: Option<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_steps: DEFAULT_MAX_STEPS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
            rules_file: None,
        }
    }
}

impl SandboxConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            timeout_secs: env_parse(
                sbx_keys::TOOLSCRIPT_TIMEOUT_SECS,
                sbx_keys::TIMEOUT_ALIASES,
                DEFAULT_TIMEOUT_SECS,
            ),
            max_steps: env_parse(sbx_keys::TOOLSCRIPT_MAX_STEPS, &[], DEFAULT_MAX_STEPS),
            max_call_depth: env_parse(
                sbx_keys::TOOLSCRIPT_MAX_CALL_DEPTH,
                &[],
                DEFAULT_MAX_CALL_DEPTH,
            ),
            max_output_bytes: env_parse(
                sbx_keys::TOOLSCRIPT_MAX_OUTPUT_BYTES,
                &[],
                DEFAULT_MAX_OUTPUT_BYTES,
            ),
            max_collection_len: env_parse(
                sbx_keys::TOOLSCRIPT_MAX_COLLECTION_LEN,
                &[],
                DEFAULT_MAX_COLLECTION_LEN,
            ),
            rules_file: env_optional(sbx_keys::TOOLSCRIPT_RULES_FILE, &[]),
        }
    }

    /// Override with CLI parameters
    pub fn with_cli_overrides(mut self, timeout_secs: Option<u64>, max_steps: Option<u64>) -> Self {
        if let Some(t) = timeout_secs {
            self.timeout_secs = t;
        }
        if let Some(s) = max_steps {
            self.max_steps = s;
        }
        self
    }
}

/// Locations of host-managed state
#[derive(Debug, Clone)]
pub struct PathsConfig {
    /// `~/.toolscript` unless `TOOLSCRIPT_HOME` is set
    pub home: PathBuf,
    /// JSON file the host persists the skill store to
    pub skills_file: PathBuf,
}

impl PathsConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let home = env_optional(path_keys::TOOLSCRIPT_HOME, &[])
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".toolscript")
            });
        let skills_file = env_optional(
            path_keys::TOOLSCRIPT_SKILLS_FILE,
            path_keys::SKILLS_FILE_ALIASES,
        )
        .map(PathBuf::from)
        .unwrap_or_else(|| home.join("skills.json"));
        Self { home, skills_file }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_take_precedence() {
        let cfg = SandboxConfig::default().with_cli_overrides(Some(5), None);
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.max_steps, DEFAULT_MAX_STEPS);
    }

    #[test]
    fn test_skills_file_defaults_under_home() {
        super::super::loader::set_env_var(path_keys::TOOLSCRIPT_HOME, "/tmp/ts-home-test");
        let paths = PathsConfig::from_env();
        assert_eq!(paths.home, PathBuf::from("/tmp/ts-home-test"));
        if std::env::var(path_keys::TOOLSCRIPT_SKILLS_FILE).is_err() {
            assert_eq!(paths.skills_file, PathBuf::from("/tmp/ts-home-test/skills.json"));
        }
    }
}
