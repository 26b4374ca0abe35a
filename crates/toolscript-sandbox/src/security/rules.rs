//! Validator rule configuration
//!
//! `RulesConfig` extends or replaces the built-in deny lists from a YAML file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for validator rules
///
/// # Example YAML Configuration
///
/// ```yaml
/// # .toolscript-rules.yaml
/// use_default_rules: true
/// deny_modules:
///   - requests
/// deny_calls:
///   - exit
/// allow_modules:
///   - glob
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Whether to start from the built-in deny lists (default: true)
    #[serde(default = "default_use_defaults")]
    pub use_default_rules: bool,
    /// Extra module paths to reject; submodules match too
    #[serde(default)]
    pub deny_modules: Vec<String>,
    /// Extra function names to reject when called directly
    #[serde(default)]
    pub deny_calls: Vec<String>,
    /// Module paths removed from the deny list
    #[serde(default)]
    pub allow_modules: Vec<String>,
    /// Function names removed from the deny list
    #[serde(default)]
    pub allow_calls: Vec<String>,
}

fn default_use_defaults() -> bool {
    true
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            use_default_rules: true,
            deny_modules: Vec::new(),
            deny_calls: Vec::new(),
            allow_modules: Vec::new(),
            allow_calls: Vec::new(),
        }
    }
}

/// Configuration file names recognized by [`RulesConfig::load_or_default`]
pub const CONFIG_FILE_NAMES: &[&str] = &[
    ".toolscript-rules.yaml",
    ".toolscript-rules.yml",
    "toolscript-rules.yaml",
];

impl RulesConfig {
    /// Load rules configuration from a YAML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules config: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse rules config: {}", path.display()))
    }

    /// Look for a rules file in `dir`; fall back to defaults.
    pub fn load_or_default(dir: Option<&Path>) -> Self {
        if let Some(dir) = dir {
            for name in CONFIG_FILE_NAMES {
                let config_path = dir.join(name);
                if config_path.exists() {
                    match Self::load_from_file(&config_path) {
                        Ok(config) => return config,
                        Err(e) => tracing::warn!("Ignoring rules file: {:#}", e),
                    }
                }
            }
        }
        Self::default()
    }

    /// Explicit file (from `TOOLSCRIPT_RULES_FILE`) wins; otherwise search the
    /// working directory. An explicit file that fails to load is an error.
    pub fn resolve(explicit: Option<&str>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_file(Path::new(path)),
            None => {
                let cwd = std::env::current_dir().ok();
                Ok(Self::load_or_default(cwd.as_deref()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_yaml_uses_defaults() {
        let cfg: RulesConfig = serde_yaml::from_str("deny_calls: [exit]\n").unwrap();
        assert!(cfg.use_default_rules);
        assert_eq!(cfg.deny_calls, vec!["exit".to_string()]);
        assert!(cfg.deny_modules.is_empty());
    }

    #[test]
    fn test_load_or_default_finds_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(".toolscript-rules.yaml"),
            "use_default_rules: false\ndeny_modules: [requests]\n",
        )
        .unwrap();
        let cfg = RulesConfig::load_or_default(Some(tmp.path()));
        assert!(!cfg.use_default_rules);
        assert_eq!(cfg.deny_modules, vec!["requests".to_string()]);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = RulesConfig::load_or_default(Some(tmp.path()));
        assert!(cfg.use_default_rules);
    }

    #[test]
    fn test_resolve_explicit_missing_file_is_error() {
        assert!(RulesConfig::resolve(Some("/nonexistent/rules.yaml")).is_err());
    }
}
