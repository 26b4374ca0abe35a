//! Environment loading helpers.
//!
//! The fallback chain (primary key, then aliases, then default) lives here so that
//! callers never repeat `or_else` ladders.

use std::env;
use std::path::Path;
use std::str::FromStr;

/// Load `.env` from the current directory into the process environment.
///
/// Runs once per process; never overrides variables that are already set.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let dir = env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
        load_dotenv_from_dir(&dir);
    });
}

/// Load `<dir>/.env` (no-op when the file is missing).
pub fn load_dotenv_from_dir(dir: &Path) {
    let Ok(content) = std::fs::read_to_string(dir.join(".env")) else {
        return;
    };
    for (key, value) in parse_dotenv(&content) {
        if env::var(&key).is_err() {
            set_env_var(&key, &value);
        }
    }
}

/// Parse `KEY=value` lines. Quotes are stripped and `#` starts an inline comment
/// unless the value is quoted.
fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(eq_pos) = line.find('=') else {
            continue;
        };
        let key = line[..eq_pos].trim();
        let mut value = line[eq_pos + 1..].trim();
        if let Some(hash_pos) = value.find('#') {
            let before_hash = value[..hash_pos].trim_end();
            if !before_hash.contains('"') && !before_hash.contains('\'') {
                value = before_hash;
            }
        }
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        if !key.is_empty() {
            pairs.push((key.to_string(), value.to_string()));
        }
    }
    pairs
}

/// Read from the primary key or the alias chain, falling back to `default`.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// Read from the primary key or the alias chain. Blank values count as unset.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Boolean flag: 0/false/no/off are false, anything else set is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

/// Parse a typed value; unparsable input logs a warning and yields `default`.
pub fn env_parse<T>(primary: &str, aliases: &[&str], default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env_optional(primary, aliases) {
        Some(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            tracing::warn!("Invalid {}: {:?}, using default ({})", primary, raw, default);
            default
        }),
        None => default,
    }
}

// All `std::env::set_var` calls go through here. Callers must invoke it before
// spawning worker threads.
#[allow(unsafe_code)]
pub fn set_env_var(key: &str, value: &str) {
    unsafe { env::set_var(key, value) };
}

/// Quiet logging for daemon modes (stdio RPC): stdout carries protocol frames only.
pub fn init_daemon_env() {
    set_env_var(super::env_keys::observability::TOOLSCRIPT_QUIET, "1");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv_strips_quotes_and_comments() {
        let pairs = parse_dotenv(
            "# comment\nA=1\nB = \"two words\"\nC=three # trailing\n\nD='x#y'\nnot a pair\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two words".to_string()),
                ("C".to_string(), "three".to_string()),
                ("D".to_string(), "x#y".to_string()),
            ]
        );
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        set_env_var("TOOLSCRIPT_TEST_PARSE_GARBAGE", "abc");
        assert_eq!(env_parse("TOOLSCRIPT_TEST_PARSE_GARBAGE", &[], 7u64), 7);
        set_env_var("TOOLSCRIPT_TEST_PARSE_OK", "42");
        assert_eq!(env_parse("TOOLSCRIPT_TEST_PARSE_OK", &[], 7u64), 42);
    }

    #[test]
    fn test_env_optional_uses_alias_and_ignores_blank() {
        set_env_var("TOOLSCRIPT_TEST_BLANK", "   ");
        assert_eq!(env_optional("TOOLSCRIPT_TEST_BLANK", &[]), None);
        set_env_var("TOOLSCRIPT_TEST_ALIAS_B", "from-alias");
        assert_eq!(
            env_optional("TOOLSCRIPT_TEST_ALIAS_A", &["TOOLSCRIPT_TEST_ALIAS_B"]),
            Some("from-alias".to_string())
        );
    }

    #[test]
    fn test_env_bool_values() {
        set_env_var("TOOLSCRIPT_TEST_BOOL_OFF", "off");
        set_env_var("TOOLSCRIPT_TEST_BOOL_ON", "yes");
        assert!(!env_bool("TOOLSCRIPT_TEST_BOOL_OFF", &[], true));
        assert!(env_bool("TOOLSCRIPT_TEST_BOOL_ON", &[], false));
        assert!(env_bool("TOOLSCRIPT_TEST_BOOL_UNSET", &[], true));
    }
}
