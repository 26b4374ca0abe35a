//! Observability: tracing init, audit log, security events.
//!
//! Uses config::ObservabilityConfig for TOOLSCRIPT_QUIET, LOG_LEVEL, AUDIT_LOG, etc.
//! Logs always go to stderr; stdout belongs to command output and RPC frames.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing_subscriber::{prelude::*, EnvFilter};

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);
static SECURITY_EVENTS_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Tracing initialization mode.
#[derive(Clone, Copy)]
pub enum TracingMode {
    /// Use TOOLSCRIPT_LOG_LEVEL / TOOLSCRIPT_QUIET from env
    Default,
    /// stdio daemon: warnings only, regardless of log level
    Daemon,
}

/// Initialize tracing. Call at process startup.
pub fn init_tracing(mode: TracingMode) {
    let cfg = crate::config::ObservabilityConfig::from_env();
    let level: String = if cfg.quiet || matches!(mode, TracingMode::Daemon) {
        "toolscript=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

/// SHA256 of submitted source, used to correlate audit records without logging code.
pub fn code_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

fn resolve_path(cache: &Mutex<Option<String>>, configured: Option<&String>) -> Option<String> {
    {
        let guard = cache.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = configured?.clone();
    if path.is_empty() {
        return None;
    }
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = cache.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

fn get_audit_path() -> Option<String> {
    let cfg = crate::config::ObservabilityConfig::from_env();
    resolve_path(&AUDIT_PATH, cfg.audit_log.as_ref())
}

fn get_security_events_path() -> Option<String> {
    let cfg = crate::config::ObservabilityConfig::from_env();
    resolve_path(&SECURITY_EVENTS_PATH, cfg.security_events_log.as_ref())
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Audit: execution_started (after validation and compilation passed)
pub fn audit_execution_started(origin: &str, code_hash: &str, code_len: usize) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now_ts(),
            "event": "execution_started",
            "origin": origin,
            "code_hash": code_hash,
            "code_len": code_len,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: execution_completed
pub fn audit_execution_completed(
    origin: &str,
    code_hash: &str,
    success: bool,
    duration_ms: u64,
    output_len: usize,
) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now_ts(),
            "event": "execution_completed",
            "origin": origin,
            "code_hash": code_hash,
            "success": success,
            "duration_ms": duration_ms,
            "output_len": output_len,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: skill_saved
pub fn audit_skill_saved(name: &str, template_hash: &str) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now_ts(),
            "event": "skill_saved",
            "skill": name,
            "template_hash": template_hash,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: skill_invoked
pub fn audit_skill_invoked(name: &str, arg_keys: &[&str], found: bool) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now_ts(),
            "event": "skill_invoked",
            "skill": name,
            "arg_keys": arg_keys,
            "found": found,
        });
        append_jsonl(&path, &record);
    }
}

/// Security event: static validator rejected a program
pub fn security_validation_blocked(origin: &str, code_hash: &str, violations: &[String]) {
    tracing::warn!(
        origin = %origin,
        code_hash = %code_hash,
        violations = violations.len(),
        "Security: program rejected by static validator"
    );
    if let Some(path) = get_security_events_path() {
        let record = json!({
            "ts": now_ts(),
            "type": "validation_blocked",
            "category": "code_scan",
            "origin": origin,
            "details": {
                "code_hash": code_hash,
                "violations": violations,
            }
        });
        append_jsonl(&path, &record);
    }
}

/// Security event: restricted compiler rejected a program
pub fn security_compilation_blocked(origin: &str, code_hash: &str, errors: &[String]) {
    tracing::warn!(
        origin = %origin,
        code_hash = %code_hash,
        errors = errors.len(),
        "Security: program rejected by restricted compiler"
    );
    if let Some(path) = get_security_events_path() {
        let record = json!({
            "ts": now_ts(),
            "type": "compilation_blocked",
            "category": "restricted_grammar",
            "origin": origin,
            "details": {
                "code_hash": code_hash,
                "errors": errors,
            }
        });
        append_jsonl(&path, &record);
    }
}

/// Security event: execution budget exhausted (timeout, steps, output)
pub fn security_budget_exceeded(origin: &str, code_hash: &str, reason: &str) {
    tracing::warn!(
        origin = %origin,
        code_hash = %code_hash,
        reason = %reason,
        "Security: execution budget exceeded"
    );
    if let Some(path) = get_security_events_path() {
        let record = json!({
            "ts": now_ts(),
            "type": "budget_exceeded",
            "category": "runtime",
            "origin": origin,
            "details": {
                "code_hash": code_hash,
                "reason": reason,
            }
        });
        append_jsonl(&path, &record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_hash_deterministic() {
        let h1 = code_hash("result = 1");
        let h2 = code_hash("result = 1");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, code_hash("result = 2"));
    }

    #[test]
    fn test_append_jsonl_writes_one_line_per_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("audit.jsonl");
        let path = path.to_str().unwrap();
        append_jsonl(path, &json!({"event": "a"}));
        append_jsonl(path, &json!({"event": "b"}));
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"b\""));
    }
}
