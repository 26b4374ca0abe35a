//! Command implementations. Results go to stdout; status lines go to stderr.

pub mod catalog;
pub mod execute;
pub mod skill;

use anyhow::{Context, Result};
use std::io::Read;
use toolscript_core::config::SandboxConfig;
use toolscript_executor::CodeExecutor;

/// Program text from `--code`, a file, or stdin (`-` or nothing given).
pub(crate) fn read_source(file: Option<&str>, code: Option<&str>) -> Result<String> {
    if let Some(code) = code {
        return Ok(code.to_string());
    }
    match file {
        Some(path) if path != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read program file: {}", path)),
        _ => {
            let mut s = String::new();
            std::io::stdin()
                .read_to_string(&mut s)
                .context("Failed to read program from stdin")?;
            Ok(s)
        }
    }
}

/// Executor with env config and CLI budget overrides.
pub(crate) fn build_executor(timeout: Option<u64>, max_steps: Option<u64>) -> Result<CodeExecutor> {
    let config = SandboxConfig::from_env().with_cli_overrides(timeout, max_steps);
    CodeExecutor::new(&config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_code_wins() {
        assert_eq!(read_source(Some("ignored.py"), Some("x = 1")).unwrap(), "x = 1");
    }

    #[test]
    fn test_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog.py");
        std::fs::write(&path, "result = 2\n").unwrap();
        assert_eq!(read_source(path.to_str(), None).unwrap(), "result = 2\n");
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = read_source(Some("/definitely/not/here.py"), None).unwrap_err();
        assert!(err.to_string().starts_with("Failed to read program file"));
    }
}
