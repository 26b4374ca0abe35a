//! exec / validate / task

use anyhow::Result;
use toolscript_sandbox::security::{format_verdict, format_verdict_json};

use super::{build_executor, read_source};
use crate::codegen::generate_for_task;

/// Run a program and print its result envelope. Fails when the run faulted,
/// so the process exit status reflects success.
pub fn cmd_exec(
    file: Option<&str>,
    code: Option<&str>,
    timeout: Option<u64>,
    max_steps: Option<u64>,
) -> Result<()> {
    let source = read_source(file, code)?;
    let executor = build_executor(timeout, max_steps)?;
    let envelope = executor.execute(&source);
    println!("{}", serde_json::to_string_pretty(&envelope.to_json())?);
    if !envelope.success {
        anyhow::bail!(
            "Execution failed: {}",
            envelope.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

pub fn cmd_validate(file: Option<&str>, code: Option<&str>, json: bool) -> Result<()> {
    let source = read_source(file, code)?;
    let executor = build_executor(None, None)?;
    let report = executor.sandbox().validator().scan(&source);
    if json {
        println!("{}", format_verdict_json(&report));
    } else {
        println!("{}", format_verdict(&report));
    }
    if !report.is_safe() {
        anyhow::bail!("Program rejected by validator");
    }
    Ok(())
}

pub fn cmd_task(
    description: &str,
    show_code: bool,
    timeout: Option<u64>,
    max_steps: Option<u64>,
) -> Result<()> {
    let program = generate_for_task(description);
    if show_code {
        eprintln!("── generated program ──\n{}", program);
    }
    let executor = build_executor(timeout, max_steps)?;
    let envelope = executor.execute(&program);
    println!("{}", serde_json::to_string_pretty(&envelope.to_json())?);
    if !envelope.success {
        anyhow::bail!(
            "Task failed: {}",
            envelope.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_success() {
        cmd_exec(None, Some("result = 1 + 1"), None, Some(10_000)).unwrap();
    }

    #[test]
    fn test_exec_fault_is_error() {
        let err = cmd_exec(None, Some("x = 1 / 0"), None, Some(10_000)).unwrap_err();
        assert!(err.to_string().starts_with("Execution failed: ZeroDivisionError"));
    }

    #[test]
    fn test_validate_rejects_import() {
        assert!(cmd_validate(None, Some("import os"), true).is_err());
        assert!(cmd_validate(None, Some("import json\nresult = json.dumps([1])"), false).is_ok());
    }

    #[test]
    fn test_task_runs_generated_program() {
        cmd_task("process large spreadsheet", false, None, None).unwrap();
    }
}
