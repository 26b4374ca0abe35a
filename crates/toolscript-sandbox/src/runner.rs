//! The execution pipeline: validate → compile → run in a session.

use std::time::Instant;

use toolscript_core::config::SandboxConfig;
use toolscript_core::observability;
use toolscript_core::protocol::{FaultClass, ResultEnvelope, ValidationVerdict};

use crate::compiler::{compile, CompileFault, CompiledProgram};
use crate::environment::ExecutionEnvironment;
use crate::info_log;
use crate::security::{RulesConfig, StaticValidator};
use crate::session::Session;

/// Default origin recorded in audit events for direct submissions
pub const ORIGIN_EXEC: &str = "exec";

/// Static validator plus execution environment. Cheap to clone and share.
#[derive(Debug, Clone)]
pub struct Sandbox {
    validator: StaticValidator,
    env: ExecutionEnvironment,
}

impl Sandbox {
    pub fn new(env: ExecutionEnvironment) -> Self {
        Self {
            validator: StaticValidator::new(),
            env,
        }
    }

    /// Sandbox whose validator honours the configured rules file, if any.
    pub fn from_config(env: ExecutionEnvironment, config: &SandboxConfig) -> anyhow::Result<Self> {
        let rules = RulesConfig::resolve(config.rules_file.as_deref())?;
        Ok(Self::new(env).with_validator(StaticValidator::with_config(&rules)))
    }

    pub fn with_validator(mut self, validator: StaticValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn env(&self) -> &ExecutionEnvironment {
        &self.env
    }

    pub fn validator(&self) -> &StaticValidator {
        &self.validator
    }

    pub fn validate(&self, source: &str) -> ValidationVerdict {
        self.validator.validate(source)
    }

    pub fn compile(&self, source: &str) -> Result<CompiledProgram, CompileFault> {
        compile(source)
    }

    /// Run an already compiled program; skips validation.
    pub fn run(&self, program: CompiledProgram) -> ResultEnvelope {
        Session::run(program, &self.env)
    }

    pub fn execute(&self, source: &str) -> ResultEnvelope {
        self.execute_as(ORIGIN_EXEC, source)
    }

    /// Full pipeline; `origin` tags audit and security events (e.g. `skill:<name>`).
    pub fn execute_as(&self, origin: &str, source: &str) -> ResultEnvelope {
        let code_hash = observability::code_hash(source);
        observability::audit_execution_started(origin, &code_hash, source.len());
        tracing::debug!(origin, code_hash = %code_hash, "Sandbox execution start");
        let start = Instant::now();

        let envelope = self.pipeline(origin, &code_hash, source);

        let duration_ms = start.elapsed().as_millis() as u64;
        observability::audit_execution_completed(
            origin,
            &code_hash,
            envelope.success,
            duration_ms,
            envelope.output.len(),
        );
        match envelope.fault {
            None => info_log!("[OK] {} finished in {} ms", origin, duration_ms),
            Some(fault) => info_log!(
                "[{}] {}: {}",
                fault.to_string().to_uppercase(),
                origin,
                envelope.error.as_deref().unwrap_or_default()
            ),
        }
        envelope
    }

    fn pipeline(&self, origin: &str, code_hash: &str, source: &str) -> ResultEnvelope {
        let verdict = self.validate(source);
        if !verdict.valid {
            observability::security_validation_blocked(origin, code_hash, &verdict.violations);
            return ResultEnvelope::rejected(&verdict);
        }
        let program = match self.compile(source) {
            Ok(program) => program,
            Err(fault) => {
                observability::security_compilation_blocked(origin, code_hash, &fault.messages());
                return ResultEnvelope::failed(FaultClass::Compilation, fault.to_string(), String::new());
            }
        };
        let envelope = self.run(program);
        if envelope.fault == Some(FaultClass::Timeout) {
            observability::security_budget_exceeded(
                origin,
                code_hash,
                envelope.error.as_deref().unwrap_or_default(),
            );
        }
        envelope
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(ExecutionEnvironment::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ExecutionLimits;
    use serde_json::json;

    fn sandbox() -> Sandbox {
        Sandbox::new(
            ExecutionEnvironment::builder()
                .limits(ExecutionLimits::default().with_max_steps(100_000))
                .build(),
        )
    }

    #[test]
    fn test_validation_rejection_runs_nothing() {
        let env = sandbox().execute("print('side effect')\nimport os\nos.system('ls')");
        assert!(!env.success);
        assert_eq!(env.fault, Some(FaultClass::Validation));
        assert_eq!(env.error.as_deref(), Some("Code validation failed: Dangerous import: os"));
        assert_eq!(env.output, "");
    }

    #[test]
    fn test_all_violations_joined() {
        let env = sandbox().execute("import subprocess\neval('1')");
        assert_eq!(
            env.error.as_deref(),
            Some("Code validation failed: Dangerous import: subprocess; Dangerous function call: eval")
        );
    }

    #[test]
    fn test_compilation_fault() {
        let env = sandbox().execute("x = 'a'.__class__");
        assert_eq!(env.fault, Some(FaultClass::Compilation));
        assert!(env.error.unwrap().starts_with("Compilation errors: Line 1:"));
    }

    #[test]
    fn test_eval_alias_fails_at_runtime() {
        let env = sandbox().execute("e = eval\nresult = e('1 + 1')");
        assert_eq!(env.fault, Some(FaultClass::Runtime));
        assert_eq!(env.error.as_deref(), Some("NameError: name 'eval' is not defined (line 1)"));
    }

    #[test]
    fn test_successful_execution() {
        let env = sandbox().execute("import math\nresult = {'root': math.sqrt(16)}");
        assert!(env.success);
        assert_eq!(env.result, Some(json!({"root": 4.0})));
    }

    #[test]
    fn test_empty_source_is_valid() {
        let sb = sandbox();
        assert!(sb.validate("   \n").valid);
        let env = sb.execute("");
        assert!(env.success);
        assert_eq!(env.result, None);
    }

    #[test]
    fn test_budget_fault_cannot_be_swallowed() {
        let env = sandbox().execute("try:\n    while True:\n        pass\nexcept:\n    result = 1");
        assert_eq!(env.fault, Some(FaultClass::Timeout));
        assert_eq!(env.result, None);
    }
}
