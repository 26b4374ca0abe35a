//! Per-execution resource budget.

use std::time::Duration;

use toolscript_core::config::SandboxConfig;

/// Grace period the watchdog waits past the deadline before abandoning the worker
pub const WATCHDOG_GRACE: Duration = Duration::from_millis(500);

/// Budget applied to every execution in an environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Wall-clock budget (default: 30 s)
    pub timeout: Duration,
    /// Statements, loop iterations and calls (default: 5 000 000)
    pub max_steps: u64,
    /// Nesting of user function calls (default: 64)
    pub max_call_depth: usize,
    /// Captured output (default: 1 MiB)
    pub max_output_bytes: usize,
    /// Length of any single list, dict or string the program builds (default: 1 000 000)
    pub max_collection_len: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self::from_config(&SandboxConfig::default())
    }
}

impl ExecutionLimits {
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            max_steps: config.max_steps.max(1),
            max_call_depth: config.max_call_depth.max(1),
            max_output_bytes: config.max_output_bytes,
            max_collection_len: config.max_collection_len.max(1),
        }
    }

    /// Load limits from environment variables
    pub fn from_env() -> Self {
        Self::from_config(&SandboxConfig::from_env())
    }

    /// Override with CLI parameters
    pub fn with_cli_overrides(mut self, timeout_secs: Option<u64>, max_steps: Option<u64>) -> Self {
        if let Some(t) = timeout_secs {
            self.timeout = Duration::from_secs(t.max(1));
        }
        if let Some(s) = max_steps {
            self.max_steps = s.max(1);
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    pub fn with_max_collection_len(mut self, len: usize) -> Self {
        self.max_collection_len = len;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_config() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.timeout, Duration::from_secs(30));
        assert_eq!(limits.max_steps, 5_000_000);
        assert_eq!(limits.max_call_depth, 64);
    }

    #[test]
    fn test_cli_overrides() {
        let limits = ExecutionLimits::default().with_cli_overrides(Some(5), None);
        assert_eq!(limits.timeout, Duration::from_secs(5));
        assert_eq!(limits.max_steps, 5_000_000);
        let limits = ExecutionLimits::default().with_cli_overrides(None, Some(10));
        assert_eq!(limits.max_steps, 10);
    }
}
