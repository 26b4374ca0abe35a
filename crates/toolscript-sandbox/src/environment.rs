//! Execution environment: capabilities, safe modules, access guard and limits.
//!
//! Built once per host and shared by every session through `Arc`. Nothing in
//! here is mutated by a running program; each execution gets a fresh namespace.

use std::sync::Arc;

use crate::capabilities::CapabilityRegistry;
use crate::interp::{AccessGuard, DefaultGuard, ModuleKind};
use crate::limits::ExecutionLimits;

#[derive(Clone)]
pub struct ExecutionEnvironment {
    registry: Arc<CapabilityRegistry>,
    guard: Arc<dyn AccessGuard>,
    limits: ExecutionLimits,
    modules: Vec<ModuleKind>,
}

impl std::fmt::Debug for ExecutionEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEnvironment")
            .field("capabilities", &self.registry.names())
            .field("limits", &self.limits)
            .field("modules", &self.modules)
            .finish()
    }
}

impl Default for ExecutionEnvironment {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ExecutionEnvironment {
    pub fn builder() -> ExecutionEnvironmentBuilder {
        ExecutionEnvironmentBuilder::default()
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn guard(&self) -> &dyn AccessGuard {
        self.guard.as_ref()
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Safe module by name, if importable in this environment.
    pub fn module(&self, name: &str) -> Option<ModuleKind> {
        ModuleKind::from_name(name).filter(|m| self.modules.contains(m))
    }

    pub fn modules(&self) -> &[ModuleKind] {
        &self.modules
    }

    /// Copy of this environment with different limits; the registry and guard stay shared.
    pub fn with_limits(&self, limits: ExecutionLimits) -> Self {
        Self {
            limits,
            ..self.clone()
        }
    }
}

pub struct ExecutionEnvironmentBuilder {
    registry: Option<Arc<CapabilityRegistry>>,
    guard: Option<Arc<dyn AccessGuard>>,
    limits: Option<ExecutionLimits>,
    modules: Vec<ModuleKind>,
}

impl Default for ExecutionEnvironmentBuilder {
    fn default() -> Self {
        Self {
            registry: None,
            guard: None,
            limits: None,
            modules: ModuleKind::ALL.to_vec(),
        }
    }
}

impl ExecutionEnvironmentBuilder {
    pub fn registry(mut self, registry: Arc<CapabilityRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn guard(mut self, guard: Arc<dyn AccessGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Restrict the safe-module table (default: json, math, time, re).
    pub fn modules(mut self, modules: &[ModuleKind]) -> Self {
        self.modules = modules.to_vec();
        self
    }

    pub fn build(self) -> ExecutionEnvironment {
        ExecutionEnvironment {
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(CapabilityRegistry::empty())),
            guard: self.guard.unwrap_or_else(|| Arc::new(DefaultGuard::new())),
            limits: self.limits.unwrap_or_else(ExecutionLimits::from_env),
            modules: self.modules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_module_table_restriction() {
        let env = ExecutionEnvironment::builder()
            .modules(&[ModuleKind::Math])
            .build();
        assert_eq!(env.module("math"), Some(ModuleKind::Math));
        assert_eq!(env.module("json"), None);
        assert_eq!(env.module("os"), None);
    }

    #[test]
    fn test_with_limits_shares_registry() {
        let env = ExecutionEnvironment::builder()
            .limits(ExecutionLimits::default())
            .build();
        let short = env.with_limits(ExecutionLimits::default().with_timeout(Duration::from_secs(1)));
        assert_eq!(short.limits().timeout, Duration::from_secs(1));
        assert!(Arc::ptr_eq(&env.registry, &short.registry));
    }
}
