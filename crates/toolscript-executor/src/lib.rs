//! Host runtime around the sandbox: service capabilities, skills and the
//! [`CodeExecutor`] facade used by the CLI and the stdio RPC server.

pub mod executor;
pub mod skills;
pub mod tools;

pub use executor::CodeExecutor;
pub use skills::{substitute, Skill, SkillStore, SkillStoreError};
pub use tools::{service_registry, CALL_MCP_TOOL};

/// Resolve the toolscript data root (`~/.toolscript` unless `TOOLSCRIPT_HOME` is set).
pub fn data_root() -> std::path::PathBuf {
    toolscript_core::config::PathsConfig::from_env().home
}

/// Default location of the persisted skill store.
pub fn skills_file() -> std::path::PathBuf {
    toolscript_core::config::PathsConfig::from_env().skills_file
}
