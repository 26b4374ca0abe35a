//! toolscript configuration layer
//!
//! Every environment variable is read here; the rest of the workspace goes through
//! the structured configs instead of calling `std::env::var` directly.
//!
//! - `loader`: env_or, env_optional, env_bool, env_parse helpers
//! - `schema`: ObservabilityConfig, SandboxConfig, PathsConfig
//! - `env_keys`: key constants (with aliases)

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, env_parse, load_dotenv, load_dotenv_from_dir};
pub use schema::{ObservabilityConfig, PathsConfig, SandboxConfig};
