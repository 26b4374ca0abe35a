//! toolscript-sandbox: run agent-written programs under a restricted interpreter.
//!
//! Pipeline: [`security::StaticValidator`] rejects dangerous imports and calls,
//! [`compiler::compile`] applies the restriction pass, and [`session::Session`]
//! runs the program against an [`environment::ExecutionEnvironment`] whose only
//! link to the outside world is the [`capabilities::CapabilityRegistry`].
//! [`runner::Sandbox`] ties the three together and produces a
//! `toolscript_core::protocol::ResultEnvelope`.

pub mod capabilities;
pub mod compiler;
pub mod environment;
pub mod interp;
pub mod lang;
pub mod limits;
pub mod log;
pub mod runner;
pub mod security;
pub mod session;

pub use capabilities::{CallArgs, Capability, CapabilityError, CapabilityRegistry, ParamSpec, SideEffect};
pub use compiler::{compile, CompileFault, CompiledProgram};
pub use environment::ExecutionEnvironment;
pub use limits::ExecutionLimits;
pub use runner::Sandbox;
pub use session::Session;
