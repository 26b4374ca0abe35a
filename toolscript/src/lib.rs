//! toolscript: run agent-written programs in a restricted interpreter.
//!
//! Commands are routed through [`command_registry::CommandRegistry`]; each
//! `dispatch` module registers the handlers for the commands it owns.

mod cli;
mod codegen;
mod command_registry;
mod commands;
mod dispatch;
mod protocol;
mod stdio_rpc;

use anyhow::Result;
use clap::Parser;
use toolscript_core::config::loader::init_daemon_env;
use toolscript_core::observability::{init_tracing, TracingMode};

use cli::{Cli, Commands};
use command_registry::CommandRegistry;

pub use codegen::{generate_for_task, TaskKind};

/// Parse arguments, set up tracing and run the selected command.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    // stdout belongs to the protocol when serving; keep logs quiet and on stderr.
    if matches!(cli.command, Commands::Serve { stdio: true }) {
        init_daemon_env();
        init_tracing(TracingMode::Daemon);
    } else {
        init_tracing(TracingMode::Default);
    }

    let mut reg = CommandRegistry::new();
    dispatch::register_all(&mut reg);
    reg.dispatch(&cli.command)
}
