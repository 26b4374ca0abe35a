//! Execution commands: Exec, Validate, Task

use crate::cli::Commands;
use crate::command_registry::CommandRegistry;
use crate::commands::execute;

pub fn register(reg: &mut CommandRegistry) {
    reg.register(|cmd| match cmd {
        Commands::Exec {
            file,
            code,
            timeout,
            max_steps,
        } => Some(execute::cmd_exec(
            file.as_deref(),
            code.as_deref(),
            *timeout,
            *max_steps,
        )),
        Commands::Validate { file, code, json } => Some(execute::cmd_validate(
            file.as_deref(),
            code.as_deref(),
            *json,
        )),
        Commands::Task {
            description,
            show_code,
            timeout,
            max_steps,
        } => Some(execute::cmd_task(description, *show_code, *timeout, *max_steps)),
        _ => None,
    });
}
