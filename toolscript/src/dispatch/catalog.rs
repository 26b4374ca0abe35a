//! Catalog commands: Ls, Cat, FindTools

use crate::cli::Commands;
use crate::command_registry::CommandRegistry;
use crate::commands::catalog;

pub fn register(reg: &mut CommandRegistry) {
    reg.register(|cmd| match cmd {
        Commands::Ls { path } => Some(catalog::cmd_ls(path)),
        Commands::Cat { path } => Some(catalog::cmd_cat(path)),
        Commands::FindTools { service } => Some(catalog::cmd_find_tools(service.as_deref())),
        _ => None,
    });
}
