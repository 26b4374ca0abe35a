//! Command dispatch: each area registers the `Commands` variants it owns.

mod catalog;
mod execute;
mod protocol;
mod skill;

use crate::command_registry::CommandRegistry;

/// Register every command handler.
pub fn register_all(reg: &mut CommandRegistry) {
    protocol::register(reg);
    execute::register(reg);
    skill::register(reg);
    catalog::register(reg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Commands;

    #[test]
    fn test_catalog_commands_are_routed() {
        let mut reg = CommandRegistry::new();
        register_all(&mut reg);
        reg.dispatch(&Commands::Ls { path: "servers".into() }).unwrap();
        assert!(reg
            .dispatch(&Commands::Cat { path: "servers/none.py".into() })
            .is_err());
    }

    #[test]
    fn test_serve_without_transport_is_an_error() {
        let mut reg = CommandRegistry::new();
        register_all(&mut reg);
        let err = reg.dispatch(&Commands::Serve { stdio: false }).unwrap_err();
        assert_eq!(err.to_string(), "serve requires a transport: use --stdio");
    }
}
