//! Command registry: each dispatch module registers handlers for the `Commands`
//! variants it owns, so `lib.rs` never grows a match arm per command.
//!
//! Adding a command:
//! 1. add the variant to `Commands` in cli.rs
//! 2. call `reg.register(...)` from the matching dispatch module

use anyhow::Result;
use std::sync::Arc;

use crate::cli::Commands;

/// Handler: returns `Some(result)` when it owns the command, `None` otherwise
pub type CommandHandler = Arc<dyn Fn(&Commands) -> Option<Result<()>> + Send + Sync>;

/// Handlers are tried in registration order; the first `Some` wins
pub struct CommandRegistry {
    handlers: Vec<CommandHandler>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register<F>(&mut self, f: F)
    where
        F: Fn(&Commands) -> Option<Result<()>> + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(f));
    }

    pub fn dispatch(&self, cmd: &Commands) -> Result<()> {
        for h in &self.handlers {
            if let Some(r) = h(cmd) {
                return r;
            }
        }
        anyhow::bail!("no handler registered for command {:?}", cmd)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_first_matching_handler_wins() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut reg = CommandRegistry::new();
        let h = Arc::clone(&hits);
        reg.register(move |cmd| {
            matches!(cmd, Commands::Cat { .. }).then(|| {
                h.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });
        reg.register(|_| Some(Err(anyhow::anyhow!("fallback"))));

        reg.dispatch(&Commands::Cat { path: "x".into() }).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(reg.dispatch(&Commands::Ls { path: String::new() }).is_err());
    }

    #[test]
    fn test_unhandled_command_is_an_error() {
        let reg = CommandRegistry::new();
        assert!(reg.dispatch(&Commands::Serve { stdio: false }).is_err());
    }
}
