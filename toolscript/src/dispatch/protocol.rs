//! Protocol commands: Serve

use crate::cli::Commands;
use crate::command_registry::CommandRegistry;
use crate::protocol::{ProtocolHandler, ProtocolParams, StdioRpcHandler};

pub fn register(reg: &mut CommandRegistry) {
    reg.register(|cmd| {
        if let Commands::Serve { stdio } = cmd {
            if *stdio {
                Some(StdioRpcHandler.serve(ProtocolParams::Stdio))
            } else {
                Some(Err(anyhow::anyhow!("serve requires a transport: use --stdio")))
            }
        } else {
            None
        }
    });
}
