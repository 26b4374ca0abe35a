//! ProtocolHandler: entry point for every external-facing transport.
//!
//! Adding a transport:
//! 1. add a variant to [`ProtocolParams`]
//! 2. implement [`ProtocolHandler`] for a handler struct
//! 3. route a `Commands` variant to it from `dispatch::protocol`

use anyhow::Result;

use crate::stdio_rpc;

/// Parameters for protocol handlers, one variant per transport.
#[derive(Debug)]
pub enum ProtocolParams {
    /// JSON-RPC 2.0 over stdin/stdout (`toolscript serve --stdio`)
    Stdio,
}

pub trait ProtocolHandler: Send + Sync {
    /// Protocol name used in log output.
    fn name(&self) -> &str;

    /// Start the server. Blocks until the transport closes.
    fn serve(&self, params: ProtocolParams) -> Result<()>;
}

/// Stdio JSON-RPC 2.0 handler.
pub struct StdioRpcHandler;

impl ProtocolHandler for StdioRpcHandler {
    fn name(&self) -> &str {
        "stdio-rpc"
    }

    fn serve(&self, params: ProtocolParams) -> Result<()> {
        match params {
            ProtocolParams::Stdio => {
                tracing::info!(protocol = self.name(), "serving");
                stdio_rpc::serve_stdio()
            }
        }
    }
}
