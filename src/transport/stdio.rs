//! Stdio transport.
//!
//! JSON-RPC requests arrive on stdin and responses leave on stdout, so
//! nothing else may write to stdout while this transport runs.

use crate::db::ConnectionRegistry;
use crate::error::{DbError, DbResult};
use crate::mcp::TabularService;
use crate::transport::{Transport, shutdown_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tracing::{info, warn};

pub struct StdioTransport {
    registry: Arc<ConnectionRegistry>,
}

impl StdioTransport {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        let running = TabularService::new(self.registry.clone())
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Failed to start stdio transport: {}", e)))?;
        info!("Serving MCP over stdio");

        let signalled = tokio::select! {
            finished = running.waiting() => {
                if let Err(e) = finished {
                    warn!(error = %e, "Stdio session ended with an error");
                    self.registry.close_all().await;
                    return Err(DbError::internal(format!("Stdio transport failed: {}", e)));
                }
                info!("Client closed stdin");
                false
            }
            _ = shutdown_signal() => true,
        };

        if signalled {
            tokio::spawn(async {
                shutdown_signal().await;
                warn!("Second signal, exiting without cleanup");
                std::process::exit(1);
            });
        }

        self.registry.close_all().await;

        if signalled {
            // A pending stdin read keeps the runtime alive
            std::process::exit(0);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
