//! Streamable HTTP transport.

use crate::db::ConnectionRegistry;
use crate::error::{DbError, DbResult};
use crate::mcp::TabularService;
use crate::transport::{Transport, shutdown_signal};
use axum::Router;
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};

/// How long open sessions may keep the server alive after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Serves the MCP service at one endpoint path.
///
/// Every session gets its own `TabularService` over the same registry, so a
/// database opened by one client is visible to all of them.
pub struct HttpTransport {
    registry: Arc<ConnectionRegistry>,
    bind_addr: String,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        bind_addr: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            bind_addr: bind_addr.into(),
            endpoint: endpoint.into(),
        }
    }

    pub fn bind_addr(&self) -> &str {
        &self.bind_addr
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn router(&self) -> Router {
        let registry = self.registry.clone();
        let service = StreamableHttpService::new(
            move || Ok(TabularService::new(registry.clone())),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service panics on "/"
        match self.endpoint.as_str() {
            "" | "/" => Router::new().fallback_service(service),
            path => Router::new().nest_service(path, service),
        }
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let listener = TcpListener::bind(&self.bind_addr).await.map_err(|e| {
            DbError::connection(
                format!("Failed to bind {}: {}", self.bind_addr, e),
                "Choose a free port with --http-port or TABULAR_HTTP_PORT",
            )
        })?;
        info!(addr = %self.bind_addr, endpoint = %self.endpoint, "Serving MCP over HTTP");

        let stopping = Arc::new(Notify::new());
        let server = axum::serve(listener, self.router()).with_graceful_shutdown({
            let stopping = stopping.clone();
            async move {
                shutdown_signal().await;
                stopping.notify_one();
            }
        });

        let drain = async {
            stopping.notified().await;
            info!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "Draining HTTP sessions (signal again to stop now)"
            );
            tokio::select! {
                _ = tokio::time::sleep(SHUTDOWN_GRACE) => warn!("Sessions still open after grace period"),
                _ = shutdown_signal() => warn!("Second signal, stopping now"),
            }
        };

        let outcome = tokio::select! {
            served = server => served
                .map_err(|e| DbError::internal(format!("HTTP server failed: {}", e))),
            _ = drain => Ok(()),
        };

        self.registry.close_all().await;
        outcome
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
