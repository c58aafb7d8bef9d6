//! Tabular MCP Server - Main entry point.
//!
//! This server provides MCP (Model Context Protocol) tools for AI assistants
//! to manage SQLite databases, CSV import/export and file notes.

use clap::Parser;
use std::sync::Arc;
use tabular_mcp_server::config::{Config, TransportMode};
use tabular_mcp_server::db::ConnectionRegistry;
use tabular_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    info!(
        transport = %config.transport,
        "Starting Tabular MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Some(template) = &config.template {
        if !template.is_file() {
            error!(template = %template.display(), "Template database not found");
            return Err(format!("Template file not found: {}", template.display()).into());
        }
    }

    let registry = Arc::new(ConnectionRegistry::with_options(config.registry_options()));

    let specs = config.parse_databases()?;
    if !specs.is_empty() {
        info!(count = specs.len(), "Opening preconfigured databases");
    }
    for spec in &specs {
        if let Err(e) = registry.connect(&spec.id, spec.path.as_deref()).await {
            error!(id = %spec.id, error = %e, "Failed to open preconfigured database");
            registry.close_all().await;
            return Err(e.into());
        }
    }

    let result = match config.transport {
        TransportMode::Stdio => {
            let transport = StdioTransport::new(registry);
            info!(transport = transport.name(), "Selected transport");
            transport.run().await
        }
        TransportMode::Http => {
            let transport =
                HttpTransport::new(registry, config.http_bind_addr(), &config.mcp_endpoint);
            info!(transport = transport.name(), addr = %transport.bind_addr(), "Selected transport");
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
