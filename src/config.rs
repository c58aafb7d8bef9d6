//! Configuration handling for the Tabular MCP Server.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::db::{DEFAULT_ACQUIRE_TIMEOUT_SECS, RegistryOptions};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";

/// Path value selecting an in-memory database in `--database`.
pub const MEMORY_PATH: &str = ":memory:";

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// A database opened at startup, parsed from `--database`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreconnectSpec {
    pub id: String,
    /// `None` for an in-memory database.
    pub path: Option<PathBuf>,
}

impl PreconnectSpec {
    /// Parse a database argument.
    ///
    /// Accepted forms:
    /// - `id=path` - Named database file
    /// - `id=:memory:` - Named in-memory database
    /// - `path` - Database file named after its file stem
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Database argument cannot be empty".to_string());
        }

        let (id, path) = match s.split_once('=') {
            Some((id, path)) => {
                let id = id.trim();
                let path = path.trim();
                if id.is_empty() {
                    return Err(format!("Missing id in '{s}'"));
                }
                if path.is_empty() {
                    return Err(format!("Missing path in '{s}'"));
                }
                (id.to_string(), path)
            }
            None => {
                if s == MEMORY_PATH {
                    return Err(format!(
                        "An in-memory database needs an id, e.g. scratch={MEMORY_PATH}"
                    ));
                }
                let id = Path::new(s)
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .filter(|stem| !stem.is_empty())
                    .ok_or_else(|| format!("Cannot derive an id from '{s}'"))?;
                (id.to_string(), s)
            }
        };

        let path = (path != MEMORY_PATH).then(|| PathBuf::from(path));
        Ok(Self { id, path })
    }
}

/// Configuration for the Tabular MCP Server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tabular-mcp-server",
    about = "MCP server for SQLite databases, CSV import/export and file notes",
    version,
    author
)]
pub struct Config {
    /// Databases to open at startup.
    /// Format: "path", "id=path" or "id=:memory:".
    /// Can be specified multiple times.
    #[arg(
        short = 'd',
        long = "database",
        value_name = "SPEC",
        env = "TABULAR_DATABASE",
        value_delimiter = ','
    )]
    pub databases: Vec<String>,

    /// Database file copied by the create tool instead of starting from an empty file
    #[arg(long, value_name = "FILE", env = "TABULAR_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "TABULAR_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "TABULAR_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "TABULAR_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "TABULAR_MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Seconds to wait for a database connection to become available
    #[arg(
        long,
        default_value_t = DEFAULT_ACQUIRE_TIMEOUT_SECS,
        env = "TABULAR_ACQUIRE_TIMEOUT"
    )]
    pub acquire_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "TABULAR_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "TABULAR_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            databases: Vec::new(),
            template: None,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Parse all `--database` arguments.
    pub fn parse_databases(&self) -> Result<Vec<PreconnectSpec>, String> {
        let specs = self
            .databases
            .iter()
            .map(|s| PreconnectSpec::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        let mut ids: Vec<&str> = specs.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(format!("Database id '{}' is given more than once", pair[0]));
        }
        Ok(specs)
    }

    /// Options for the connection registry.
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            template: self.template.clone(),
            acquire_timeout: self.acquire_timeout_duration(),
        }
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn acquire_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
