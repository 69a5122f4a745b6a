//! Configuration handling for the SQL MCP Server.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::db::ScopeLimits;
use crate::models::ConnectionConfig;
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_MCP_ENDPOINT: &str = "/mcp";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Fallback variable consulted when `--database` / `MCP_DATABASE` is unset.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Session-aware HTTP with Server-Sent Events
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

/// Configuration for the SQL MCP Server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sql-mcp-server",
    about = "MCP server exposing SQL query tools over stdio or streamable HTTP",
    version
)]
pub struct Config {
    /// Database URL (postgres://, mysql://, sqlite:).
    /// Falls back to DATABASE_URL when unset.
    #[arg(short = 'd', long = "database", value_name = "URL", env = "MCP_DATABASE")]
    pub database: Option<String>,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "MCP_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "MCP_HTTP_PORT")]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(long, default_value = DEFAULT_MCP_ENDPOINT, env = "MCP_ENDPOINT")]
    pub mcp_endpoint: String,

    /// Query timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "MCP_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "MCP_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,

    /// Directory for combined.log and error.log
    #[arg(long, default_value = DEFAULT_LOG_DIR, env = "MCP_LOG_DIR")]
    pub log_dir: PathBuf,

    /// Disable log files
    #[arg(long, env = "MCP_NO_LOG_FILES")]
    pub no_log_files: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            database: None,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            log_level: "info".to_string(),
            json_logs: false,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            no_log_files: false,
        }
    }

    /// Resolve and validate the database configuration.
    ///
    /// `DATABASE_URL` is only read when no URL was given explicitly.
    pub fn connection_config(&self) -> Result<ConnectionConfig, String> {
        let url = self
            .database
            .clone()
            .or_else(|| std::env::var(DATABASE_URL_ENV).ok())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                format!(
                    "No database configured. Pass --database <URL> or set MCP_DATABASE or {}",
                    DATABASE_URL_ENV
                )
            })?;
        ConnectionConfig::parse(url).map_err(|e| e.to_string())
    }

    /// Validate settings that clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if !self.mcp_endpoint.starts_with('/') {
            return Err(format!(
                "MCP endpoint must start with '/': {}",
                self.mcp_endpoint
            ));
        }
        if self.connect_timeout == 0 || self.query_timeout == 0 {
            return Err("Timeouts must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Limits applied to every tool invocation.
    pub fn scope_limits(&self) -> ScopeLimits {
        ScopeLimits {
            acquire_timeout: self.connect_timeout_duration(),
            action_timeout: self.query_timeout_duration(),
        }
    }
}

/// Process exit code for a command-line parse failure.
///
/// `--help` and `--version` exit cleanly; every other failure is a startup
/// error and exits with 1.
pub fn parse_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
