//! Data models for the SQL MCP Server.

pub mod connection;
pub mod query;

pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType};
pub use query::{QueryOutcome, QueryParam, SqlParamType, SqlParameter};
