//! SQL MCP Server Library
//!
//! This library exposes a SQL database (SQLite, PostgreSQL, MySQL) to MCP
//! (Model Context Protocol) clients through three tools: `execute_sql_query`,
//! `list_tables` and `describe_table`. Requests arrive over stdio or over a
//! session-aware HTTP endpoint answering with Server-Sent Events.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod session;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::ToolDispatcher;
