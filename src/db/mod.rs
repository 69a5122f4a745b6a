//! Database access layer.
//!
//! - `scope`: acquire/use/release of one handle per tool call
//! - `connection`: per-call connections for MySQL, PostgreSQL and SQLite
//! - `executor`: statement execution on a single connection
//! - `params`: positional parameter binding
//! - `types`: row to JSON conversion

pub mod connection;
pub mod executor;
pub mod params;
pub mod scope;
pub mod types;

pub use connection::{DbConnection, SqlConnector};
pub use scope::{Connector, ResourceScope, ScopeLimits};
