//! Per-invocation database connections.
//!
//! No pool is kept: [`SqlConnector`] opens a new connection for every
//! acquisition and closes it on release.

use crate::db::scope::Connector;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, DatabaseType};
use sqlx::mysql::MySqlConnection;
use sqlx::postgres::PgConnection;
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use tracing::debug;

/// A live connection to one of the supported databases.
pub enum DbConnection {
    MySql(MySqlConnection),
    Postgres(PgConnection),
    SQLite(SqliteConnection),
}

impl DbConnection {
    pub fn db_type(&self) -> DatabaseType {
        match self {
            Self::MySql(_) => DatabaseType::MySQL,
            Self::Postgres(_) => DatabaseType::PostgreSQL,
            Self::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Gracefully close the connection.
    pub async fn close(self) -> DbResult<()> {
        match self {
            Self::MySql(conn) => conn.close().await?,
            Self::Postgres(conn) => conn.close().await?,
            Self::SQLite(conn) => conn.close().await?,
        }
        Ok(())
    }
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DbConnection({})", self.db_type())
    }
}

/// Opens connections from a fixed configuration.
#[derive(Debug, Clone)]
pub struct SqlConnector {
    config: ConnectionConfig,
}

impl SqlConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

impl Connector for SqlConnector {
    type Handle = DbConnection;

    async fn acquire(&self) -> DbResult<DbConnection> {
        let url = self.config.connection_string.as_str();
        debug!(
            db_type = %self.config.db_type,
            url = %self.config.masked_connection_string(),
            "Opening database connection"
        );

        let connection = match self.config.db_type {
            DatabaseType::MySQL => MySqlConnection::connect(url).await.map(DbConnection::MySql),
            DatabaseType::PostgreSQL => PgConnection::connect(url).await.map(DbConnection::Postgres),
            DatabaseType::SQLite => SqliteConnection::connect(url).await.map(DbConnection::SQLite),
        };

        connection.map_err(|e| {
            DbError::connection(
                e.to_string(),
                "Check that the database server is reachable and the credentials are correct",
            )
        })
    }

    async fn release(&self, handle: DbConnection) -> DbResult<()> {
        handle.close().await
    }
}
