//! Statement execution on a single connection.
//!
//! Two entry points exist: [`fetch_rows`] for statements that produce a
//! result set and [`execute`] for statements that only report affected rows.
//! Without parameters the SQL is sent as-is, which avoids prepared statement
//! restrictions on some DDL.

use crate::db::connection::DbConnection;
use crate::db::params::bind_params;
use crate::db::types::RowToJson;
use crate::error::DbResult;
use crate::models::QueryParam;
use serde_json::{Map, Value as JsonValue};
use sqlx::Executor;
use tracing::debug;

pub type JsonRow = Map<String, JsonValue>;

/// Expand `$body` once per backend with `$c` bound to the inner connection.
macro_rules! with_connection {
    ($conn:expr, $c:ident => $body:expr) => {
        match $conn {
            DbConnection::MySql($c) => $body,
            DbConnection::Postgres($c) => $body,
            DbConnection::SQLite($c) => $body,
        }
    };
}

/// Run a statement and convert every returned row to JSON.
pub async fn fetch_rows(
    conn: &mut DbConnection,
    sql: &str,
    params: &[QueryParam],
) -> DbResult<Vec<JsonRow>> {
    debug!(sql = %sql, params = params.len(), "Fetching rows");

    let rows = with_connection!(conn, c => {
        let rows = if params.is_empty() {
            c.fetch_all(sql).await?
        } else {
            bind_params(sqlx::query(sql), params).fetch_all(&mut *c).await?
        };
        rows.iter().map(RowToJson::to_json_map).collect::<Vec<_>>()
    });

    Ok(rows)
}

/// Run a statement and return the number of affected rows.
pub async fn execute(conn: &mut DbConnection, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
    debug!(sql = %sql, params = params.len(), "Executing statement");

    let rows_affected = with_connection!(conn, c => {
        if params.is_empty() {
            c.execute(sql).await?.rows_affected()
        } else {
            bind_params(sqlx::query(sql), params)
                .execute(&mut *c)
                .await?
                .rows_affected()
        }
    });

    Ok(rows_affected)
}
