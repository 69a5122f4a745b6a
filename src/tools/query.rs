//! The `execute_sql_query` tool.

use crate::db::executor;
use crate::db::DbConnection;
use crate::error::{DbError, DbResult};
use crate::models::{QueryOutcome, QueryParam, SqlParameter};
use crate::tools::sql_classifier::{ExecutionMode, execution_mode};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

/// Input for the execute_sql_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteSqlQueryInput {
    /// The SQL query to execute
    pub query: String,
    /// Optional parameters for prepared statements
    #[serde(default)]
    pub parameters: Option<Vec<SqlParameter>>,
}

/// A validated statement with its parameters converted for binding.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl TryFrom<ExecuteSqlQueryInput> for PreparedQuery {
    type Error = DbError;

    fn try_from(input: ExecuteSqlQueryInput) -> DbResult<Self> {
        if input.query.trim().is_empty() {
            return Err(DbError::invalid_input("query must not be empty"));
        }
        let params = input
            .parameters
            .unwrap_or_default()
            .iter()
            .map(SqlParameter::to_query_param)
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::invalid_input)?;
        Ok(Self {
            sql: input.query,
            params,
        })
    }
}

/// Run the statement on `conn`.
pub async fn execute_sql_query(
    conn: &mut DbConnection,
    query: &PreparedQuery,
) -> DbResult<QueryOutcome> {
    let outcome = match execution_mode(&query.sql, conn.db_type()) {
        ExecutionMode::Rows => {
            let rows = executor::fetch_rows(conn, &query.sql, &query.params).await?;
            QueryOutcome::from_rows(rows)
        }
        ExecutionMode::Affected => {
            let affected = executor::execute(conn, &query.sql, &query.params).await?;
            QueryOutcome::from_affected(affected)
        }
    };
    info!(rows_affected = ?outcome.rows_affected, "SQL query executed successfully");
    Ok(outcome)
}
