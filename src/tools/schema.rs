//! Schema introspection tools.
//!
//! This module implements the `list_tables` and `describe_table` MCP tools.
//! Column names in the results follow INFORMATION_SCHEMA casing on every
//! database so clients see the same shape everywhere.

use crate::db::executor::{self, JsonRow};
use crate::db::DbConnection;
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, QueryParam};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

/// Input for the list_tables tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTablesInput {}

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// The name of the table to describe
    pub table_name: String,
}

/// A table name that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<DescribeTableInput> for TableName {
    type Error = DbError;

    fn try_from(input: DescribeTableInput) -> DbResult<Self> {
        if input.table_name.trim().is_empty() {
            return Err(DbError::invalid_input("table_name must not be empty"));
        }
        Ok(Self(input.table_name))
    }
}

fn list_tables_sql(db_type: DatabaseType) -> &'static str {
    match db_type {
        DatabaseType::PostgreSQL => {
            r#"SELECT table_name::text AS "TABLE_NAME"
               FROM information_schema.tables
               WHERE table_type = 'BASE TABLE'
                 AND table_schema NOT IN ('pg_catalog', 'information_schema')
               ORDER BY table_name"#
        }
        DatabaseType::MySQL => {
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_SCHEMA = DATABASE() \
             ORDER BY TABLE_NAME"
        }
        DatabaseType::SQLite => {
            "SELECT name AS TABLE_NAME FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name"
        }
    }
}

fn describe_table_sql(db_type: DatabaseType) -> &'static str {
    match db_type {
        DatabaseType::PostgreSQL => {
            r#"SELECT column_name::text AS "COLUMN_NAME",
                      data_type::text AS "DATA_TYPE",
                      character_maximum_length::int4 AS "CHARACTER_MAXIMUM_LENGTH"
               FROM information_schema.columns
               WHERE table_name = $1
                 AND table_schema NOT IN ('pg_catalog', 'information_schema')
               ORDER BY ordinal_position"#
        }
        DatabaseType::MySQL => {
            "SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_NAME = ? AND TABLE_SCHEMA = DATABASE() \
             ORDER BY ORDINAL_POSITION"
        }
        // SQLite has no length metadata; the declared type carries it, e.g. VARCHAR(50)
        DatabaseType::SQLite => {
            "SELECT name AS COLUMN_NAME, type AS DATA_TYPE, NULL AS CHARACTER_MAXIMUM_LENGTH \
             FROM pragma_table_info(?) \
             ORDER BY cid"
        }
    }
}

/// List the base tables of the connected database.
pub async fn list_tables(conn: &mut DbConnection) -> DbResult<Vec<JsonRow>> {
    let sql = list_tables_sql(conn.db_type());
    let tables = executor::fetch_rows(conn, sql, &[]).await?;
    info!(count = tables.len(), "Listed tables");
    Ok(tables)
}

/// Describe the columns of `table`. Unknown tables yield no rows.
pub async fn describe_table(conn: &mut DbConnection, table: &TableName) -> DbResult<Vec<JsonRow>> {
    let sql = describe_table_sql(conn.db_type());
    let params = [QueryParam::String(table.as_str().to_string())];
    let columns = executor::fetch_rows(conn, sql, &params).await?;
    info!(table = %table.as_str(), columns = columns.len(), "Described table");
    Ok(columns)
}
