//! Decide how a caller-supplied statement should be executed.
//!
//! Statements that produce a result set are fetched; everything else is
//! executed for its affected-row count. The SQL is parsed with the dialect
//! of the configured database.

use crate::models::DatabaseType;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

/// How a statement is sent to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Fetch and return rows
    Rows,
    /// Execute and report affected rows
    Affected,
}

fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Classify `sql` for execution.
///
/// Unparseable SQL (vendor extensions the parser does not know) is fetched,
/// so the database gets the final word and any rows it produces are kept.
pub fn execution_mode(sql: &str, db_type: DatabaseType) -> ExecutionMode {
    let dialect = get_dialect(db_type);
    match Parser::parse_sql(dialect.as_ref(), sql) {
        Ok(statements) if !statements.is_empty() => {
            if statements.iter().any(returns_rows) {
                ExecutionMode::Rows
            } else {
                ExecutionMode::Affected
            }
        }
        Ok(_) => ExecutionMode::Affected,
        Err(e) => {
            tracing::debug!(error = %e, "Could not parse statement, fetching rows");
            ExecutionMode::Rows
        }
    }
}

fn returns_rows(stmt: &Statement) -> bool {
    match stmt {
        Statement::Query(_)
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowSchemas { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. }
        | Statement::ExplainTable { .. }
        | Statement::Explain { .. }
        | Statement::Pragma { .. } => true,
        Statement::Insert(insert) => insert.returning.is_some(),
        Statement::Update(update) => update.returning.is_some(),
        Statement::Delete(delete) => delete.returning.is_some(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_fetches_rows() {
        assert_eq!(
            execution_mode("SELECT * FROM users WHERE id = ?", DatabaseType::SQLite),
            ExecutionMode::Rows
        );
        assert_eq!(
            execution_mode(
                "WITH t AS (SELECT 1 AS x) SELECT x FROM t",
                DatabaseType::PostgreSQL
            ),
            ExecutionMode::Rows
        );
    }

    #[test]
    fn test_writes_report_affected() {
        assert_eq!(
            execution_mode("INSERT INTO users (name) VALUES ('a')", DatabaseType::MySQL),
            ExecutionMode::Affected
        );
        assert_eq!(
            execution_mode("UPDATE users SET name = 'b'", DatabaseType::SQLite),
            ExecutionMode::Affected
        );
        assert_eq!(
            execution_mode("CREATE TABLE t (id INT)", DatabaseType::PostgreSQL),
            ExecutionMode::Affected
        );
    }

    #[test]
    fn test_returning_fetches_rows() {
        assert_eq!(
            execution_mode(
                "INSERT INTO users (name) VALUES ('a') RETURNING id",
                DatabaseType::PostgreSQL
            ),
            ExecutionMode::Rows
        );
        assert_eq!(
            execution_mode(
                "UPDATE t SET n = 'b' WHERE id = 1 RETURNING id, n",
                DatabaseType::SQLite
            ),
            ExecutionMode::Rows
        );
        assert_eq!(
            execution_mode(
                "DELETE FROM t WHERE id = 1 RETURNING id",
                DatabaseType::PostgreSQL
            ),
            ExecutionMode::Rows
        );
    }

    #[test]
    fn test_show_and_pragma_fetch_rows() {
        assert_eq!(
            execution_mode("SHOW TABLES", DatabaseType::MySQL),
            ExecutionMode::Rows
        );
        assert_eq!(
            execution_mode("PRAGMA table_info(users)", DatabaseType::SQLite),
            ExecutionMode::Rows
        );
    }

    #[test]
    fn test_unparseable_sql_fetches_rows() {
        assert_eq!(
            execution_mode("SELEKT nonsense", DatabaseType::PostgreSQL),
            ExecutionMode::Rows
        );
    }
}
