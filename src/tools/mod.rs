//! MCP tool implementations.
//!
//! This module contains the tool catalogue and the database tool handlers:
//! - `execute_sql_query`: Run an arbitrary statement with typed parameters
//! - `list_tables`: List tables in the database
//! - `describe_table`: Get column information for a table
//!
//! A call is resolved and its arguments validated by [`ToolCall::prepare`]
//! before any connection is opened; [`ToolCall::run`] then executes it on a
//! connection lent by the caller.

pub mod query;
pub mod schema;
pub mod sql_classifier;

pub use query::{ExecuteSqlQueryInput, PreparedQuery};
pub use schema::{DescribeTableInput, ListTablesInput, TableName};

use crate::db::DbConnection;
use crate::error::{DbError, DbResult};
use rmcp::model::{JsonObject, Tool};
use schemars::JsonSchema;
use schemars::generate::SchemaSettings;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::{Arc, LazyLock};

/// The tools this server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ExecuteSqlQuery,
    ListTables,
    DescribeTable,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::ExecuteSqlQuery,
        ToolKind::ListTables,
        ToolKind::DescribeTable,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ExecuteSqlQuery => "execute_sql_query",
            Self::ListTables => "list_tables",
            Self::DescribeTable => "describe_table",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ExecuteSqlQuery => "Execute a SQL query against the configured database",
            Self::ListTables => "List all tables in the database",
            Self::DescribeTable => "Get the schema information for a specific table",
        }
    }

    /// Prefix for failures of this tool in the returned text.
    pub fn failure_context(&self) -> &'static str {
        match self {
            Self::ExecuteSqlQuery => "SQL execution failed",
            Self::ListTables => "Failed to list tables",
            Self::DescribeTable => "Failed to describe table",
        }
    }

    fn input_schema(&self) -> Arc<JsonObject> {
        match self {
            Self::ExecuteSqlQuery => input_schema::<ExecuteSqlQueryInput>(),
            Self::ListTables => input_schema::<ListTablesInput>(),
            Self::DescribeTable => input_schema::<DescribeTableInput>(),
        }
    }

    pub fn descriptor(&self) -> Tool {
        Tool::new(self.name(), self.description(), self.input_schema())
    }
}

static CATALOGUE: LazyLock<Vec<Tool>> =
    LazyLock::new(|| ToolKind::ALL.iter().map(ToolKind::descriptor).collect());

/// Descriptors of every tool, in a stable order.
pub fn catalogue() -> &'static [Tool] {
    &CATALOGUE
}

/// JSON Schema for a tool input type, with subschemas inlined and the
/// generator's `$schema`/`title` keys removed.
fn input_schema<T: JsonSchema>() -> Arc<JsonObject> {
    let mut settings = SchemaSettings::draft07();
    settings.inline_subschemas = true;
    let schema = settings.into_generator().into_root_schema_for::<T>();

    let mut object = match serde_json::to_value(schema) {
        Ok(JsonValue::Object(object)) => object,
        _ => JsonObject::new(),
    };
    object.remove("$schema");
    object.remove("title");
    object
        .entry("type")
        .or_insert_with(|| JsonValue::String("object".to_string()));
    object
        .entry("properties")
        .or_insert_with(|| JsonValue::Object(JsonObject::new()));
    Arc::new(object)
}

/// A resolved tool call with validated arguments.
#[derive(Debug, Clone)]
pub enum ToolCall {
    ExecuteSqlQuery(PreparedQuery),
    ListTables,
    DescribeTable(TableName),
}

fn parse_args<T: DeserializeOwned>(arguments: Option<JsonObject>) -> DbResult<T> {
    let value = JsonValue::Object(arguments.unwrap_or_default());
    serde_json::from_value(value).map_err(|e| DbError::invalid_input(e.to_string()))
}

impl ToolCall {
    /// Validate `arguments` for `kind`.
    pub fn prepare(kind: ToolKind, arguments: Option<JsonObject>) -> DbResult<Self> {
        match kind {
            ToolKind::ExecuteSqlQuery => {
                let input: ExecuteSqlQueryInput = parse_args(arguments)?;
                Ok(Self::ExecuteSqlQuery(PreparedQuery::try_from(input)?))
            }
            ToolKind::ListTables => {
                let _: ListTablesInput = parse_args(arguments)?;
                Ok(Self::ListTables)
            }
            ToolKind::DescribeTable => {
                let input: DescribeTableInput = parse_args(arguments)?;
                Ok(Self::DescribeTable(TableName::try_from(input)?))
            }
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Self::ExecuteSqlQuery(_) => ToolKind::ExecuteSqlQuery,
            Self::ListTables => ToolKind::ListTables,
            Self::DescribeTable(_) => ToolKind::DescribeTable,
        }
    }

    /// Execute on `conn` and render the result as pretty-printed JSON.
    pub async fn run(self, conn: &mut DbConnection) -> DbResult<String> {
        let rendered = match self {
            Self::ExecuteSqlQuery(query) => {
                let outcome = query::execute_sql_query(conn, &query).await?;
                serde_json::to_string_pretty(&outcome)
            }
            Self::ListTables => serde_json::to_string_pretty(&schema::list_tables(conn).await?),
            Self::DescribeTable(table) => {
                serde_json::to_string_pretty(&schema::describe_table(conn, &table).await?)
            }
        };
        rendered.map_err(|e| DbError::internal(format!("Failed to serialize result: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_of(kind: ToolKind) -> JsonValue {
        JsonValue::Object(kind.descriptor().input_schema.as_ref().clone())
    }

    #[test]
    fn test_catalogue_lists_three_tools_in_order() {
        let names: Vec<_> = catalogue().iter().map(|t| t.name.to_string()).collect();
        assert_eq!(names, vec!["execute_sql_query", "list_tables", "describe_table"]);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            ToolKind::from_name("describe_table"),
            Some(ToolKind::DescribeTable)
        );
        assert_eq!(ToolKind::from_name("drop_database"), None);
    }

    #[test]
    fn test_schemas_declare_required_fields() {
        let schema = schema_of(ToolKind::ExecuteSqlQuery);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["query"]));
        assert!(schema["properties"]["parameters"].is_object());
        assert!(schema.get("$schema").is_none());

        let schema = schema_of(ToolKind::DescribeTable);
        assert_eq!(schema["required"], json!(["table_name"]));

        let schema = schema_of(ToolKind::ListTables);
        assert_eq!(schema["properties"], json!({}));
    }

    #[test]
    fn test_prepare_validates_arguments() {
        let err = ToolCall::prepare(ToolKind::DescribeTable, None).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));

        let mut args = JsonObject::new();
        args.insert("table_name".to_string(), json!("users"));
        let call = ToolCall::prepare(ToolKind::DescribeTable, Some(args)).unwrap();
        assert_eq!(call.kind(), ToolKind::DescribeTable);

        let mut args = JsonObject::new();
        args.insert("table_name".to_string(), json!("  "));
        let err = ToolCall::prepare(ToolKind::DescribeTable, Some(args)).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));

        let call = ToolCall::prepare(ToolKind::ListTables, None).unwrap();
        assert_eq!(call.kind(), ToolKind::ListTables);
    }
}
