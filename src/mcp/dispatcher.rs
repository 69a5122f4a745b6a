//! Protocol method routing and tool invocation.
//!
//! The dispatcher is stateless apart from its connector: every tool call runs
//! in its own [`ResourceScope`], so concurrent calls never share a connection.

use crate::db::{Connector, DbConnection, ResourceScope, ScopeLimits, SqlConnector};
use crate::error::{DbError, ProtocolError};
use crate::mcp::envelope::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Message,
};
use crate::tools::{ToolCall, ToolKind, catalogue};
use futures_util::FutureExt;
use rmcp::model::{
    CallToolResult, Content, Implementation, JsonObject, ProtocolVersion, ServerCapabilities,
    ServerInfo,
};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

pub const SERVER_NAME: &str = "sql-mcp-server";

pub struct ToolDispatcher<C = SqlConnector> {
    connector: C,
    limits: ScopeLimits,
}

impl<C> ToolDispatcher<C>
where
    C: Connector<Handle = DbConnection>,
{
    pub fn new(connector: C, limits: ScopeLimits) -> Self {
        Self { connector, limits }
    }

    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_owned(),
                title: Some("SQL MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "SQL database tools.\n\
                \n\
                - `list_tables` lists the tables of the configured database\n\
                - `describe_table` returns column names, types and maximum lengths\n\
                - `execute_sql_query` runs any statement; pass values through `parameters` \
                  (bound by position, typed as string, number, boolean or date) \
                  instead of splicing them into the SQL"
                    .to_owned(),
            ),
        }
    }

    /// Route any decoded message. Only requests produce a response.
    pub async fn handle_message(&self, message: Message) -> Option<JsonRpcResponse> {
        match message {
            Message::Request(request) => Some(self.handle_request(request).await),
            Message::Notification(notification) => {
                self.handle_notification(&notification);
                None
            }
            Message::Response(response) => {
                debug!(id = ?response.id, "Ignoring client response");
                None
            }
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(id = %request.id, method = %request.method, "Handling request");
        let id = request.id;
        let result = match request.method.as_str() {
            "initialize" => {
                let client = request
                    .params
                    .as_ref()
                    .and_then(|p| p.pointer("/clientInfo/name"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                info!(client = %client, "Client initializing");
                serde_json::to_value(self.server_info())
                    .map_err(|e| ProtocolError::internal(e.to_string()))
            }
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": catalogue() })),
            "tools/call" => match parse_call_params(request.params.as_ref()) {
                Ok((name, arguments)) => {
                    let result = self.invoke(&name, arguments).await;
                    serde_json::to_value(result).map_err(|e| ProtocolError::internal(e.to_string()))
                }
                Err(e) => Err(e),
            },
            other => Err(ProtocolError::method_not_found(other)),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => {
                warn!(id = %id, error = %e, "Request failed");
                JsonRpcResponse::error(Some(id), JsonRpcError::from(e))
            }
        }
    }

    pub fn handle_notification(&self, notification: &JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" => info!("Client initialized"),
            "notifications/cancelled" => debug!(params = ?notification.params, "Client cancelled a request"),
            other => debug!(method = %other, "Ignoring notification"),
        }
    }

    /// Invoke a tool by name. Failures are reported inside the tool result.
    pub async fn invoke(&self, name: &str, arguments: Option<JsonObject>) -> CallToolResult {
        let Some(kind) = ToolKind::from_name(name) else {
            warn!(tool = %name, "Unknown tool requested");
            return DbError::unknown_tool(name).to_tool_result(None);
        };

        let call = match ToolCall::prepare(kind, arguments) {
            Ok(call) => call,
            Err(e) => {
                warn!(tool = %name, error = %e, "Invalid tool arguments");
                return e.to_tool_result(Some(kind.failure_context()));
            }
        };

        info!(tool = %name, "Calling tool");
        let scope = ResourceScope::new(&self.connector, self.limits);
        match scope.with_resource(move |conn| call.run(conn).boxed()).await {
            Ok(text) => CallToolResult::success(vec![Content::text(text)]),
            Err(e) => {
                error!(tool = %name, error = %e, "Tool failed");
                e.to_tool_result(Some(kind.failure_context()))
            }
        }
    }
}

fn parse_call_params(params: Option<&Value>) -> Result<(String, Option<JsonObject>), ProtocolError> {
    let params = params
        .and_then(Value::as_object)
        .ok_or_else(|| ProtocolError::invalid_params("tools/call requires params"))?;
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::invalid_params("tools/call requires a tool name"))?;
    let arguments = match params.get("arguments") {
        None | Some(Value::Null) => None,
        Some(Value::Object(arguments)) => Some(arguments.clone()),
        Some(_) => {
            return Err(ProtocolError::invalid_params(
                "tool arguments must be an object",
            ));
        }
    };
    Ok((name.to_string(), arguments))
}
