use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sql_mcp_server::db::{ScopeLimits, SqlConnector};
use sql_mcp_server::mcp::{ToolDispatcher, decode_sse};
use sql_mcp_server::models::ConnectionConfig;
use sql_mcp_server::session::SessionRegistry;
use sql_mcp_server::transport::http::{AppState, router};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const ENDPOINT: &str = "/mcp";

struct Harness {
    app: Router,
    sessions: Arc<SessionRegistry>,
    _dir: TempDir,
}

/// Router backed by a SQLite file that does not exist, so every tool call
/// fails to connect.
fn unreachable_harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("db.sqlite");
    let config = ConnectionConfig::parse(format!("sqlite:{}", path.display())).unwrap();
    let dispatcher = Arc::new(ToolDispatcher::new(
        SqlConnector::new(config),
        ScopeLimits::default(),
    ));
    let sessions = Arc::new(SessionRegistry::new());
    let app = router(
        AppState {
            dispatcher,
            sessions: sessions.clone(),
        },
        ENDPOINT,
    );
    Harness {
        app,
        sessions,
        _dir: dir,
    }
}

fn post(session: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(ENDPOINT)
        .header("content-type", "application/json")
        .header("accept", "application/json, text/event-stream");
    if let Some(session) = session {
        builder = builder.header("mcp-session-id", session);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare(method: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(ENDPOINT);
    if let Some(session) = session {
        builder = builder.header("mcp-session-id", session);
    }
    builder.body(Body::empty()).unwrap()
}

fn initialize_body(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "http-test", "version": "1.0"}
        }
    })
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn initialize(app: &Router) -> String {
    let response = app.clone().oneshot(post(None, initialize_body(1))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response
        .headers()
        .get("mcp-session-id")
        .expect("initialize must return a session id")
        .to_str()
        .unwrap()
        .to_string()
}

fn bad_request_envelope() -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": {"code": -32000, "message": "Bad Request: No valid session ID provided"},
        "id": null
    })
}

#[tokio::test]
async fn test_initialize_then_list_tools() {
    let harness = unreachable_harness();

    let response = harness
        .app
        .clone()
        .oneshot(post(None, initialize_body(1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    let session = response
        .headers()
        .get("mcp-session-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let init = decode_sse(&body_string(response).await).unwrap();
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["serverInfo"]["name"], "sql-mcp-server");
    assert_eq!(harness.sessions.len().await, 1);

    let response = harness
        .app
        .clone()
        .oneshot(post(
            Some(&session),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = decode_sse(&body_string(response).await).unwrap();
    assert_eq!(listed["id"], 2);
    let names: Vec<&str> = listed["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["execute_sql_query", "list_tables", "describe_table"]);
}

#[tokio::test]
async fn test_unreachable_database_is_reported_in_tool_result() {
    let harness = unreachable_harness();
    let session = initialize(&harness.app).await;

    let response = harness
        .app
        .clone()
        .oneshot(post(
            Some(&session),
            json!({
                "jsonrpc": "2.0",
                "id": "call-1",
                "method": "tools/call",
                "params": {"name": "list_tables", "arguments": {}}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = decode_sse(&body_string(response).await).unwrap();
    assert_eq!(body["id"], "call-1");
    assert_eq!(body["result"]["isError"], true);
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error:"), "unexpected text: {}", text);
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let harness = unreachable_harness();

    let response = harness
        .app
        .clone()
        .oneshot(post(
            Some("not-a-session"),
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, bad_request_envelope());
}

#[tokio::test]
async fn test_session_is_checked_before_accept_header() {
    let harness = unreachable_harness();

    for session in [Some("stale"), None] {
        let mut builder = Request::builder()
            .method("POST")
            .uri(ENDPOINT)
            .header("accept", "text/html");
        if let Some(session) = session {
            builder = builder.header("mcp-session-id", session);
        }
        let request = builder
            .body(Body::from(
                json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string(),
            ))
            .unwrap();

        let response = harness.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body, bad_request_envelope());
    }
}

#[tokio::test]
async fn test_missing_session_for_non_initialize_is_rejected() {
    let harness = unreachable_harness();

    let response = harness
        .app
        .clone()
        .oneshot(post(
            None,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, bad_request_envelope());
    assert!(harness.sessions.is_empty().await);
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let harness = unreachable_harness();

    let request = Request::builder()
        .method("POST")
        .uri(ENDPOINT)
        .header("accept", "text/event-stream")
        .body(Body::from("{not json"))
        .unwrap();
    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn test_json_only_client_gets_plain_json() {
    let harness = unreachable_harness();
    let session = initialize(&harness.app).await;

    let request = Request::builder()
        .method("POST")
        .uri(ENDPOINT)
        .header("accept", "application/json")
        .header("mcp-session-id", &session)
        .body(Body::from(
            json!({"jsonrpc": "2.0", "id": 7, "method": "ping"}).to_string(),
        ))
        .unwrap();
    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, json!({"jsonrpc": "2.0", "id": 7, "result": {}}));
}

#[tokio::test]
async fn test_unacceptable_accept_header() {
    let harness = unreachable_harness();

    let request = Request::builder()
        .method("POST")
        .uri(ENDPOINT)
        .header("accept", "text/html")
        .body(Body::from(initialize_body(1).to_string()))
        .unwrap();
    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    assert!(harness.sessions.is_empty().await);
}

#[tokio::test]
async fn test_notification_is_accepted_without_body() {
    let harness = unreachable_harness();
    let session = initialize(&harness.app).await;

    let response = harness
        .app
        .clone()
        .oneshot(post(
            Some(&session),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn test_delete_closes_session_once() {
    let harness = unreachable_harness();
    let session = initialize(&harness.app).await;

    let response = harness
        .app
        .clone()
        .oneshot(bare("DELETE", Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(harness.sessions.lookup(&session).await.is_none());

    let response = harness
        .app
        .clone()
        .oneshot(bare("DELETE", Some(&session)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "Invalid or missing session ID");

    // The closed session can no longer be used
    let response = harness
        .app
        .clone()
        .oneshot(post(
            Some(&session),
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_requires_live_session() {
    let harness = unreachable_harness();

    let response = harness.app.clone().oneshot(bare("GET", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "Invalid or missing session ID");

    let response = harness
        .app
        .clone()
        .oneshot(bare("GET", Some("stale")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_event_stream_ends_when_session_is_deleted() {
    let harness = unreachable_harness();
    let session = initialize(&harness.app).await;

    let request = Request::builder()
        .method("GET")
        .uri(ENDPOINT)
        .header("accept", "text/event-stream")
        .header("mcp-session-id", &session)
        .body(Body::empty())
        .unwrap();
    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    assert!(harness.sessions.remove(&session).await);
    let collected = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        response.into_body().collect(),
    )
    .await
    .expect("stream should end after the session closes")
    .unwrap();
    assert!(collected.to_bytes().is_empty());
}

#[tokio::test]
async fn test_concurrent_initializes_get_distinct_sessions() {
    let harness = unreachable_harness();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let app = harness.app.clone();
        handles.push(tokio::spawn(async move { initialize(&app).await }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }
    assert_eq!(ids.len(), 16);
    assert_eq!(harness.sessions.len().await, 16);
}
