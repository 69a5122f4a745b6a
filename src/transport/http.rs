//! HTTP transport with session-aware Streamable HTTP.
//!
//! One endpoint answers three methods:
//! - `POST` carries a JSON-RPC message. An `initialize` request without a
//!   session header opens a session; everything else must name a live one
//!   in `Mcp-Session-Id`.
//! - `GET` opens a Server-Sent Events stream for a live session. It carries
//!   keep-alives only and ends when the session closes.
//! - `DELETE` closes a live session.

use crate::error::{DbError, DbResult, ProtocolError};
use crate::mcp::{Framing, JsonRpcResponse, Message, ToolDispatcher, decode, encode};
use crate::session::{SessionBinding, SessionRegistry};
use crate::transport::{Transport, wait_for_signal};
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use futures_util::stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const SESSION_HEADER: &str = "mcp-session-id";

const EVENT_STREAM: &str = "text/event-stream";
const APPLICATION_JSON: &str = "application/json";
const INVALID_SESSION_TEXT: &str = "Invalid or missing session ID";

/// Shared state of the HTTP router.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ToolDispatcher>,
    pub sessions: Arc<SessionRegistry>,
}

/// Build the router serving `endpoint`.
pub fn router(state: AppState, endpoint: &str) -> Router {
    Router::new()
        .route(
            endpoint,
            post(handle_post).get(handle_get).delete(handle_delete),
        )
        .with_state(state)
}

/// How a POST response body is framed, chosen from the `Accept` header.
fn negotiate(headers: &HeaderMap) -> Result<Framing, ProtocolError> {
    let accept = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .collect::<Vec<_>>();

    if accept.is_empty()
        || accept
            .iter()
            .any(|v| v == EVENT_STREAM || v == "*/*" || v == "text/*")
    {
        Ok(Framing::Sse)
    } else if accept
        .iter()
        .any(|v| v == APPLICATION_JSON || v == "application/*")
    {
        Ok(Framing::Json)
    } else {
        Err(ProtocolError::NotAcceptable)
    }
}

fn session_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// JSON-RPC error body with a null id.
fn protocol_rejection(status: StatusCode, error: ProtocolError) -> Response {
    let response = JsonRpcResponse::error(None, error.into());
    match encode(&response, Framing::Json) {
        Ok(body) => (status, [(CONTENT_TYPE, APPLICATION_JSON)], body).into_response(),
        Err(e) => internal_error(e),
    }
}

fn invalid_session() -> Response {
    (StatusCode::BAD_REQUEST, INVALID_SESSION_TEXT).into_response()
}

fn internal_error(e: ProtocolError) -> Response {
    error!(error = %e, "Failed to build response");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

fn framed_response(response: &JsonRpcResponse, framing: Framing) -> Response {
    let body = match encode(response, framing) {
        Ok(body) => body,
        Err(e) => return internal_error(e),
    };
    match framing {
        Framing::Sse => (
            StatusCode::OK,
            [(CONTENT_TYPE, EVENT_STREAM), (CACHE_CONTROL, "no-cache")],
            body,
        )
            .into_response(),
        Framing::Json | Framing::Line => {
            (StatusCode::OK, [(CONTENT_TYPE, APPLICATION_JSON)], body).into_response()
        }
    }
}

async fn handle_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let message = match decode(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Rejecting undecodable POST body");
            return protocol_rejection(StatusCode::BAD_REQUEST, e);
        }
    };

    // Session rules come before content negotiation: a request without a
    // live session is always a 400.
    let existing = match (session_id(&headers), message.is_initialize()) {
        (Some(id), _) => match state.sessions.lookup(id).await {
            Some(binding) => Some(binding),
            None => {
                debug!(session_id = %id, "Unknown session");
                return protocol_rejection(StatusCode::BAD_REQUEST, ProtocolError::NoValidSession);
            }
        },
        (None, true) => None,
        (None, false) => {
            return protocol_rejection(StatusCode::BAD_REQUEST, ProtocolError::NoValidSession);
        }
    };

    let framing = match negotiate(&headers) {
        Ok(framing) => framing,
        Err(e) => return protocol_rejection(StatusCode::NOT_ACCEPTABLE, e),
    };

    let (binding, created) = match existing {
        Some(binding) => (binding, false),
        None => (state.sessions.create().await, true),
    };

    let request = match message {
        Message::Request(request) => request,
        other => {
            state.dispatcher.handle_message(other).await;
            return StatusCode::ACCEPTED.into_response();
        }
    };

    binding.record_request();
    let response = state.dispatcher.handle_request(request).await;

    if created && response.is_error() {
        // A session whose initialize failed must not stay usable
        state.sessions.remove(binding.id()).await;
        return framed_response(&response, framing);
    }

    let mut http_response = framed_response(&response, framing);
    if created {
        match HeaderValue::from_str(binding.id()) {
            Ok(value) => {
                http_response.headers_mut().insert(SESSION_HEADER, value);
            }
            Err(e) => {
                state.sessions.remove(binding.id()).await;
                return internal_error(ProtocolError::internal(e.to_string()));
            }
        }
    }
    http_response
}

async fn handle_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(binding) = lookup(&state, &headers).await else {
        return invalid_session();
    };
    if !accepts_event_stream(&headers) {
        return protocol_rejection(StatusCode::NOT_ACCEPTABLE, ProtocolError::NotAcceptable);
    }
    debug!(session_id = %binding.id(), "Opening event stream");
    Sse::new(session_events(binding.subscribe_close()))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response()
}

async fn handle_delete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match session_id(&headers) {
        Some(id) if state.sessions.remove(id).await => StatusCode::OK.into_response(),
        _ => invalid_session(),
    }
}

async fn lookup(state: &AppState, headers: &HeaderMap) -> Option<Arc<SessionBinding>> {
    let id = session_id(headers)?;
    state.sessions.lookup(id).await
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    matches!(negotiate(headers), Ok(Framing::Sse))
}

/// Event stream that yields nothing and ends once the session closes.
fn session_events(
    closed: watch::Receiver<bool>,
) -> impl futures_util::Stream<Item = Result<Event, Infallible>> + Send {
    stream::unfold(closed, |mut closed| async move {
        // Both outcomes (closed, or sender dropped) end the stream
        let _ = closed.wait_for(|closed| *closed).await;
        None::<(Result<Event, Infallible>, watch::Receiver<bool>)>
    })
}

/// HTTP transport implementation.
pub struct HttpTransport {
    dispatcher: Arc<ToolDispatcher>,
    sessions: Arc<SessionRegistry>,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
    /// MCP endpoint path
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        dispatcher: Arc<ToolDispatcher>,
        sessions: Arc<SessionRegistry>,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            dispatcher,
            sessions,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn router(&self) -> Router {
        router(
            AppState {
                dispatcher: self.dispatcher.clone(),
                sessions: self.sessions.clone(),
            },
            &self.endpoint,
        )
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting MCP server with HTTP transport on {}", bind_addr);

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available",
            )
        })?;

        info!(endpoint = %self.endpoint, "MCP endpoint ready");

        const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(10);

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();
        let sessions = self.sessions.clone();

        // Closing the sessions ends their event streams so shutdown can finish
        let shutdown_signal = async move {
            wait_for_signal().await;
            sessions.close_all().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, self.router()).with_graceful_shutdown(shutdown_signal);

        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        return Err(DbError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );
                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        self.sessions.close_all().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(accept: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(accept) = accept {
            headers.insert(ACCEPT, HeaderValue::from_str(accept).unwrap());
        }
        headers
    }

    #[test]
    fn test_negotiate_accept() {
        assert_eq!(negotiate(&headers(None)), Ok(Framing::Sse));
        assert_eq!(
            negotiate(&headers(Some("application/json, text/event-stream"))),
            Ok(Framing::Sse)
        );
        assert_eq!(
            negotiate(&headers(Some("application/json"))),
            Ok(Framing::Json)
        );
        assert_eq!(negotiate(&headers(Some("*/*;q=0.8"))), Ok(Framing::Sse));
        assert_eq!(
            negotiate(&headers(Some("text/html"))),
            Err(ProtocolError::NotAcceptable)
        );
    }

    #[test]
    fn test_session_id_ignores_empty_header() {
        let mut map = HeaderMap::new();
        map.insert(SESSION_HEADER, HeaderValue::from_static(""));
        assert_eq!(session_id(&map), None);
        map.insert(SESSION_HEADER, HeaderValue::from_static("abc"));
        assert_eq!(session_id(&map), Some("abc"));
    }

    #[tokio::test]
    async fn test_session_events_end_on_close() {
        use futures_util::StreamExt;

        let binding = SessionBinding::new("s");
        let events = session_events(binding.subscribe_close());
        binding.close();
        let collected: Vec<_> = events.collect().await;
        assert!(collected.is_empty());
    }
}
