//! Wire framing for both transports.
//!
//! Stdio carries one JSON message per line. HTTP responses carry exactly one
//! Server-Sent Events record (`event: message`, `data: <json>`).

use crate::error::ProtocolError;
use crate::mcp::envelope::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Message};
use serde::Serialize;
use serde_json::Value;

/// Framing flavor of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Newline-delimited JSON
    Line,
    /// One SSE record per message
    Sse,
    /// Bare JSON body
    Json,
}

/// Decode one JSON-RPC message.
///
/// The kind is decided by the fields present: `method` with a non-null `id`
/// is a request, `method` alone a notification, `result`/`error` a response.
pub fn decode(bytes: &[u8]) -> Result<Message, ProtocolError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::malformed(e.to_string()))?;

    let Value::Object(object) = &value else {
        return Err(ProtocolError::malformed("expected a JSON object"));
    };

    let has_id = object.get("id").is_some_and(|id| !id.is_null());

    if object.contains_key("method") {
        if has_id {
            serde_json::from_value::<JsonRpcRequest>(value)
                .map(Message::Request)
                .map_err(|e| ProtocolError::malformed(format!("invalid request: {}", e)))
        } else {
            serde_json::from_value::<JsonRpcNotification>(value)
                .map(Message::Notification)
                .map_err(|e| ProtocolError::malformed(format!("invalid notification: {}", e)))
        }
    } else if object.contains_key("result") || object.contains_key("error") {
        serde_json::from_value::<JsonRpcResponse>(value)
            .map(Message::Response)
            .map_err(|e| ProtocolError::malformed(format!("invalid response: {}", e)))
    } else {
        Err(ProtocolError::malformed(
            "message has no method, result or error",
        ))
    }
}

/// Encode a message with the given framing.
pub fn encode<T: Serialize>(message: &T, framing: Framing) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_string(message)
        .map_err(|e| ProtocolError::internal(format!("failed to encode message: {}", e)))?;
    let framed = match framing {
        Framing::Line => format!("{}\n", json),
        Framing::Sse => format!("event: message\ndata: {}\n\n", json),
        Framing::Json => json,
    };
    Ok(framed.into_bytes())
}

/// Extract the JSON payload of the first SSE record in `body`.
pub fn decode_sse(body: &str) -> Result<Value, ProtocolError> {
    let mut data = Vec::new();
    for line in body.lines() {
        if line.is_empty() && !data.is_empty() {
            break;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if data.is_empty() {
        return Err(ProtocolError::malformed("no data field in event stream"));
    }
    serde_json::from_str(&data.join("\n")).map_err(|e| ProtocolError::malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::envelope::RequestId;
    use serde_json::json;

    #[test]
    fn test_decode_request_notification_response() {
        let msg = decode(br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).unwrap();
        assert!(matches!(msg, Message::Request(ref r) if r.id == RequestId::Number(1.into())));

        let msg = decode(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(matches!(msg, Message::Notification(_)));

        let msg = decode(br#"{"jsonrpc":"2.0","id":"a","result":{}}"#).unwrap();
        assert!(matches!(msg, Message::Response(_)));
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        for input in [&b"not json"[..], b"[1,2]", br#"{"jsonrpc":"2.0","id":1}"#] {
            assert!(matches!(
                decode(input),
                Err(ProtocolError::MalformedFrame { .. })
            ));
        }
    }

    #[test]
    fn test_decode_rejects_non_scalar_id() {
        let result = decode(br#"{"jsonrpc":"2.0","id":{"x":1},"method":"ping"}"#);
        assert!(matches!(result, Err(ProtocolError::MalformedFrame { .. })));
    }

    #[test]
    fn test_initialize_detection() {
        let msg = decode(br#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#).unwrap();
        assert!(msg.is_initialize());
        let msg = decode(br#"{"jsonrpc":"2.0","method":"initialize"}"#).unwrap();
        assert!(!msg.is_initialize());
    }

    #[test]
    fn test_line_framing_ends_with_newline() {
        let response = JsonRpcResponse::success(RequestId::Number(3.into()), json!({}));
        let bytes = encode(&response, Framing::Line).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[test]
    fn test_sse_framing_round_trips_through_decode_sse() {
        let response = JsonRpcResponse::success(RequestId::String("x".into()), json!({"a": 1}));
        let bytes = encode(&response, Framing::Sse).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.ends_with("\n\n"));
        assert_eq!(
            decode_sse(&text).unwrap(),
            json!({"jsonrpc": "2.0", "id": "x", "result": {"a": 1}})
        );
    }

    #[test]
    fn test_decode_sse_without_data_fails() {
        assert!(decode_sse(": keep-alive\n\n").is_err());
    }
}
