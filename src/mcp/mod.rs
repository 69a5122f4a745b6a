//! MCP protocol layer.
//!
//! - `envelope`: JSON-RPC message types
//! - `codec`: line and SSE framing
//! - `dispatcher`: method routing and tool invocation

pub mod codec;
pub mod dispatcher;
pub mod envelope;

pub use codec::{Framing, decode, decode_sse, encode};
pub use dispatcher::{SERVER_NAME, ToolDispatcher};
pub use envelope::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Message, RequestId,
};
