use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parts::MessagePart;

pub const JSONRPC_VERSION: &str = "2.0";

// Only A2A method the gateway serves.
pub const MESSAGE_SEND: &str = "message/send";

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
// Implementation-defined server error.
pub const INTERNAL_ERROR: i32 = -32000;

/// The request `id`, echoed verbatim; `null` when absent.
pub fn request_id(payload: &Value) -> Value {
    payload.get("id").cloned().unwrap_or(Value::Null)
}

/// JSON-RPC 2.0 response envelope.
///
/// Wire (success): `{ "jsonrpc": "2.0", "id": "1", "result": {...} }`
/// Wire (error):   `{ "jsonrpc": "2.0", "id": "1", "error": {"code": -32601, "message": "..."} }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseBody {
    Result(TaskResult),
    Error(JsonRpcError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

/// A2A task carrying the agent's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub id: String,
    pub context_id: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub message: AgentMessage,
}

// Replies are produced synchronously, so every task is returned completed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    pub message_id: String,
    pub role: String,
    pub parts: Vec<MessagePart>,
    pub kind: String,
}

impl JsonRpcResponse {
    pub fn result(id: Value, result: TaskResult) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            body: ResponseBody::Result(result),
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            body: ResponseBody::Error(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, ResponseBody::Error(_))
    }
}
