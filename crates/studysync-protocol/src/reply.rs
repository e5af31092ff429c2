//! Response builder: wraps reply text or an envelope error into the shape
//! the caller's protocol expects.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::EnvelopeError;
use crate::jsonrpc::{AgentMessage, JsonRpcResponse, TaskResult, TaskState, TaskStatus};
use crate::parts::MessagePart;

/// Simple-mode success body.
///
/// Wire: `{ "status": "success", "reply": { "type": "message", "text": "..." } }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimpleReply {
    pub status: String,
    pub reply: SimpleReplyBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimpleReplyBody {
    #[serde(rename = "type")]
    pub reply_type: String,
    pub text: String,
}

/// Simple-mode error body: `{ "error": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimpleError {
    pub error: String,
}

/// Completed A2A task whose single text part is `text`.
///
/// Task, context and message ids are fresh UUIDs on every call.
pub fn jsonrpc_success(id: Value, text: impl Into<String>) -> JsonRpcResponse {
    let result = TaskResult {
        id: format!("msg-{}", Uuid::new_v4()),
        context_id: format!("ctx-{}", Uuid::new_v4()),
        status: TaskStatus {
            state: TaskState::Completed,
            timestamp: chrono::Utc::now().to_rfc3339(),
            message: AgentMessage {
                message_id: format!("resp-{}", Uuid::new_v4()),
                role: "agent".to_string(),
                parts: vec![MessagePart::text(text)],
                kind: "message".to_string(),
            },
        },
    };
    JsonRpcResponse::result(id, result)
}

pub fn jsonrpc_failure(id: Value, err: &EnvelopeError) -> JsonRpcResponse {
    JsonRpcResponse::error(id, err.code(), err.message())
}

pub fn simple_success(text: impl Into<String>) -> SimpleReply {
    SimpleReply {
        status: "success".to_string(),
        reply: SimpleReplyBody {
            reply_type: "message".to_string(),
            text: text.into(),
        },
    }
}

/// Error body plus the HTTP status it should be sent with.
pub fn simple_failure(err: &EnvelopeError) -> (u16, SimpleError) {
    (
        err.http_status(),
        SimpleError {
            error: err.message(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_shape() {
        let resp = serde_json::to_value(jsonrpc_success(json!("1"), "Keep going!")).expect("json");
        assert_eq!(resp["jsonrpc"], "2.0");
        assert_eq!(resp["id"], "1");
        assert!(resp.get("error").is_none());
        let result = &resp["result"];
        assert!(result["id"].as_str().is_some_and(|s| s.starts_with("msg-")));
        assert!(result["contextId"].as_str().is_some_and(|s| s.starts_with("ctx-")));
        assert_eq!(result["status"]["state"], "completed");
        assert!(result["status"]["timestamp"].is_string());
        let message = &result["status"]["message"];
        assert!(message["messageId"].as_str().is_some_and(|s| s.starts_with("resp-")));
        assert_eq!(message["role"], "agent");
        assert_eq!(message["kind"], "message");
        assert_eq!(message["parts"], json!([{"kind": "text", "text": "Keep going!"}]));
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = jsonrpc_success(Value::Null, "a");
        let b = jsonrpc_success(Value::Null, "b");
        let a = serde_json::to_value(a).expect("json");
        let b = serde_json::to_value(b).expect("json");
        assert_ne!(a["result"]["id"], b["result"]["id"]);
        assert_ne!(a["result"]["contextId"], b["result"]["contextId"]);
        assert_ne!(
            a["result"]["status"]["message"]["messageId"],
            b["result"]["status"]["message"]["messageId"]
        );
    }

    #[test]
    fn error_shape_echoes_id() {
        let resp = jsonrpc_failure(json!(7), &EnvelopeError::MethodNotFound);
        assert!(resp.is_error());
        let resp = serde_json::to_value(resp).expect("json");
        assert_eq!(
            resp,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "error": {"code": -32601, "message": "Method not found"}
            })
        );
        let resp = jsonrpc_failure(Value::Null, &EnvelopeError::InvalidRequest);
        let resp = serde_json::to_value(resp).expect("json");
        assert_eq!(resp["id"], Value::Null);
        assert_eq!(resp["error"]["code"], -32600);
    }

    #[test]
    fn simple_shapes() {
        assert_eq!(
            serde_json::to_value(simple_success("hi")).expect("json"),
            json!({"status": "success", "reply": {"type": "message", "text": "hi"}})
        );
        let (status, body) = simple_failure(&EnvelopeError::bad_request("sender.id is required"));
        assert_eq!(status, 400);
        assert_eq!(
            serde_json::to_value(body).expect("json"),
            json!({"error": "sender.id is required"})
        );
    }
}
