use serde_json::Value;
use studysync_core::types::UserId;
use tracing::debug;

use crate::error::EnvelopeError;
use crate::jsonrpc::{JSONRPC_VERSION, MESSAGE_SEND};
use crate::parts::{MessagePart, TextExtractor};

/// Name used when the caller did not say who they are.
pub const PLACEHOLDER_USER_NAME: &str = "there";

/// Which wire shape an inbound request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// `{ "jsonrpc": "2.0", "id", "method": "message/send", "params": { "message": {...} } }`
    JsonRpc,
    /// `{ "sender": { "id", "name" }, "text" }`
    Simple,
}

impl Protocol {
    /// Simple mode needs a top-level `sender` and no `jsonrpc` field.
    /// Everything else is JSON-RPC, so a malformed JSON-RPC call still gets
    /// a JSON-RPC error with its id echoed.
    pub fn detect(payload: &Value) -> Self {
        if payload.get("sender").is_some() && payload.get("jsonrpc").is_none() {
            Protocol::Simple
        } else {
            Protocol::JsonRpc
        }
    }

    /// Same rule applied to a body that did not parse as JSON.
    pub fn detect_raw(raw: &str) -> Self {
        if raw.contains("\"sender\"") && !raw.contains("\"jsonrpc\"") {
            Protocol::Simple
        } else {
            Protocol::JsonRpc
        }
    }
}

/// Protocol-independent view of one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRequest {
    pub user_id: UserId,
    pub user_name: String,
    /// Empty means the user has not said anything yet.
    pub message_text: String,
}

impl NormalizedRequest {
    pub fn is_first_contact(&self) -> bool {
        self.message_text.trim().is_empty()
    }

    /// Whether the caller supplied a real name.
    pub fn has_user_name(&self) -> bool {
        self.user_name != PLACEHOLDER_USER_NAME
    }
}

/// Validates inbound envelopes and normalizes them. Pure: no I/O.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeAdapter {
    extractor: TextExtractor,
}

impl EnvelopeAdapter {
    pub fn new(extractor: TextExtractor) -> Self {
        Self { extractor }
    }

    pub fn adapt(
        &self,
        payload: &Value,
        protocol: Protocol,
    ) -> Result<NormalizedRequest, EnvelopeError> {
        match protocol {
            Protocol::JsonRpc => self.adapt_jsonrpc(payload),
            Protocol::Simple => self.adapt_simple(payload),
        }
    }

    fn adapt_jsonrpc(&self, payload: &Value) -> Result<NormalizedRequest, EnvelopeError> {
        if payload.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(EnvelopeError::InvalidRequest);
        }
        if payload.get("method").and_then(Value::as_str) != Some(MESSAGE_SEND) {
            return Err(EnvelopeError::MethodNotFound);
        }
        let message = payload
            .get("params")
            .and_then(|p| p.get("message"))
            .filter(|m| !m.is_null())
            .ok_or(EnvelopeError::InvalidParams)?;

        let parts = MessagePart::list_from_value(message.get("parts"));
        debug!(parts = parts.len(), "processing message parts");
        let message_text = self.extractor.extract(&parts);

        let metadata = message.get("metadata");
        let user_id = metadata
            .and_then(|m| non_empty_str(m.get("telex_user_id")))
            .map(UserId::from)
            .unwrap_or_else(UserId::synthetic);
        let user_name = metadata
            .and_then(|m| non_empty_str(m.get("telex_user_name")))
            .unwrap_or(PLACEHOLDER_USER_NAME)
            .to_string();

        Ok(NormalizedRequest {
            user_id,
            user_name,
            message_text,
        })
    }

    fn adapt_simple(&self, payload: &Value) -> Result<NormalizedRequest, EnvelopeError> {
        let sender = payload
            .get("sender")
            .filter(|s| s.is_object())
            .ok_or_else(|| EnvelopeError::bad_request("sender is required"))?;
        let user_id = match sender.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => UserId::from(s.as_str()),
            Some(Value::Number(n)) => UserId::from(n.to_string()),
            _ => return Err(EnvelopeError::bad_request("sender.id is required")),
        };
        let user_name = non_empty_str(sender.get("name"))
            .unwrap_or(PLACEHOLDER_USER_NAME)
            .to_string();

        // `text` is taken verbatim; a `content` parts array is accepted in its place.
        let message_text = match non_empty_str(payload.get("text")) {
            Some(text) => text.trim().to_string(),
            None => {
                let parts = MessagePart::list_from_value(payload.get("content"));
                self.extractor.extract(&parts)
            }
        };

        if message_text.is_empty() {
            return Err(EnvelopeError::MissingText { user_id, user_name });
        }

        Ok(NormalizedRequest {
            user_id,
            user_name,
            message_text,
        })
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
