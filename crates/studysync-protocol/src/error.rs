use studysync_core::types::UserId;
use thiserror::Error;

use crate::envelope::NormalizedRequest;
use crate::jsonrpc::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};

/// Why an inbound envelope could not be normalized.
///
/// Every variant renders into the caller's protocol: a JSON-RPC `error`
/// object with [`code`](Self::code), or a simple `{error}` body with
/// [`http_status`](Self::http_status).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("Parse error")]
    Parse,

    #[error("Invalid Request")]
    InvalidRequest,

    #[error("Method not found")]
    MethodNotFound,

    #[error("Invalid params")]
    InvalidParams,

    /// Simple-mode validation failure.
    #[error("{0}")]
    BadRequest(String),

    /// Simple-mode envelope with a valid sender but no message text.
    ///
    /// Carries the sender so the surface can still greet a first-time user.
    #[error("text is required")]
    MissingText { user_id: UserId, user_name: String },

    #[error("Internal server error")]
    Internal,
}

impl EnvelopeError {
    /// JSON-RPC 2.0 error code.
    pub fn code(&self) -> i32 {
        match self {
            EnvelopeError::Parse => PARSE_ERROR,
            EnvelopeError::InvalidRequest
            | EnvelopeError::BadRequest(_)
            | EnvelopeError::MissingText { .. } => INVALID_REQUEST,
            EnvelopeError::MethodNotFound => METHOD_NOT_FOUND,
            EnvelopeError::InvalidParams => INVALID_PARAMS,
            EnvelopeError::Internal => INTERNAL_ERROR,
        }
    }

    /// Human-readable message sent on the wire.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// HTTP status used for simple-mode error bodies.
    pub fn http_status(&self) -> u16 {
        match self {
            EnvelopeError::Internal => 500,
            _ => 400,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        EnvelopeError::BadRequest(message.into())
    }

    /// For `MissingText`, the empty-message request a first contact maps to.
    pub fn first_contact(&self) -> Option<NormalizedRequest> {
        match self {
            EnvelopeError::MissingText { user_id, user_name } => Some(NormalizedRequest {
                user_id: user_id.clone(),
                user_name: user_name.clone(),
                message_text: String::new(),
            }),
            _ => None,
        }
    }
}
