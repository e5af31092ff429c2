//! Wire formats accepted and produced by the StudySync gateway.
//!
//! Two inbound envelopes are supported: JSON-RPC 2.0 `message/send` (A2A
//! style, as sent by Telex) and the simplified Telex `{sender, text}` shape.
//! Both are normalized into a [`NormalizedRequest`] and answered in the
//! envelope the caller used.

pub mod envelope;
pub mod error;
pub mod jsonrpc;
pub mod parts;
pub mod reply;

pub use envelope::{EnvelopeAdapter, NormalizedRequest, Protocol, PLACEHOLDER_USER_NAME};
pub use error::EnvelopeError;
pub use parts::{MessagePart, TextExtractor};
