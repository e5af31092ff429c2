//! Chat endpoint: POST /a2a/agent/{agent_name}
//!
//! Accepts either envelope on the same route:
//!
//! JSON-RPC: `{"jsonrpc":"2.0","id":..,"method":"message/send","params":{..}}`
//! → `{"jsonrpc":"2.0","id":..,"result":{..}}` or
//! `{"jsonrpc":"2.0","id":..,"error":{code,message}}`, always HTTP 200.
//!
//! Simple: `{"sender":{"id":"u1","name":"Paul"},"text":"hello"}`
//! → `{"status":"success","reply":{"type":"message","text":".."}}` or
//! `{"error":".."}` with 400/500.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use studysync_core::types::ThreadKey;
use studysync_memory::MessageRole;
use studysync_protocol::{
    jsonrpc::request_id,
    reply::{jsonrpc_failure, jsonrpc_success, simple_failure, simple_success},
    EnvelopeError, NormalizedRequest, Protocol,
};
use tracing::{error, info, warn};

use crate::app::AppState;

pub async fn a2a_handler(
    State(state): State<Arc<AppState>>,
    Path(agent_name): Path<String>,
    body: Bytes,
) -> Response {
    if agent_name != state.config.agent.name {
        return super::not_found(&state).into_response();
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return unparseable(&body, &e),
    };

    match Protocol::detect(&payload) {
        Protocol::JsonRpc => handle_jsonrpc(&state, &payload).await,
        Protocol::Simple => handle_simple(&state, &payload).await,
    }
}

async fn handle_jsonrpc(state: &AppState, payload: &Value) -> Response {
    let id = request_id(payload);
    let req = match state.adapter.adapt(payload, Protocol::JsonRpc) {
        Ok(req) => req,
        Err(e) => {
            warn!(code = e.code(), error = %e, "rejected JSON-RPC request");
            return Json(jsonrpc_failure(id, &e)).into_response();
        }
    };

    let out = state.forwarder.forward(&req).await;
    info!(
        protocol = "jsonrpc",
        user = %req.user_id,
        outcome = out.outcome.as_str(),
        "chat handled"
    );
    Json(jsonrpc_success(id, out.text)).into_response()
}

async fn handle_simple(state: &AppState, payload: &Value) -> Response {
    let req = match state.adapter.adapt(payload, Protocol::Simple) {
        Ok(req) => req,
        Err(e) => match e.first_contact() {
            Some(req) => return greet_if_unseen(state, req, &e).await,
            None => return simple_error(&e),
        },
    };

    let out = state.forwarder.forward(&req).await;
    info!(
        protocol = "simple",
        user = %req.user_id,
        outcome = out.outcome.as_str(),
        "chat handled"
    );
    Json(simple_success(out.text)).into_response()
}

/// A simple-mode message without text is a first contact only if nothing
/// was ever stored for the user; otherwise it is a validation error.
async fn greet_if_unseen(
    state: &AppState,
    req: NormalizedRequest,
    err: &EnvelopeError,
) -> Response {
    let key = ThreadKey::for_user(&req.user_id);
    match state.memory.has_thread(&key) {
        Ok(false) => {
            let out = state.forwarder.forward(&req).await;
            // Record the greeting so the next empty message is not a first contact.
            if let Err(e) = state
                .memory
                .save_message(&key, MessageRole::Assistant, &out.text)
            {
                warn!(user = %req.user_id, error = %e, "failed to record welcome");
            }
            info!(
                protocol = "simple",
                user = %req.user_id,
                outcome = out.outcome.as_str(),
                "chat handled"
            );
            Json(simple_success(out.text)).into_response()
        }
        Ok(true) => simple_error(err),
        Err(e) => {
            error!(user = %req.user_id, error = %e, "memory lookup failed");
            simple_error(&EnvelopeError::Internal)
        }
    }
}

fn simple_error(err: &EnvelopeError) -> Response {
    let (status, body) = simple_failure(err);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(body)).into_response()
}

/// Body is not JSON. Classified with the same sender/jsonrpc rule as a
/// parsed payload.
fn unparseable(body: &[u8], err: &serde_json::Error) -> Response {
    warn!(error = %err, bytes = body.len(), "request body is not valid JSON");
    match Protocol::detect_raw(&String::from_utf8_lossy(body)) {
        Protocol::Simple => simple_error(&EnvelopeError::bad_request("Invalid JSON")),
        Protocol::JsonRpc => {
            Json(jsonrpc_failure(Value::Null, &EnvelopeError::Parse)).into_response()
        }
    }
}
