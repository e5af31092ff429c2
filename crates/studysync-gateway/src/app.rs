use std::any::Any;
use std::sync::Arc;

use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use studysync_core::config::StudySyncConfig;
use studysync_memory::MemoryStore;
use studysync_protocol::{reply::jsonrpc_failure, EnvelopeAdapter, EnvelopeError, TextExtractor};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::forward::ConversationForwarder;

/// Shared across all requests via `Arc`.
pub struct AppState {
    pub config: StudySyncConfig,
    pub adapter: EnvelopeAdapter,
    pub forwarder: ConversationForwarder,
    /// Same store the agent writes to; the surface only asks "seen before?".
    pub memory: Arc<MemoryStore>,
}

impl AppState {
    pub fn new(
        config: StudySyncConfig,
        forwarder: ConversationForwarder,
        memory: Arc<MemoryStore>,
    ) -> Self {
        let adapter = EnvelopeAdapter::new(TextExtractor::new(&config.extractor));
        Self {
            config,
            adapter,
            forwarder,
            memory,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(crate::http::health::root_handler))
        .route("/health", get(crate::http::health::health_handler))
        .route("/a2a/agent/{agent_name}", post(crate::http::a2a::a2a_handler))
        .fallback(crate::http::not_found_handler)
        .method_not_allowed_fallback(crate::http::not_found_handler)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// A panicking handler still answers in JSON-RPC shape.
///
/// The body has already been consumed by the handler, so the id is always
/// `null`, and the status is 500 rather than the 200 of validation errors.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "handler panicked");

    (
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        Json(jsonrpc_failure(Value::Null, &EnvelopeError::Internal)),
    )
        .into_response()
}
