pub mod a2a;
pub mod health;

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// Catch-all for unmatched routes, including unknown agent names.
pub async fn not_found_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    not_found(&state)
}

pub(crate) fn not_found(state: &AppState) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Endpoint not found",
            "available_endpoints": [
                "GET /",
                "GET /health",
                format!("POST /a2a/agent/{}", state.config.agent.name),
            ],
        })),
    )
}
