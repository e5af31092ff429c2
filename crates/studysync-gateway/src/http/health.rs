use axum::Json;
use serde_json::{json, Value};
use studysync_core::config::SERVICE_NAME;

/// GET /: service banner.
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": format!("{SERVICE_NAME} is running ✅"),
        "message": "Welcome to StudySync — your AI study accountability partner!",
    }))
}

/// GET /health: liveness probe.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": SERVICE_NAME,
    }))
}
