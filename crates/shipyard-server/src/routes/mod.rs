pub mod applications;
pub mod builds;
pub mod clusters;
pub mod hooks;
pub mod organizations;
pub mod projects;
pub mod users;

use axum::Json;

/// GET /health: liveness.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
