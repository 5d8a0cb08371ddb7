use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::error::AppError;
use crate::orchestrator;
use crate::state::AppState;

/// POST /webhook/applicationId/{id}: source-control event callback.
///
/// Only `push` events redeploy; anything else is acknowledged and ignored.
pub async fn application_event(
    State(app): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let event = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if event != "push" {
        tracing::debug!(application = %id, event, "ignoring webhook event");
        return Ok(Json(serde_json::json!({ "message": "Event ignored" })));
    }

    let number = orchestrator::redeploy_application(&app, &id).await?;
    Ok(Json(serde_json::json!({
        "message": "Webhook processed successfully",
        "buildNumber": number,
    })))
}
