use axum::extract::{Path, State};
use axum::Json;
use shipyard_core::model::{Application, ApplicationSpec, ApplicationUpdate};

use crate::error::AppError;
use crate::orchestrator;
use crate::state::AppState;

/// POST /api/applications: deploy an application onto an existing cluster.
pub async fn create_application(
    State(app): State<AppState>,
    Json(spec): Json<ApplicationSpec>,
) -> Result<Json<Application>, AppError> {
    if spec.app_name.trim().is_empty() {
        return Err(AppError::bad_request("appName must not be empty"));
    }
    let application = orchestrator::create_application(&app, spec).await?;
    Ok(Json(application.redacted()))
}

pub async fn get_application(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Application>, AppError> {
    let application: Application = app.db(move |store| store.require(&id)).await?;
    Ok(Json(application.redacted()))
}

pub async fn update_application(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ApplicationUpdate>,
) -> Result<Json<Application>, AppError> {
    let application = orchestrator::update_application(&app, &id, update).await?;
    Ok(Json(application.redacted()))
}

pub async fn delete_application(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let number = orchestrator::delete_application(&app, &id).await?;
    Ok(Json(serde_json::json!({
        "message": "Application deleted successfully",
        "applicationId": id,
        "buildNumber": number,
    })))
}
