//! Build status and log endpoints, shared by clusters and applications.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;

use crate::error::AppError;
use crate::logs;
use crate::orchestrator::{self, Deployment, StatusReport};
use crate::state::AppState;

/// GET /api/{kind}/{id}/build-status
pub async fn build_status<D: Deployment>(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusReport>, AppError> {
    let report = orchestrator::build_status::<D>(&app, &id).await?;
    Ok(Json(report))
}

/// GET /api/{kind}/{id}/build-log: long-polls until new output or completion.
pub async fn build_log<D: Deployment>(
    State(app): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let cursor = logs::cursor_from(&headers);
    let job = orchestrator::ci_job::<D>(&app).await?;
    let (_, number) = orchestrator::current_build::<D>(&app, &id).await?;
    let response = logs::stream(
        &app.jenkins,
        &job,
        &number,
        cursor,
        app.config.ci.log_poll_interval(),
    )
    .await?;
    Ok(response)
}
