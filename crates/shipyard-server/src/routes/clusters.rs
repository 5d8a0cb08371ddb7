use axum::extract::{Path, State};
use axum::Json;
use shipyard_core::model::{Cluster, ClusterSpec, ClusterUpdate};

use crate::error::AppError;
use crate::orchestrator;
use crate::state::AppState;

/// POST /api/clusters: provision a cluster.
pub async fn create_cluster(
    State(app): State<AppState>,
    Json(spec): Json<ClusterSpec>,
) -> Result<Json<Cluster>, AppError> {
    if spec.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    if spec.account_id.trim().is_empty() {
        return Err(AppError::bad_request("accountId must not be empty"));
    }
    let cluster = orchestrator::create_cluster(&app, spec).await?;
    Ok(Json(cluster.redacted()))
}

/// GET /api/clusters/{id}
pub async fn get_cluster(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Cluster>, AppError> {
    let cluster: Cluster = app.db(move |store| store.require(&id)).await?;
    Ok(Json(cluster.redacted()))
}

/// PUT /api/clusters/{id}: merge overrides and re-apply.
pub async fn update_cluster(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ClusterUpdate>,
) -> Result<Json<Cluster>, AppError> {
    let cluster = orchestrator::update_cluster(&app, &id, update).await?;
    Ok(Json(cluster.redacted()))
}

/// DELETE /api/clusters/{id}: run the destroy pipeline, then drop the record.
pub async fn delete_cluster(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let number = orchestrator::delete_cluster(&app, &id).await?;
    Ok(Json(serde_json::json!({
        "message": "Cluster deleted successfully",
        "clusterId": id,
        "buildNumber": number,
    })))
}
