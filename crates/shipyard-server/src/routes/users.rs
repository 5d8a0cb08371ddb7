use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use shipyard_core::model::{NewUser, User};
use shipyard_core::quota;

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/users: register a user record for ownership and quota checks.
pub async fn create_user(
    State(app): State<AppState>,
    Json(body): Json<NewUser>,
) -> Result<Json<User>, AppError> {
    if body.user_name.trim().is_empty() {
        return Err(AppError::bad_request("userName must not be empty"));
    }
    let mut user = User::create(body, Utc::now());
    let user = app
        .db(move |store| {
            store.insert(&mut user)?;
            Ok(user)
        })
        .await?;
    tracing::info!(user = %user.user_id, "user created");
    Ok(Json(user))
}

/// GET /api/users/{user_id}
pub async fn get_user(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, AppError> {
    let user = app.db(move |store| store.require(&user_id)).await?;
    Ok(Json(user))
}

/// GET /api/users/{user_id}/deployments: deployments left this month.
pub async fn deployments_left(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user: User = app.db(move |store| store.require(&user_id)).await?;
    let left = quota::deployments_left(
        &user,
        Utc::now(),
        app.config.billing.monthly_deploy_allowance,
    );
    Ok(Json(serde_json::json!({
        "userId": user.user_id,
        "used": user.deployment,
        "deploymentsLeft": left,
    })))
}
