use axum::extract::State;
use axum::Json;
use chrono::Utc;
use shipyard_core::model::{NewProject, Organization, Project, User};
use shipyard_core::quota;

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/projects: free-tier users may own one.
pub async fn create_project(
    State(app): State<AppState>,
    Json(body): Json<NewProject>,
) -> Result<Json<Project>, AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    let billing = app.config.billing.clone();
    let project = app
        .db(move |store| {
            let user: User = store.require(&body.user_id)?;
            if let Some(org_id) = &body.org_id {
                store.require::<Organization>(org_id)?;
            }
            let owned = store.count_owned::<Project>(&user.user_id)?;
            quota::check_free_tier(
                &user,
                &billing.free_code,
                billing.free_tier_limit,
                owned,
                "project",
            )?;
            let mut project = Project::create(body, Utc::now());
            store.insert(&mut project)?;
            Ok(project)
        })
        .await?;
    tracing::info!(project = %project.proj_id, owner = %project.user_id, "project created");
    Ok(Json(project))
}
