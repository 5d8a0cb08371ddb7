use axum::extract::State;
use axum::Json;
use chrono::Utc;
use shipyard_core::model::{NewOrganization, Organization, User};
use shipyard_core::quota;

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/organizations: free-tier users may own one.
pub async fn create_organization(
    State(app): State<AppState>,
    Json(body): Json<NewOrganization>,
) -> Result<Json<Organization>, AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    let billing = app.config.billing.clone();
    let org = app
        .db(move |store| {
            let user: User = store.require(&body.owner_id)?;
            let owned = store.count_owned::<Organization>(&user.user_id)?;
            quota::check_free_tier(
                &user,
                &billing.free_code,
                billing.free_tier_limit,
                owned,
                "organization",
            )?;
            let mut org = Organization::create(body, Utc::now());
            store.insert(&mut org)?;
            Ok(org)
        })
        .await?;
    tracing::info!(org = %org.org_id, owner = %org.owner_id, "organization created");
    Ok(Json(org))
}
