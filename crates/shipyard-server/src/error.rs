use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shipyard_core::ShipyardError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. Wraps anything convertible to
/// `anyhow::Error`; `ShipyardError` values pick their own status code.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(ShipyardError::InvalidRequest(msg.into()).into())
    }
}

pub fn status_for(err: &ShipyardError) -> StatusCode {
    match err {
        ShipyardError::NotFound { .. } | ShipyardError::NoBuildRecorded(_) => {
            StatusCode::NOT_FOUND
        }
        ShipyardError::AlreadyExists { .. }
        | ShipyardError::VersionConflict { .. }
        | ShipyardError::OrchestrationInProgress(_) => StatusCode::CONFLICT,
        ShipyardError::FreeTierLimit { .. } | ShipyardError::QuotaExceeded { .. } => {
            StatusCode::FORBIDDEN
        }
        ShipyardError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ShipyardError::InvalidCiUrl
        | ShipyardError::TriggerFailed(_)
        | ShipyardError::BuildNumberNotFound
        | ShipyardError::Ci(_)
        | ShipyardError::Cloud(_)
        | ShipyardError::Webhook(_)
        | ShipyardError::Store(_)
        | ShipyardError::InvalidConfig(_)
        | ShipyardError::Io(_)
        | ShipyardError::Yaml(_)
        | ShipyardError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self
            .0
            .downcast_ref::<ShipyardError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn record_not_found_maps_to_404() {
        let err = AppError(
            ShipyardError::NotFound {
                kind: "cluster",
                id: "c1".into(),
            }
            .into(),
        );
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn gates_map_to_403() {
        let free = AppError(
            ShipyardError::FreeTierLimit {
                kind: "cluster",
                limit: 1,
            }
            .into(),
        );
        assert_eq!(free.into_response().status(), StatusCode::FORBIDDEN);
        let quota = AppError(ShipyardError::QuotaExceeded { used: 200, allowed: 200 }.into());
        assert_eq!(quota.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn races_map_to_409() {
        let lease = AppError(ShipyardError::OrchestrationInProgress("cluster c1".into()).into());
        assert_eq!(lease.into_response().status(), StatusCode::CONFLICT);
        let stale = AppError(
            ShipyardError::VersionConflict {
                kind: "cluster",
                id: "c1".into(),
            }
            .into(),
        );
        assert_eq!(stale.into_response().status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn pipeline_failures_keep_their_messages() {
        for (err, msg) in [
            (ShipyardError::InvalidCiUrl, "Invalid Jenkins URL"),
            (ShipyardError::BuildNumberNotFound, "Build number not found"),
        ] {
            let response = AppError(err.into()).into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body_of(response).await["error"], msg);
        }
    }

    #[test]
    fn bad_request_constructor_maps_to_400() {
        let err = AppError::bad_request("empty name");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn foreign_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
