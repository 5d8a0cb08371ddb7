use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Shared-token gate for the `/api` routes.
///
/// When `token` is `None` the middleware is a transparent no-op.
#[derive(Clone, Default)]
pub struct ApiAuth {
    pub token: Option<String>,
}

impl ApiAuth {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

/// Requires `Authorization: Bearer <token>` when a token is configured.
///
/// Mounted only on the `/api` router, so `/health` and the source-control
/// webhook stay reachable without credentials.
pub async fn auth_middleware(
    State(auth): State<Arc<ApiAuth>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(ref token) = auth.token else {
        return next.run(req).await;
    };

    let presented = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    if presented == Some(token.as_str()) {
        return next.run(req).await;
    }

    tracing::debug!(path = %req.uri().path(), "rejected unauthenticated request");
    Response::builder()
        .status(401)
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"error":"unauthorized"}"#))
        .expect("infallible: all header values are valid ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::{http::Request, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "ok"
    }

    fn test_app(auth: ApiAuth) -> Router {
        Router::new()
            .route("/api/clusters", get(ok_handler))
            .layer(middleware::from_fn_with_state(Arc::new(auth), auth_middleware))
    }

    async fn status(app: Router, header: Option<&str>) -> StatusCode {
        let mut req = Request::builder().uri("/api/clusters");
        if let Some(h) = header {
            req = req.header("authorization", h);
        }
        app.oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn no_token_passes_through() {
        assert_eq!(status(test_app(ApiAuth::new(None)), None).await, StatusCode::OK);
        assert_eq!(
            status(test_app(ApiAuth::new(Some(String::new()))), None).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn missing_or_wrong_token_is_401() {
        let auth = ApiAuth::new(Some("secret".into()));
        assert_eq!(status(test_app(auth.clone()), None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(test_app(auth.clone()), Some("Bearer nope")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(test_app(auth), Some("secret")).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn bearer_token_passes() {
        let auth = ApiAuth::new(Some("secret".into()));
        assert_eq!(
            status(test_app(auth), Some("Bearer secret")).await,
            StatusCode::OK
        );
    }
}
