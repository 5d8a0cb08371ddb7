pub mod auth;
pub mod cloud;
pub mod error;
pub mod logs;
pub mod orchestrator;
pub mod routes;
pub mod state;
pub mod webhook;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use shipyard_core::config::ServiceConfig;
use shipyard_core::model::{Application, Cluster};
use shipyard_core::store::{RedbStore, Store};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{auth_middleware, ApiAuth};
use crate::cloud::StaticCloud;
use crate::state::AppState;
use crate::webhook::GithubWebhooks;

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let auth = Arc::new(ApiAuth::new(app_state.config.server.api_token.clone()));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([logs::CURRENT_LOG_SIZE]);

    let api = Router::new()
        // Users
        .route("/api/users", post(routes::users::create_user))
        .route("/api/users/{user_id}", get(routes::users::get_user))
        .route(
            "/api/users/{user_id}/deployments",
            get(routes::users::deployments_left),
        )
        // Organizations / projects
        .route(
            "/api/organizations",
            post(routes::organizations::create_organization),
        )
        .route("/api/projects", post(routes::projects::create_project))
        // Clusters
        .route("/api/clusters", post(routes::clusters::create_cluster))
        .route(
            "/api/clusters/{id}",
            get(routes::clusters::get_cluster)
                .put(routes::clusters::update_cluster)
                .delete(routes::clusters::delete_cluster),
        )
        .route(
            "/api/clusters/{id}/build-status",
            get(routes::builds::build_status::<Cluster>),
        )
        .route(
            "/api/clusters/{id}/build-log",
            get(routes::builds::build_log::<Cluster>),
        )
        // Applications
        .route(
            "/api/applications",
            post(routes::applications::create_application),
        )
        .route(
            "/api/applications/{id}",
            get(routes::applications::get_application)
                .put(routes::applications::update_application)
                .delete(routes::applications::delete_application),
        )
        .route(
            "/api/applications/{id}/build-status",
            get(routes::builds::build_status::<Application>),
        )
        .route(
            "/api/applications/{id}/build-log",
            get(routes::builds::build_log::<Application>),
        )
        .route_layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/webhook/applicationId/{id}",
            post(routes::hooks::application_event),
        )
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Production wiring: redb store at `store.path`, config-backed cloud
/// provider, GitHub webhooks.
pub fn state_from_config(config: ServiceConfig) -> anyhow::Result<AppState> {
    let store = Store::new(RedbStore::open(&config.store.path)?);
    let cloud = Arc::new(StaticCloud::from_config(&config));
    let webhooks = Arc::new(GithubWebhooks::new(&config.webhooks)?);
    Ok(AppState::new(config, store, cloud, webhooks)?)
}

/// Start the API server on `0.0.0.0:{port}`.
pub async fn serve(config: ServiceConfig, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(config, listener).await
}

/// Start the API server on a pre-bound listener.
///
/// The caller can read the actual port before starting (useful when
/// `port = 0` and the OS picks a free port).
pub async fn serve_on(
    config: ServiceConfig,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let store_path = config.store.path.clone();
    let app = build_router(state_from_config(config)?);

    tracing::info!(
        store = %store_path.display(),
        "shipyard API listening on http://localhost:{actual_port}"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
