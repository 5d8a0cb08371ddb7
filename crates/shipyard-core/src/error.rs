use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShipyardError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("{kind} '{id}' was modified concurrently; reload and retry")]
    VersionConflict { kind: &'static str, id: String },

    #[error("a deployment is already in progress for {0}")]
    OrchestrationInProgress(String),

    #[error("Free users are not allowed to create more than {limit} {kind}.")]
    FreeTierLimit { kind: &'static str, limit: usize },

    #[error("deployment quota exhausted: {used} of {allowed} deployments used")]
    QuotaExceeded { used: u32, allowed: u32 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid Jenkins URL")]
    InvalidCiUrl,

    #[error("Error triggering pipeline")]
    TriggerFailed(#[source] jenkins_client::JenkinsError),

    #[error("Build number not found")]
    BuildNumberNotFound,

    #[error("no build recorded for {0}")]
    NoBuildRecorded(String),

    #[error("Error: {0}")]
    Ci(#[from] jenkins_client::JenkinsError),

    #[error("cloud provisioning error: {0}")]
    Cloud(String),

    #[error("webhook registration error: {0}")]
    Webhook(String),

    #[error("document store error: {0}")]
    Store(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ShipyardError>;
