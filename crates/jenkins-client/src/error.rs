use thiserror::Error;

#[derive(Debug, Error)]
pub enum JenkinsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Jenkins returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("invalid Jenkins URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to parse Jenkins response from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}
