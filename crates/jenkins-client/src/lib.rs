//! `jenkins-client`: async driver for the parts of the Jenkins HTTP API a
//! deployment orchestrator needs.
//!
//! # Protocol
//!
//! ```text
//! BuildRequest
//!     │  POST job/{job}/buildWithParameters?…      (basic auth)
//!     ▼
//! QueueItem      ← parsed from Location: …/queue/item/{n}/
//!     │  GET queue/item/{n}/api/json               (bounded retries)
//!     ▼
//! BuildNumber    ← trailing segment of executable.url
//!     │  GET job/{job}/{build}/api/json            → BuildStatus
//!     │  GET job/{job}/{build}/consoleText         (Range: bytes={o}-)
//!     ▼
//! LogSlice
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use jenkins_client::{BuildAction, BuildRequest, CiJob, Credentials, JenkinsClient, PollSettings};
//!
//! let client = JenkinsClient::new(Credentials::default(), PollSettings::default())?;
//! let job = CiJob::new("http://10.0.0.5:8080", "deploy-cluster");
//! let request = BuildRequest::new(BuildAction::Apply).param("name", "prod");
//! let item = client.trigger(&job, &request).await?;
//! let number = client.resolve_queue_item(job.base_url(), item.as_ref()).await;
//! ```

pub mod client;
pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{parse_executable_url, parse_queue_location, CiJob, Credentials, JenkinsClient, PollSettings};
pub use error::JenkinsError;
pub use types::{BuildAction, BuildNumber, BuildRequest, BuildStatus, LogSlice, ParamValue, QueueItem};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, JenkinsError>;
