//! Long-poll console log streaming.
//!
//! The client sends how many bytes it already has in `X-Last-Log-Size` and
//! gets back either the next slice of console text (with the new total in
//! `X-Current-Log-Size`) or a JSON completion marker once the build is over.
//!
//! ```text
//! status terminal? ── yes ─► {"status":"completed","log": <full text>}
//!        │ no
//!        ▼
//! ┌─► slice from cursor ── bytes ─► text/plain, X-Current-Log-Size
//! │      │ empty
//! │      ▼
//! │   status terminal? ── yes ─► {"status":"completed"}, X-Current-Log-Size
//! │      │ no
//! └── sleep(log_poll_interval)
//! ```
//!
//! Errors while the build is running are logged and retried on the next
//! iteration. A dropped client connection drops this future, which ends the
//! loop at its next await.

use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use jenkins_client::{BuildNumber, CiJob, JenkinsClient};
use tracing::{debug, warn};

use shipyard_core::Result;

pub const LAST_LOG_SIZE: HeaderName = HeaderName::from_static("x-last-log-size");
pub const CURRENT_LOG_SIZE: HeaderName = HeaderName::from_static("x-current-log-size");

/// Client cursor from `X-Last-Log-Size`; absent or unparsable means 0.
pub fn cursor_from(headers: &HeaderMap) -> u64 {
    headers
        .get(&LAST_LOG_SIZE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn with_cursor(mut response: Response, cursor: u64) -> Response {
    response
        .headers_mut()
        .insert(CURRENT_LOG_SIZE, HeaderValue::from(cursor));
    response
}

async fn is_terminal(jenkins: &JenkinsClient, job: &CiJob, number: &BuildNumber) -> bool {
    match jenkins.build_status(job, number).await {
        Ok(status) => status.is_terminal(),
        Err(e) => {
            warn!(build = %number, error = %e, "status check failed; treating build as running");
            false
        }
    }
}

/// Serve one log request for `number`, starting after `cursor` bytes.
pub async fn stream(
    jenkins: &JenkinsClient,
    job: &CiJob,
    number: &BuildNumber,
    cursor: u64,
    poll_interval: Duration,
) -> Result<Response> {
    if is_terminal(jenkins, job, number).await {
        let log = jenkins.console_text(job, number).await?;
        debug!(build = %number, bytes = log.len(), "serving full log");
        return Ok(Json(serde_json::json!({ "status": "completed", "log": log })).into_response());
    }

    let mut cursor = cursor;
    let response = loop {
        match jenkins.console_slice(job, number, cursor).await {
            Ok(slice) if !slice.is_empty() => {
                cursor = slice.next_offset();
                debug!(build = %number, from = slice.offset, to = cursor, "serving log slice");
                let body = (
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    slice.data,
                )
                    .into_response();
                break with_cursor(body, cursor);
            }
            Ok(_) => {}
            Err(e) => warn!(build = %number, cursor, error = %e, "log fetch failed; retrying"),
        }

        if is_terminal(jenkins, job, number).await {
            debug!(build = %number, cursor, "build finished with no new output");
            let done = Json(serde_json::json!({ "status": "completed" })).into_response();
            break with_cursor(done, cursor);
        }

        tokio::time::sleep(poll_interval).await;
    };
    Ok(response)
}
