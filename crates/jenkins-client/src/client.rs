use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;
use regex::Regex;
use reqwest::header::{LOCATION, RANGE};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::types::{
    BuildInfo, BuildNumber, BuildRequest, BuildStatus, LogSlice, QueueItem, QueueItemInfo,
};
use crate::{JenkinsError, Result};

// ─── Settings ─────────────────────────────────────────────────────────────

/// Static service account used for every Jenkins call.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Bounds for queue-item resolution.
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Total queue lookups before giving up.
    pub queue_attempts: u32,
    /// Pause between two lookups. Not applied after the last one.
    pub queue_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            queue_attempts: 5,
            queue_interval: Duration::from_millis(5000),
        }
    }
}

// ─── CiJob ────────────────────────────────────────────────────────────────

/// A job on a specific Jenkins instance. The base URL is resolved per call by
/// the caller because the instance address can change between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiJob {
    base_url: String,
    name: String,
}

impl CiJob {
    pub fn new(base_url: impl Into<String>, name: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            name: name.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `{base}/job/{job}/buildWithParameters?{params}`
    pub fn trigger_url(&self, request: &BuildRequest) -> Result<Url> {
        let raw = format!("{}/job/{}/buildWithParameters", self.base_url, self.name);
        let mut url = parse_url(&raw)?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in request.pairs() {
                query.append_pair(key, &value);
            }
        }
        Ok(url)
    }

    /// `{base}/job/{job}/{build}/{suffix}`
    pub fn build_url(&self, number: &BuildNumber, suffix: &str) -> String {
        format!("{}/job/{}/{}/{}", self.base_url, self.name, number, suffix)
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| JenkinsError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

// ─── Response parsing ─────────────────────────────────────────────────────

static QUEUE_RE: OnceLock<Regex> = OnceLock::new();
static EXECUTABLE_RE: OnceLock<Regex> = OnceLock::new();

/// Extract the queue item id from a trigger response `Location` header,
/// e.g. `http://ci:8080/queue/item/118/`.
pub fn parse_queue_location(location: &str) -> Option<QueueItem> {
    let re = QUEUE_RE.get_or_init(|| Regex::new(r"/queue/item/(\d+)/").unwrap());
    re.captures(location)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .map(QueueItem)
}

/// Extract the build number from the trailing path segment of an
/// `executable.url`, e.g. `http://ci:8080/job/deploy/42/`.
pub fn parse_executable_url(url: &str) -> Option<BuildNumber> {
    let re = EXECUTABLE_RE.get_or_init(|| Regex::new(r"/(\d+)/$").unwrap());
    re.captures(url)
        .and_then(|c| c.get(1))
        .and_then(|m| BuildNumber::parse(m.as_str()))
}

// ─── JenkinsClient ────────────────────────────────────────────────────────

/// Async Jenkins API driver. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    http: reqwest::Client,
    credentials: Credentials,
    poll: PollSettings,
}

impl JenkinsClient {
    pub fn new(credentials: Credentials, poll: PollSettings) -> Result<Self> {
        // Redirects stay visible so the trigger's Location header can be read.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self::with_http(http, credentials, poll))
    }

    pub fn with_http(http: reqwest::Client, credentials: Credentials, poll: PollSettings) -> Self {
        Self {
            http,
            credentials,
            poll,
        }
    }

    pub fn poll_settings(&self) -> &PollSettings {
        &self.poll
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(JenkinsError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|source| JenkinsError::Parse {
            url: url.to_string(),
            source,
        })
    }

    /// Reachability check against `{base}/api/json`. Any HTTP answer counts
    /// as reachable; only transport failures are errors.
    pub async fn probe(&self, base_url: &str) -> Result<()> {
        let url = format!("{}/api/json", base_url.trim_end_matches('/'));
        parse_url(&url)?;
        let resp = self.get(&url).send().await?;
        debug!(url = %url, status = resp.status().as_u16(), "jenkins probe answered");
        Ok(())
    }

    /// Submit a parameterized build. Returns the queue item parsed from the
    /// `Location` header, or `None` if the header is missing or malformed.
    ///
    /// Every call queues a new build; nothing here is idempotent.
    pub async fn trigger(&self, job: &CiJob, request: &BuildRequest) -> Result<Option<QueueItem>> {
        let url = job.trigger_url(request)?;
        info!(job = %job.name(), action = %request.action(), "triggering build");

        let resp = self
            .http
            .post(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?;

        let status = resp.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(JenkinsError::Status {
                status: status.as_u16(),
                url: format!("{}/job/{}/buildWithParameters", job.base_url(), job.name()),
            });
        }

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let item = location.as_deref().and_then(parse_queue_location);
        match &item {
            Some(item) => info!(job = %job.name(), queue_item = %item, "build queued"),
            None => warn!(job = %job.name(), location = ?location, "trigger response carried no queue item"),
        }
        Ok(item)
    }

    /// Poll the queue until the item is scheduled onto a build.
    ///
    /// Makes at most `queue_attempts` lookups, sleeping `queue_interval`
    /// between them whether the lookup failed or simply was not ready yet.
    /// Exhaustion is not an error: it yields `None`.
    pub async fn resolve_queue_item(
        &self,
        base_url: &str,
        item: Option<&QueueItem>,
    ) -> Option<BuildNumber> {
        let Some(item) = item else {
            warn!("no queue item to resolve");
            return None;
        };
        let url = format!("{}/queue/item/{}/api/json", base_url.trim_end_matches('/'), item);
        let attempts = self.poll.queue_attempts;

        for attempt in 1..=attempts {
            debug!(attempt, url = %url, "looking up queue item");
            match self.get_json::<QueueItemInfo>(&url).await {
                Ok(info) => {
                    if let Some(exec_url) = info.executable.and_then(|e| e.url) {
                        let number = parse_executable_url(&exec_url);
                        match &number {
                            Some(n) => info!(queue_item = %item, build = %n, attempt, "queue item resolved"),
                            None => warn!(queue_item = %item, url = %exec_url, "executable url has no build number"),
                        }
                        return number;
                    }
                    if info.cancelled == Some(true) {
                        warn!(queue_item = %item, "queue item was cancelled");
                        return None;
                    }
                    debug!(queue_item = %item, why = ?info.why, "executable not available yet");
                }
                Err(e) => {
                    warn!(queue_item = %item, attempt, error = %e, "queue item lookup failed");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.poll.queue_interval).await;
            }
        }

        warn!(queue_item = %item, attempts, "build number not found after all attempts");
        None
    }

    /// Fetch and classify the status of one build.
    pub async fn build_status(&self, job: &CiJob, number: &BuildNumber) -> Result<BuildStatus> {
        let url = job.build_url(number, "api/json");
        let info: BuildInfo = self.get_json(&url).await?;
        let status = BuildStatus::from_result(info.result.as_deref());
        debug!(job = %job.name(), build = %number, status = %status, "build status");
        Ok(status)
    }

    /// Whole console log of a build.
    pub async fn console_text(&self, job: &CiJob, number: &BuildNumber) -> Result<String> {
        let url = job.build_url(number, "consoleText");
        let resp = self.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(JenkinsError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(resp.text().await?)
    }

    /// Console bytes from `offset` onward, requested with
    /// `Range: bytes={offset}-`.
    ///
    /// A server that ignores the range and answers 200 with the full log has
    /// the already-seen prefix cut off here; 416 means nothing new.
    pub async fn console_slice(
        &self,
        job: &CiJob,
        number: &BuildNumber,
        offset: u64,
    ) -> Result<LogSlice> {
        let url = job.build_url(number, "consoleText");
        let resp = self
            .get(&url)
            .header(RANGE, format!("bytes={offset}-"))
            .send()
            .await?;

        let status = resp.status();
        let data = match status {
            StatusCode::PARTIAL_CONTENT => resp.bytes().await?,
            StatusCode::RANGE_NOT_SATISFIABLE => Bytes::new(),
            s if s.is_success() => {
                let full = resp.bytes().await?;
                let start = usize::try_from(offset).unwrap_or(usize::MAX);
                if start < full.len() {
                    full.slice(start..)
                } else {
                    Bytes::new()
                }
            }
            s => {
                return Err(JenkinsError::Status {
                    status: s.as_u16(),
                    url,
                })
            }
        };
        Ok(LogSlice { offset, data })
    }
}
