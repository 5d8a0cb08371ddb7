use crate::error::{Result, ShipyardError};
use crate::io;
use jenkins_client::{Credentials, PollSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared bearer token for `/api/*`. `None` leaves the API open.
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_port() -> u16 {
    8085
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            api_token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// CiConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_application_job")]
    pub application_job: String,
    #[serde(default = "default_cluster_job")]
    pub cluster_job: String,
    /// Cloud instance hosting Jenkins; its public address is looked up on
    /// every orchestration call.
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Fixed Jenkins base URL. Takes precedence over `instance_id`.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_ci_port")]
    pub port: u16,
    #[serde(default = "default_queue_attempts")]
    pub queue_attempts: u32,
    #[serde(default = "default_interval_ms")]
    pub queue_interval_ms: u64,
    #[serde(default = "default_interval_ms")]
    pub log_poll_interval_ms: u64,
    /// Write `is_active` only when it changes instead of on every status poll.
    #[serde(default)]
    pub persist_status_on_change_only: bool,
}

fn default_application_job() -> String {
    "deploy-application".to_string()
}

fn default_cluster_job() -> String {
    "deploy-cluster".to_string()
}

fn default_ci_port() -> u16 {
    8080
}

fn default_queue_attempts() -> u32 {
    5
}

fn default_interval_ms() -> u64 {
    5000
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            application_job: default_application_job(),
            cluster_job: default_cluster_job(),
            instance_id: None,
            base_url: None,
            port: default_ci_port(),
            queue_attempts: default_queue_attempts(),
            queue_interval_ms: default_interval_ms(),
            log_poll_interval_ms: default_interval_ms(),
            persist_status_on_change_only: false,
        }
    }
}

impl CiConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            queue_attempts: self.queue_attempts,
            queue_interval: Duration::from_millis(self.queue_interval_ms),
        }
    }

    pub fn log_poll_interval(&self) -> Duration {
        Duration::from_millis(self.log_poll_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// CloudConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// IAM role assumed in customer accounts: `arn:aws:iam::{account}:role/{role_name}`.
    #[serde(default = "default_role_name")]
    pub role_name: String,
    #[serde(default = "default_bucket_prefix")]
    pub bucket_prefix: String,
    /// Known public addresses keyed by instance id.
    #[serde(default)]
    pub instance_addresses: HashMap<String, String>,
}

fn default_role_name() -> String {
    "cool_customer".to_string()
}

fn default_bucket_prefix() -> String {
    "shipyard".to_string()
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            role_name: default_role_name(),
            bucket_prefix: default_bucket_prefix(),
            instance_addresses: HashMap::new(),
        }
    }
}

impl CloudConfig {
    pub fn role_arn(&self, account_id: &str) -> String {
        format!("arn:aws:iam::{account_id}:role/{}", self.role_name)
    }
}

// ---------------------------------------------------------------------------
// BillingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Billing code that marks a user as free tier.
    #[serde(default = "default_free_code")]
    pub free_code: String,
    #[serde(default = "default_free_tier_limit")]
    pub free_tier_limit: usize,
    #[serde(default = "default_monthly_allowance")]
    pub monthly_deploy_allowance: u32,
}

fn default_free_code() -> String {
    "free".to_string()
}

fn default_free_tier_limit() -> usize {
    1
}

fn default_monthly_allowance() -> u32 {
    200
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            free_code: default_free_code(),
            free_tier_limit: default_free_tier_limit(),
            monthly_deploy_allowance: default_monthly_allowance(),
        }
    }
}

// ---------------------------------------------------------------------------
// WebhookConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Public base URL of this service; hooks post to
    /// `{callback_base}/webhook/applicationId/{id}`.
    #[serde(default = "default_callback_base")]
    pub callback_base: String,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_callback_base() -> String {
    "http://localhost:8085".to_string()
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            callback_base: default_callback_base(),
        }
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("shipyard.redb")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ci: CiConfig,
    #[serde(default)]
    pub cloud: CloudConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub webhooks: WebhookConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl ServiceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ShipyardError::InvalidConfig(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: ServiceConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(path, data.as_bytes())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message })
        };

        if self.ci.username.trim().is_empty() {
            push(WarnLevel::Error, "ci.username is empty".to_string());
        }
        if self.ci.password.is_empty() {
            push(WarnLevel::Warning, "ci.password is empty".to_string());
        }

        match (&self.ci.base_url, &self.ci.instance_id) {
            (None, None) => push(
                WarnLevel::Error,
                "no Jenkins address: set ci.base_url or ci.instance_id".to_string(),
            ),
            (None, Some(id)) if !self.cloud.instance_addresses.contains_key(id) => push(
                WarnLevel::Warning,
                format!("instance '{id}' has no entry in cloud.instance_addresses"),
            ),
            _ => {}
        }

        if self.ci.queue_attempts == 0 {
            push(WarnLevel::Error, "ci.queue_attempts must be at least 1".to_string());
        }
        if self.ci.queue_interval_ms > 60_000 {
            push(
                WarnLevel::Warning,
                format!(
                    "ci.queue_interval_ms={} (>60s keeps requests open a long time)",
                    self.ci.queue_interval_ms
                ),
            );
        }
        if self.ci.log_poll_interval_ms == 0 {
            push(
                WarnLevel::Error,
                "ci.log_poll_interval_ms must be greater than 0".to_string(),
            );
        }

        if self.billing.free_code.trim().is_empty() {
            push(
                WarnLevel::Warning,
                "billing.free_code is empty; every user without a billing code is free tier"
                    .to_string(),
            );
        }

        let callback = &self.webhooks.callback_base;
        if !(callback.starts_with("http://") || callback.starts_with("https://")) {
            push(
                WarnLevel::Error,
                format!("webhooks.callback_base '{callback}' is not an http(s) URL"),
            );
        }

        if self.server.api_token.is_none() {
            push(
                WarnLevel::Warning,
                "server.api_token is not set; /api is unauthenticated".to_string(),
            );
        }

        warnings
    }
}
