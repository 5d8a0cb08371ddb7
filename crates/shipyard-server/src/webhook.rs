//! Push-webhook registration on the source-control host.

use async_trait::async_trait;
use serde::Deserialize;
use shipyard_core::config::WebhookConfig;
use shipyard_core::{Result, ShipyardError};

#[async_trait]
pub trait WebhookRegistrar: Send + Sync {
    /// Subscribe `{owner}/{repo}` push events to this application's callback.
    /// Returns the host's hook id.
    async fn register(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        application_id: &str,
    ) -> Result<String>;

    async fn remove(&self, token: &str, owner: &str, repo: &str, hook_id: &str) -> Result<()>;
}

/// GitHub REST implementation.
pub struct GithubWebhooks {
    http: reqwest::Client,
    api_base: String,
    callback_base: String,
}

#[derive(Deserialize)]
struct HookCreated {
    id: serde_json::Value,
}

impl GithubWebhooks {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("shipyard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ShipyardError::Webhook(e.to_string()))?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            callback_base: config.callback_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn callback_url(&self, application_id: &str) -> String {
        format!("{}/webhook/applicationId/{application_id}", self.callback_base)
    }

    fn hooks_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{owner}/{repo}/hooks", self.api_base)
    }
}

fn webhook_err(e: impl std::fmt::Display) -> ShipyardError {
    ShipyardError::Webhook(e.to_string())
}

#[async_trait]
impl WebhookRegistrar for GithubWebhooks {
    async fn register(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        application_id: &str,
    ) -> Result<String> {
        let body = serde_json::json!({
            "name": "web",
            "active": true,
            "events": ["push"],
            "config": {
                "url": self.callback_url(application_id),
                "content_type": "json",
            },
        });
        let resp = self
            .http
            .post(self.hooks_url(owner, repo))
            .header("Authorization", format!("token {token}"))
            .header("Accept", "application/vnd.github.v3+json")
            .json(&body)
            .send()
            .await
            .map_err(webhook_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ShipyardError::Webhook(format!(
                "{owner}/{repo}: hook creation returned {status}"
            )));
        }
        let created: HookCreated = resp.json().await.map_err(webhook_err)?;
        let id = match created.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        tracing::info!(repo = %format!("{owner}/{repo}"), hook_id = %id, application_id, "webhook registered");
        Ok(id)
    }

    async fn remove(&self, token: &str, owner: &str, repo: &str, hook_id: &str) -> Result<()> {
        let url = format!("{}/{hook_id}", self.hooks_url(owner, repo));
        let resp = self
            .http
            .delete(url)
            .header("Authorization", format!("token {token}"))
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
            .map_err(webhook_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ShipyardError::Webhook(format!(
                "{owner}/{repo}: hook {hook_id} removal returned {status}"
            )));
        }
        tracing::info!(repo = %format!("{owner}/{repo}"), hook_id, "webhook removed");
        Ok(())
    }
}
