//! Cloud-side collaborators: locating the Jenkins host and bootstrapping the
//! per-account resources a deployment writes into.

use std::collections::HashMap;

use async_trait::async_trait;
use shipyard_core::config::ServiceConfig;
use shipyard_core::{Result, ShipyardError};

#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Public address (IP or hostname) of a compute instance.
    async fn public_address(&self, instance_id: &str) -> Result<String>;

    /// Prepare storage in the customer account reachable through `role_arn`
    /// and return the bucket deployments should use.
    async fn initialize_resources(
        &self,
        role_arn: &str,
        external_id: &str,
        region: &str,
    ) -> Result<String>;
}

/// Cloud provider backed by configuration: instance addresses come from a
/// static table and bucket names are derived deterministically.
pub struct StaticCloud {
    addresses: HashMap<String, String>,
    bucket_prefix: String,
}

impl StaticCloud {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            addresses: config.cloud.instance_addresses.clone(),
            bucket_prefix: config.cloud.bucket_prefix.clone(),
        }
    }
}

/// Account id segment of `arn:aws:iam::{account}:role/{name}`.
pub fn account_from_arn(role_arn: &str) -> Option<&str> {
    role_arn.split(':').nth(4).filter(|s| !s.is_empty())
}

/// `{prefix}-{account}-{region}`, lowercased and restricted to bucket-safe
/// characters.
pub fn bucket_name(prefix: &str, account: &str, region: &str) -> String {
    format!("{prefix}-{account}-{region}")
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

#[async_trait]
impl CloudProvider for StaticCloud {
    async fn public_address(&self, instance_id: &str) -> Result<String> {
        self.addresses
            .get(instance_id)
            .cloned()
            .ok_or_else(|| ShipyardError::Cloud(format!("no address known for instance {instance_id}")))
    }

    async fn initialize_resources(
        &self,
        role_arn: &str,
        external_id: &str,
        region: &str,
    ) -> Result<String> {
        let account = account_from_arn(role_arn)
            .ok_or_else(|| ShipyardError::Cloud(format!("malformed role arn: {role_arn}")))?;
        let bucket = bucket_name(&self.bucket_prefix, account, region);
        tracing::info!(
            role_arn,
            external_id_set = !external_id.is_empty(),
            region,
            bucket = %bucket,
            "derived bucket name; no provisioning performed"
        );
        Ok(bucket)
    }
}
