use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use jenkins_client::JenkinsClient;
use shipyard_core::config::ServiceConfig;
use shipyard_core::store::Store;
use shipyard_core::{Result, ShipyardError};

use crate::cloud::CloudProvider;
use crate::webhook::WebhookRegistrar;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub store: Store,
    pub jenkins: JenkinsClient,
    pub cloud: Arc<dyn CloudProvider>,
    pub webhooks: Arc<dyn WebhookRegistrar>,
    pub leases: Leases,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        store: Store,
        cloud: Arc<dyn CloudProvider>,
        webhooks: Arc<dyn WebhookRegistrar>,
    ) -> Result<Self> {
        let jenkins = JenkinsClient::new(config.ci.credentials(), config.ci.poll_settings())?;
        Ok(Self {
            config: Arc::new(config),
            store,
            jenkins,
            cloud,
            webhooks,
            leases: Leases::default(),
        })
    }

    /// Run blocking store work off the async executor.
    pub async fn db<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Store) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| ShipyardError::Store(format!("task join error: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// In-flight orchestration leases
// ---------------------------------------------------------------------------

/// Keys of orchestrations currently running. At most one orchestration per
/// key; a second caller is turned away instead of queueing.
#[derive(Clone, Default)]
pub struct Leases {
    held: Arc<Mutex<HashSet<String>>>,
}

impl Leases {
    /// Take the lease for `key` or fail with `OrchestrationInProgress`.
    /// The lease is released when the returned guard is dropped, including
    /// when the request future is cancelled.
    pub fn acquire(&self, key: impl Into<String>) -> Result<LeaseGuard> {
        let key = key.into();
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if !held.insert(key.clone()) {
            tracing::warn!(key = %key, "orchestration already running");
            return Err(ShipyardError::OrchestrationInProgress(key));
        }
        Ok(LeaseGuard {
            key,
            held: self.held.clone(),
        })
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

#[must_use = "the lease is released when the guard is dropped"]
pub struct LeaseGuard {
    key: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}
