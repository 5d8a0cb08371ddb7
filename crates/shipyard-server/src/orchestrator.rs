//! Deployment workflows.
//!
//! Every mutation follows the same shape:
//!
//! ```text
//! lease ─► store reads + gates ─► bucket ─► BuildRequest
//!       ─► CI address ─► probe ─► trigger ─► queue resolution ─► store write
//! ```
//!
//! Gates (free tier, deployment quota) run before any external call. A
//! record is written only after the queue resolves to a build number; a
//! failed orchestration leaves the stored record exactly as it was.
//!
//! Each workflow runs on its own task, lease included. The handler only
//! awaits the join handle, so a client that disconnects mid-poll does not
//! stop a triggered build from being recorded.

use std::future::Future;

use chrono::Utc;
use jenkins_client::{BuildNumber, BuildRequest, BuildStatus, CiJob};
use serde::Serialize;
use tracing::{info, warn};

use shipyard_core::config::CiConfig;
use shipyard_core::model::{
    new_id, Application, ApplicationSpec, ApplicationUpdate, Cluster, ClusterSpec, ClusterUpdate,
    User,
};
use shipyard_core::params::{ApplicationParams, ClusterParams};
use shipyard_core::quota;
use shipyard_core::store::{Document, Store};
use shipyard_core::{Result, ShipyardError};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Deployment records
// ---------------------------------------------------------------------------

/// A record that owns a pipeline build.
pub trait Deployment: Document + Clone {
    fn job_name(ci: &CiConfig) -> &str;
    fn build_number(&self) -> Option<&BuildNumber>;
    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);
}

impl Deployment for Cluster {
    fn job_name(ci: &CiConfig) -> &str {
        &ci.cluster_job
    }

    fn build_number(&self) -> Option<&BuildNumber> {
        self.build_number.as_ref()
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.updated_at = Utc::now();
    }
}

impl Deployment for Application {
    fn job_name(ci: &CiConfig) -> &str {
        &ci.application_job
    }

    fn build_number(&self) -> Option<&BuildNumber> {
        self.build_number.as_ref()
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.updated_at = Utc::now();
    }
}

/// Lease key guarding orchestrations on one record.
pub fn record_key<D: Document>(id: &str) -> String {
    format!("{}:{id}", D::COLLECTION.kind())
}

fn create_key<D: Document>(owner: &str) -> String {
    format!("{}:create:{owner}", D::COLLECTION.kind())
}

// ---------------------------------------------------------------------------
// CI plumbing
// ---------------------------------------------------------------------------

/// Resolve the Jenkins base URL for this call and confirm it answers.
///
/// The address is looked up every time because the instance's public
/// address changes across restarts.
pub async fn ci_base(state: &AppState) -> Result<String> {
    let ci = &state.config.ci;
    let base = match (&ci.base_url, &ci.instance_id) {
        (Some(url), _) => url.trim_end_matches('/').to_string(),
        (None, Some(instance)) => match state.cloud.public_address(instance).await {
            Ok(addr) => format!("http://{addr}:{}", ci.port),
            Err(e) => {
                warn!(instance = %instance, error = %e, "jenkins address lookup failed");
                return Err(ShipyardError::InvalidCiUrl);
            }
        },
        (None, None) => {
            warn!("no jenkins address configured");
            return Err(ShipyardError::InvalidCiUrl);
        }
    };

    if let Err(e) = state.jenkins.probe(&base).await {
        warn!(base = %base, error = %e, "jenkins unreachable");
        return Err(ShipyardError::InvalidCiUrl);
    }
    Ok(base)
}

pub async fn ci_job<D: Deployment>(state: &AppState) -> Result<CiJob> {
    let base = ci_base(state).await?;
    Ok(CiJob::new(base, D::job_name(&state.config.ci)))
}

/// Trigger a build and wait for its build number.
async fn run_build<D: Deployment>(state: &AppState, request: &BuildRequest) -> Result<BuildNumber> {
    let job = ci_job::<D>(state).await?;
    let item = state
        .jenkins
        .trigger(&job, request)
        .await
        .map_err(ShipyardError::TriggerFailed)?;
    state
        .jenkins
        .resolve_queue_item(job.base_url(), item.as_ref())
        .await
        .ok_or(ShipyardError::BuildNumberNotFound)
}

/// Run `workflow` on a spawned task and wait for its result.
async fn detached<T, Fut>(state: &AppState, workflow: impl FnOnce(AppState) -> Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(workflow(state.clone()))
        .await
        .map_err(|e| ShipyardError::Store(format!("orchestration task join error: {e}")))?
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

/// Charge one deployment to `owner`, persisting the counter before any
/// external work starts.
fn charge(store: &Store, owner: &str, per_month: u32) -> Result<User> {
    let mut user: User = store.require(owner)?;
    quota::charge_deployment(&mut user, Utc::now(), per_month)?;
    store.update(&mut user)?;
    Ok(user)
}

fn check_version(kind: &'static str, id: &str, stored: u64, presented: Option<u64>) -> Result<()> {
    match presented {
        Some(v) if v != stored => Err(ShipyardError::VersionConflict {
            kind,
            id: id.to_string(),
        }),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Clusters
// ---------------------------------------------------------------------------

pub async fn create_cluster(state: &AppState, spec: ClusterSpec) -> Result<Cluster> {
    detached(state, move |state| async move {
        create_cluster_task(&state, spec).await
    })
    .await
}

async fn create_cluster_task(state: &AppState, spec: ClusterSpec) -> Result<Cluster> {
    let _lease = state.leases.acquire(create_key::<Cluster>(&spec.owner_id))?;

    let owner = spec.owner_id.clone();
    let billing = state.config.billing.clone();
    let user = state
        .db(move |store| {
            let user: User = store.require(&owner)?;
            let owned = store.count_owned::<Cluster>(&owner)?;
            quota::check_free_tier(
                &user,
                &billing.free_code,
                billing.free_tier_limit,
                owned,
                "cluster",
            )?;
            charge(store, &owner, billing.monthly_deploy_allowance)
        })
        .await?;

    let role_arn = state.config.cloud.role_arn(&spec.account_id);
    let bucket = state
        .cloud
        .initialize_resources(&role_arn, &spec.external_id, &spec.region)
        .await?;

    let github_username = user.github_username();
    let request = ClusterParams {
        spec: &spec,
        role_arn: &role_arn,
        bucket_name: &bucket,
    }
    .apply(&github_username);
    let number = run_build::<Cluster>(state, &request).await?;

    let mut cluster = Cluster::create(spec, github_username, bucket, number, Utc::now());
    let cluster = state
        .db(move |store| {
            store.insert(&mut cluster)?;
            Ok(cluster)
        })
        .await?;
    info!(cluster = %cluster.cluster_id, build = ?cluster.build_number, "cluster created");
    Ok(cluster)
}

pub async fn update_cluster(state: &AppState, id: &str, update: ClusterUpdate) -> Result<Cluster> {
    let id = id.to_string();
    detached(state, move |state| async move {
        update_cluster_task(&state, &id, update).await
    })
    .await
}

async fn update_cluster_task(state: &AppState, id: &str, update: ClusterUpdate) -> Result<Cluster> {
    let _lease = state.leases.acquire(record_key::<Cluster>(id))?;

    let id_owned = id.to_string();
    let per_month = state.config.billing.monthly_deploy_allowance;
    let (mut cluster, user) = state
        .db(move |store| {
            let cluster: Cluster = store.require(&id_owned)?;
            check_version("cluster", &id_owned, cluster.version, update.version)?;
            let user = charge(store, &cluster.spec.owner_id, per_month)?;
            let mut cluster = cluster;
            cluster.apply_update(&update);
            Ok((cluster, user))
        })
        .await?;

    let role_arn = state.config.cloud.role_arn(&cluster.spec.account_id);
    let bucket = state
        .cloud
        .initialize_resources(&role_arn, &cluster.spec.external_id, &cluster.spec.region)
        .await?;
    let github_username = user.github_username();
    let request = ClusterParams {
        spec: &cluster.spec,
        role_arn: &role_arn,
        bucket_name: &bucket,
    }
    .apply(&github_username);
    let number = run_build::<Cluster>(state, &request).await?;

    cluster.github_username = github_username;
    cluster.bucket_name = Some(bucket);
    cluster.build_number = Some(number);
    cluster.set_active(false);
    let cluster = state
        .db(move |store| {
            store.update(&mut cluster)?;
            Ok(cluster)
        })
        .await?;
    info!(cluster = %cluster.cluster_id, build = ?cluster.build_number, "cluster updated");
    Ok(cluster)
}

/// Tear a cluster down. The record is removed only once the destroy build
/// has a build number.
pub async fn delete_cluster(state: &AppState, id: &str) -> Result<BuildNumber> {
    let id = id.to_string();
    detached(state, move |state| async move {
        delete_cluster_task(&state, &id).await
    })
    .await
}

async fn delete_cluster_task(state: &AppState, id: &str) -> Result<BuildNumber> {
    let _lease = state.leases.acquire(record_key::<Cluster>(id))?;

    let id_owned = id.to_string();
    let cluster: Cluster = state.db(move |store| store.require(&id_owned)).await?;

    let role_arn = state.config.cloud.role_arn(&cluster.spec.account_id);
    let bucket = match &cluster.bucket_name {
        Some(b) => b.clone(),
        None => {
            state
                .cloud
                .initialize_resources(&role_arn, &cluster.spec.external_id, &cluster.spec.region)
                .await?
        }
    };
    let request = ClusterParams {
        spec: &cluster.spec,
        role_arn: &role_arn,
        bucket_name: &bucket,
    }
    .destroy();
    let number = run_build::<Cluster>(state, &request).await?;

    let id_owned = id.to_string();
    state
        .db(move |store| store.delete::<Cluster>(&id_owned))
        .await?;
    info!(cluster = %id, build = %number, "cluster deleted");
    Ok(number)
}

// ---------------------------------------------------------------------------
// Applications
// ---------------------------------------------------------------------------

/// Bucket an application deploys into: the cluster's, bootstrapping it
/// when the cluster has none recorded yet.
async fn application_bucket(state: &AppState, cluster: &Cluster) -> Result<String> {
    if let Some(bucket) = &cluster.bucket_name {
        return Ok(bucket.clone());
    }
    let role_arn = state.config.cloud.role_arn(&cluster.spec.account_id);
    state
        .cloud
        .initialize_resources(&role_arn, &cluster.spec.external_id, &cluster.spec.region)
        .await
}

fn cluster_name(spec: &ApplicationSpec) -> &str {
    spec.cluster_name.as_deref().unwrap_or(&spec.cluster_id)
}

pub async fn create_application(state: &AppState, spec: ApplicationSpec) -> Result<Application> {
    detached(state, move |state| async move {
        create_application_task(&state, spec).await
    })
    .await
}

async fn create_application_task(state: &AppState, spec: ApplicationSpec) -> Result<Application> {
    let _lease = state.leases.acquire(create_key::<Application>(&spec.owner_id))?;

    let owner = spec.owner_id.clone();
    let cluster_id = spec.cluster_id.clone();
    let per_month = state.config.billing.monthly_deploy_allowance;
    let cluster = state
        .db(move |store| {
            store.require::<User>(&owner)?;
            let cluster: Cluster = store.require(&cluster_id)?;
            charge(store, &owner, per_month)?;
            Ok(cluster)
        })
        .await?;

    let mut spec = spec;
    if spec.cluster_name.is_none() {
        spec.cluster_name = Some(cluster.spec.name.clone());
    }
    let bucket = application_bucket(state, &cluster).await?;
    let role_arn = state.config.cloud.role_arn(&spec.account_id);
    let application_id = new_id();
    let request = ApplicationParams {
        spec: &spec,
        role_arn: &role_arn,
        cluster_name: cluster_name(&spec),
    }
    .apply(&bucket);
    let number = run_build::<Application>(state, &request).await?;

    let mut app = Application::create(application_id, spec, Some(bucket), number, Utc::now());
    let mut app = state
        .db(move |store| {
            store.insert(&mut app)?;
            Ok(app)
        })
        .await?;
    info!(application = %app.application_id, build = ?app.build_number, "application created");

    let Some(token) = app.spec.github_token.clone() else {
        warn!(application = %app.application_id, "no github token; push webhook not registered");
        return Ok(app);
    };
    match state
        .webhooks
        .register(
            &token,
            &app.spec.username_github,
            &app.spec.git_repository,
            &app.application_id,
        )
        .await
    {
        Ok(hook_id) => {
            app.webhook_id = Some(hook_id);
            app = state
                .db(move |store| {
                    store.update(&mut app)?;
                    Ok(app)
                })
                .await?;
        }
        Err(e) => {
            warn!(application = %app.application_id, error = %e, "webhook registration failed");
        }
    }
    Ok(app)
}

pub async fn update_application(
    state: &AppState,
    id: &str,
    update: ApplicationUpdate,
) -> Result<Application> {
    let id = id.to_string();
    detached(state, move |state| async move {
        update_application_task(&state, &id, update).await
    })
    .await
}

async fn update_application_task(
    state: &AppState,
    id: &str,
    update: ApplicationUpdate,
) -> Result<Application> {
    let _lease = state.leases.acquire(record_key::<Application>(id))?;

    let id_owned = id.to_string();
    let per_month = state.config.billing.monthly_deploy_allowance;
    let (mut app, cluster) = state
        .db(move |store| {
            let mut app: Application = store.require(&id_owned)?;
            check_version("application", &id_owned, app.version, update.version)?;
            app.apply_update(&update);
            let cluster: Cluster = store.require(&app.spec.cluster_id)?;
            if app.spec.cluster_name.is_none() {
                app.spec.cluster_name = Some(cluster.spec.name.clone());
            }
            charge(store, &app.spec.owner_id, per_month)?;
            Ok((app, cluster))
        })
        .await?;

    let bucket = application_bucket(state, &cluster).await?;
    let role_arn = state.config.cloud.role_arn(&app.spec.account_id);
    let request = ApplicationParams {
        spec: &app.spec,
        role_arn: &role_arn,
        cluster_name: cluster_name(&app.spec),
    }
    .apply(&bucket);
    let number = run_build::<Application>(state, &request).await?;

    app.bucket_name = Some(bucket);
    app.build_number = Some(number);
    app.set_active(false);
    let app = state
        .db(move |store| {
            store.update(&mut app)?;
            Ok(app)
        })
        .await?;
    info!(application = %app.application_id, build = ?app.build_number, "application updated");
    Ok(app)
}

pub async fn delete_application(state: &AppState, id: &str) -> Result<BuildNumber> {
    let id = id.to_string();
    detached(state, move |state| async move {
        delete_application_task(&state, &id).await
    })
    .await
}

async fn delete_application_task(state: &AppState, id: &str) -> Result<BuildNumber> {
    let _lease = state.leases.acquire(record_key::<Application>(id))?;

    let id_owned = id.to_string();
    let app: Application = state.db(move |store| store.require(&id_owned)).await?;

    if let (Some(hook_id), Some(token)) = (&app.webhook_id, &app.spec.github_token) {
        if let Err(e) = state
            .webhooks
            .remove(
                token,
                &app.spec.username_github,
                &app.spec.git_repository,
                hook_id,
            )
            .await
        {
            warn!(application = %id, hook_id = %hook_id, error = %e, "webhook removal failed");
        }
    }

    let role_arn = state.config.cloud.role_arn(&app.spec.account_id);
    let request = ApplicationParams {
        spec: &app.spec,
        role_arn: &role_arn,
        cluster_name: cluster_name(&app.spec),
    }
    .destroy();
    let number = run_build::<Application>(state, &request).await?;

    let id_owned = id.to_string();
    state
        .db(move |store| store.delete::<Application>(&id_owned))
        .await?;
    info!(application = %id, build = %number, "application deleted");
    Ok(number)
}

/// Rebuild an application from its stored definition after a source push.
/// Not charged against the owner's deployment quota.
pub async fn redeploy_application(state: &AppState, id: &str) -> Result<BuildNumber> {
    let id = id.to_string();
    detached(state, move |state| async move {
        redeploy_application_task(&state, &id).await
    })
    .await
}

async fn redeploy_application_task(state: &AppState, id: &str) -> Result<BuildNumber> {
    let _lease = state.leases.acquire(record_key::<Application>(id))?;

    let id_owned = id.to_string();
    let (mut app, cluster) = state
        .db(move |store| {
            let app: Application = store.require(&id_owned)?;
            let cluster: Option<Cluster> = store.get(&app.spec.cluster_id)?;
            Ok((app, cluster))
        })
        .await?;

    let bucket = match (&cluster, &app.bucket_name) {
        (Some(c), _) => application_bucket(state, c).await?,
        (None, Some(b)) => b.clone(),
        (None, None) => {
            return Err(ShipyardError::NotFound {
                kind: "cluster",
                id: app.spec.cluster_id.clone(),
            })
        }
    };
    let role_arn = state.config.cloud.role_arn(&app.spec.account_id);
    let request = ApplicationParams {
        spec: &app.spec,
        role_arn: &role_arn,
        cluster_name: cluster_name(&app.spec),
    }
    .apply(&bucket);
    let number = run_build::<Application>(state, &request).await?;

    app.build_number = Some(number.clone());
    app.set_active(false);
    state
        .db(move |store| store.update(&mut app))
        .await?;
    info!(application = %id, build = %number, "application redeployed from push");
    Ok(number)
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub build_number: BuildNumber,
    pub status: BuildStatus,
    pub is_active: bool,
}

/// Load a record and the build it currently points at.
pub async fn current_build<D: Deployment>(state: &AppState, id: &str) -> Result<(D, BuildNumber)> {
    let id_owned = id.to_string();
    let record: D = state.db(move |store| store.require(&id_owned)).await?;
    let number = record
        .build_number()
        .cloned()
        .ok_or_else(|| ShipyardError::NoBuildRecorded(format!("{} {id}", D::COLLECTION.kind())))?;
    Ok((record, number))
}

/// Poll the record's build and persist the derived `is_active`.
///
/// Writes on every poll unless `ci.persist_status_on_change_only` is set.
/// While an orchestration holds the record's lease the write is skipped;
/// that orchestration is about to replace the build number anyway.
pub async fn build_status<D: Deployment>(state: &AppState, id: &str) -> Result<StatusReport> {
    let job = ci_job::<D>(state).await?;
    let (mut record, number) = current_build::<D>(state, id).await?;

    let status = state.jenkins.build_status(&job, &number).await?;
    let active = status.is_active();

    let changed = record.is_active() != active;
    let write = changed || !state.config.ci.persist_status_on_change_only;
    if write && !state.leases.is_held(&record_key::<D>(id)) {
        record.set_active(active);
        let outcome = state.db(move |store| store.update(&mut record)).await;
        match outcome {
            Ok(()) => {}
            Err(ShipyardError::VersionConflict { .. }) => {
                warn!(id, "record changed during status poll; status not persisted");
            }
            Err(e) => return Err(e),
        }
    }

    info!(id, build = %number, status = %status, "build status");
    Ok(StatusReport {
        build_number: number,
        status,
        is_active: active,
    })
}
