use chrono::{DateTime, Utc};
use jenkins_client::BuildNumber;
use serde::{Deserialize, Serialize};

use crate::store::{Collection, Document};

/// Short random identifier for new records.
pub fn new_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(10);
    id
}

const REDACTED: &str = "********";

fn redact(value: &mut Option<String>) {
    if value.as_deref().is_some_and(|v| !v.is_empty()) {
        *value = Some(REDACTED.to_string());
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
    /// Billing plan code; compared against `billing.free_code`.
    #[serde(default)]
    pub billing: String,
    /// Deployments started so far.
    #[serde(default)]
    pub deployment: u32,
    pub member_since: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(default)]
    pub user_id: Option<String>,
    pub user_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub billing: String,
    #[serde(default)]
    pub member_since: Option<DateTime<Utc>>,
}

impl User {
    pub fn create(req: NewUser, now: DateTime<Utc>) -> Self {
        Self {
            user_id: req.user_id.unwrap_or_else(new_id),
            user_name: req.user_name,
            email: req.email,
            role: req.role,
            billing: req.billing,
            deployment: 0,
            member_since: req.member_since.unwrap_or(now),
            version: 0,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_free_tier(&self, free_code: &str) -> bool {
        self.billing == free_code
    }

    /// Source-control login used by cluster pipelines.
    pub fn github_username(&self) -> String {
        self.user_name.to_lowercase()
    }
}

// ---------------------------------------------------------------------------
// Organization / Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub org_id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrganization {
    pub name: String,
    pub owner_id: String,
}

impl Organization {
    pub fn create(req: NewOrganization, now: DateTime<Utc>) -> Self {
        Self {
            org_id: new_id(),
            name: req.name,
            owner_id: req.owner_id,
            created_at: now,
            version: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub proj_id: String,
    pub name: String,
    #[serde(default)]
    pub org_id: Option<String>,
    /// Owning user.
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub org_id: Option<String>,
    pub user_id: String,
}

impl Project {
    pub fn create(req: NewProject, now: DateTime<Utc>) -> Self {
        Self {
            proj_id: new_id(),
            name: req.name,
            org_id: req.org_id,
            user_id: req.user_id,
            created_at: now,
            version: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

fn default_cloud() -> String {
    "aws".to_string()
}

/// Client-supplied description of a cluster deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    pub name: String,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    pub region: String,
    pub owner_id: String,
    /// Customer cloud account the deployment role lives in.
    pub account_id: String,
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub min: u32,
    #[serde(default)]
    pub max: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub iscredentials: bool,
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub disk_size: Option<u32>,
    #[serde(default)]
    pub node_autoscaling: bool,
    #[serde(default)]
    pub vpc_subnet: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub proj_id: Option<String>,
}

/// Fields a cluster update may override; everything else is kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterUpdate {
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub description: Option<String>,
    pub iscredentials: Option<bool>,
    pub credentials: Option<String>,
    pub environment: Option<String>,
    pub instance_type: Option<String>,
    pub disk_size: Option<u32>,
    pub node_autoscaling: Option<bool>,
    pub vpc_subnet: Option<String>,
    /// Version the client last read. Omit to update whatever is stored.
    pub version: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub cluster_id: String,
    #[serde(flatten)]
    pub spec: ClusterSpec,
    #[serde(default)]
    pub github_username: String,
    #[serde(default)]
    pub bucket_name: Option<String>,
    #[serde(default)]
    pub build_number: Option<BuildNumber>,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Cluster {
    pub fn create(
        spec: ClusterSpec,
        github_username: String,
        bucket_name: String,
        build_number: BuildNumber,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            cluster_id: new_id(),
            spec,
            github_username,
            bucket_name: Some(bucket_name),
            build_number: Some(build_number),
            is_active: false,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn apply_update(&mut self, update: &ClusterUpdate) {
        let spec = &mut self.spec;
        if let Some(v) = update.min {
            spec.min = v;
        }
        if let Some(v) = update.max {
            spec.max = v;
        }
        if let Some(v) = update.iscredentials {
            spec.iscredentials = v;
        }
        if let Some(v) = update.node_autoscaling {
            spec.node_autoscaling = v;
        }
        if let Some(v) = update.disk_size {
            spec.disk_size = Some(v);
        }
        for (slot, value) in [
            (&mut spec.description, &update.description),
            (&mut spec.credentials, &update.credentials),
            (&mut spec.environment, &update.environment),
            (&mut spec.instance_type, &update.instance_type),
            (&mut spec.vpc_subnet, &update.vpc_subnet),
        ] {
            if value.is_some() {
                slot.clone_from(value);
            }
        }
    }

    /// Copy safe to return to API clients.
    pub fn redacted(mut self) -> Self {
        redact(&mut self.spec.secret_access_key);
        redact(&mut self.spec.credentials);
        self
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

fn default_replicas() -> u32 {
    1
}

fn default_branch() -> String {
    "main".to_string()
}

/// Client-supplied description of an application deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub app_name: String,
    pub git_repository: String,
    #[serde(default)]
    pub git_path: Option<String>,
    #[serde(default)]
    pub repo_type: Option<String>,
    #[serde(default)]
    pub root_path: Option<String>,
    #[serde(default = "default_branch")]
    pub git_branch: String,
    pub region: String,
    pub cluster_id: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub proj_id: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default)]
    pub install_id: Option<String>,
    /// Mebibytes.
    pub memory: u32,
    /// Millicores.
    pub cpu: u32,
    #[serde(default)]
    pub env_variables: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub build_mode: Option<String>,
    pub port: u16,
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub is_installed: bool,
    pub username_github: String,
    pub account_id: String,
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub registry: Option<String>,
    pub owner_id: String,
    #[serde(default)]
    pub github_token: Option<String>,
}

/// Fields an application update may override; everything else is kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationUpdate {
    pub cluster_id: Option<String>,
    pub install_id: Option<String>,
    pub replicas: Option<u32>,
    pub memory: Option<u32>,
    pub cpu: Option<u32>,
    pub port: Option<u16>,
    pub git_branch: Option<String>,
    pub env_variables: Option<serde_json::Map<String, serde_json::Value>>,
    pub github_token: Option<String>,
    pub version: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub application_id: String,
    #[serde(flatten)]
    pub spec: ApplicationSpec,
    #[serde(default)]
    pub bucket_name: Option<String>,
    #[serde(default)]
    pub build_number: Option<BuildNumber>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub webhook_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Application {
    /// Build a record with a pre-allocated id. The id is needed before the
    /// record is stored because the push webhook callback embeds it.
    pub fn create(
        application_id: String,
        spec: ApplicationSpec,
        bucket_name: Option<String>,
        build_number: BuildNumber,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            application_id,
            spec,
            bucket_name,
            build_number: Some(build_number),
            is_active: false,
            webhook_id: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn apply_update(&mut self, update: &ApplicationUpdate) {
        let spec = &mut self.spec;
        if let Some(v) = &update.cluster_id {
            if *v != spec.cluster_id {
                // Stale once the app moves; re-derived from the new cluster.
                spec.cluster_name = None;
            }
            spec.cluster_id.clone_from(v);
        }
        if let Some(v) = &update.git_branch {
            spec.git_branch.clone_from(v);
        }
        if let Some(v) = update.replicas {
            spec.replicas = v;
        }
        if let Some(v) = update.memory {
            spec.memory = v;
        }
        if let Some(v) = update.cpu {
            spec.cpu = v;
        }
        if let Some(v) = update.port {
            spec.port = v;
        }
        if let Some(v) = &update.env_variables {
            spec.env_variables.clone_from(v);
        }
        if update.install_id.is_some() {
            spec.install_id.clone_from(&update.install_id);
        }
        if update.github_token.is_some() {
            spec.github_token.clone_from(&update.github_token);
        }
    }

    pub fn redacted(mut self) -> Self {
        redact(&mut self.spec.github_token);
        self
    }
}

// ---------------------------------------------------------------------------
// Document impls
// ---------------------------------------------------------------------------

macro_rules! document {
    (@impl $ty:ty, $collection:expr, $id:ident, |$this:ident| $owner:expr) => {
        impl Document for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> &str {
                &self.$id
            }

            fn owner(&self) -> Option<&str> {
                let $this = self;
                $owner
            }

            fn version(&self) -> u64 {
                self.version
            }

            fn set_version(&mut self, version: u64) {
                self.version = version;
            }
        }
    };
    ($ty:ty, $collection:expr, $id:ident) => {
        document!(@impl $ty, $collection, $id, |_this| None);
    };
    ($ty:ty, $collection:expr, $id:ident, owner = $($owner:ident).+) => {
        document!(@impl $ty, $collection, $id, |this| Some(this.$($owner).+.as_str()));
    };
}

document!(User, Collection::Users, user_id);
document!(Organization, Collection::Organizations, org_id, owner = owner_id);
document!(Project, Collection::Projects, proj_id, owner = user_id);
document!(Cluster, Collection::Clusters, cluster_id, owner = spec.owner_id);
document!(Application, Collection::Applications, application_id, owner = spec.owner_id);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cluster_spec() -> ClusterSpec {
        serde_json::from_value(json!({
            "name": "prod",
            "region": "us-east-1",
            "ownerId": "u1",
            "accountId": "123456789012",
            "externalId": "ext",
            "secretAccessKey": "shh",
            "min": 1,
            "max": 3
        }))
        .unwrap()
    }

    #[test]
    fn ids_are_short_and_unique() {
        let a = new_id();
        let b = new_id();
        assert_eq!(a.len(), 10);
        assert_ne!(a, b);
    }

    #[test]
    fn cluster_spec_defaults() {
        let spec = cluster_spec();
        assert_eq!(spec.cloud, "aws");
        assert!(!spec.node_autoscaling);
        assert_eq!(spec.disk_size, None);
    }

    #[test]
    fn cluster_update_overrides_only_given_fields() {
        let now = Utc::now();
        let mut cluster = Cluster::create(
            cluster_spec(),
            "alice".into(),
            "bucket".into(),
            BuildNumber::parse("1").unwrap(),
            now,
        );
        cluster.apply_update(&ClusterUpdate {
            max: Some(9),
            description: Some("bigger".into()),
            ..Default::default()
        });
        assert_eq!(cluster.spec.min, 1);
        assert_eq!(cluster.spec.max, 9);
        assert_eq!(cluster.spec.description.as_deref(), Some("bigger"));
        assert_eq!(cluster.spec.name, "prod");
    }

    #[test]
    fn cluster_serializes_flat() {
        let cluster = Cluster::create(
            cluster_spec(),
            "alice".into(),
            "bucket".into(),
            BuildNumber::parse("12").unwrap(),
            Utc::now(),
        );
        let value = serde_json::to_value(&cluster).unwrap();
        assert_eq!(value["name"], "prod");
        assert_eq!(value["buildNumber"], "12");
        assert_eq!(value["isActive"], false);
        let back: Cluster = serde_json::from_value(value).unwrap();
        assert_eq!(back.spec.region, "us-east-1");
    }

    #[test]
    fn redaction_hides_secrets() {
        let cluster = Cluster::create(
            cluster_spec(),
            "alice".into(),
            "bucket".into(),
            BuildNumber::parse("1").unwrap(),
            Utc::now(),
        )
        .redacted();
        assert_eq!(cluster.spec.secret_access_key.as_deref(), Some(REDACTED));
        assert_eq!(cluster.spec.credentials, None);
    }

    #[test]
    fn application_update_merges() {
        let spec: ApplicationSpec = serde_json::from_value(json!({
            "appName": "web",
            "gitRepository": "site",
            "region": "us-east-1",
            "clusterId": "c1",
            "memory": 256,
            "cpu": 250,
            "port": 8080,
            "usernameGithub": "alice",
            "accountId": "123",
            "ownerId": "u1"
        }))
        .unwrap();
        assert_eq!(spec.git_branch, "main");
        assert_eq!(spec.replicas, 1);

        let mut app = Application::create(
            new_id(),
            spec,
            None,
            BuildNumber::parse("3").unwrap(),
            Utc::now(),
        );
        app.apply_update(&ApplicationUpdate {
            memory: Some(512),
            env_variables: Some(json!({"A": "1"}).as_object().unwrap().clone()),
            ..Default::default()
        });
        assert_eq!(app.spec.memory, 512);
        assert_eq!(app.spec.cpu, 250);
        assert_eq!(app.spec.env_variables["A"], "1");
    }

    #[test]
    fn moving_clusters_drops_stale_cluster_name() {
        let spec: ApplicationSpec = serde_json::from_value(json!({
            "appName": "web",
            "gitRepository": "site",
            "region": "us-east-1",
            "clusterId": "c1",
            "clusterName": "prod",
            "memory": 256,
            "cpu": 250,
            "port": 8080,
            "usernameGithub": "alice",
            "accountId": "123",
            "ownerId": "u1"
        }))
        .unwrap();
        let mut app = Application::create(
            new_id(),
            spec,
            None,
            BuildNumber::parse("3").unwrap(),
            Utc::now(),
        );

        app.apply_update(&ApplicationUpdate {
            cluster_id: Some("c1".into()),
            ..Default::default()
        });
        assert_eq!(app.spec.cluster_name.as_deref(), Some("prod"));

        app.apply_update(&ApplicationUpdate {
            cluster_id: Some("c2".into()),
            ..Default::default()
        });
        assert_eq!(app.spec.cluster_id, "c2");
        assert_eq!(app.spec.cluster_name, None);
    }

    #[test]
    fn free_tier_and_admin_flags() {
        let user = User::create(
            NewUser {
                user_id: Some("u1".into()),
                user_name: "Alice".into(),
                email: String::new(),
                role: Role::Admin,
                billing: "free".into(),
                member_since: None,
            },
            Utc::now(),
        );
        assert!(user.is_admin());
        assert!(user.is_free_tier("free"));
        assert_eq!(user.github_username(), "alice");
    }
}
