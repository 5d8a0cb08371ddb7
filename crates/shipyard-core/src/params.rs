//! Typed build parameters for the deploy pipelines.
//!
//! Each pipeline reads a fixed set of named parameters. The builders here
//! spell those sets out per record kind and action so the field list is
//! visible in one place instead of being assembled ad hoc in handlers.

use jenkins_client::{BuildAction, BuildRequest};

use crate::model::{ApplicationSpec, ClusterSpec};

/// Login passed to the cluster pipeline on teardown, where no user context
/// is needed.
pub const DESTROY_GITHUB_USERNAME: &str = "default";

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

pub struct ApplicationParams<'a> {
    pub spec: &'a ApplicationSpec,
    pub role_arn: &'a str,
    pub cluster_name: &'a str,
}

impl ApplicationParams<'_> {
    /// `ACTION=Apply`. Memory and CPU carry their Kubernetes unit suffixes.
    pub fn apply(&self, bucket_name: &str) -> BuildRequest {
        let s = self.spec;
        self.source(BuildAction::Apply)
            .param("replicas", s.replicas)
            .param_opt("installId", s.install_id.as_deref())
            .param("memory", format!("{}Mi", s.memory))
            .param(
                "envVariables",
                serde_json::Value::Object(s.env_variables.clone()),
            )
            .param("cpu", format!("{}m", s.cpu))
            .param_opt("buildMode", s.build_mode.as_deref())
            .param("port", u32::from(s.port))
            .param_opt("env", s.env.as_deref())
            .param("isInstalled", s.is_installed)
            .param("username_github", s.username_github.as_str())
            .param("arn", self.role_arn)
            .param("bucketName", bucket_name)
            .param("clusterName", self.cluster_name)
            .param("external_id", s.external_id.as_str())
            .param_opt("registry", s.registry.as_deref())
            .param("ownerId", s.owner_id.as_str())
            .param_opt("github_token", s.github_token.as_deref())
    }

    /// `ACTION=Destroy`. Raw resource figures; no bucket or environment.
    pub fn destroy(&self) -> BuildRequest {
        let s = self.spec;
        self.source(BuildAction::Destroy)
            .param("replicas", s.replicas)
            .param_opt("installId", s.install_id.as_deref())
            .param("memory", s.memory)
            .param("cpu", s.cpu)
            .param_opt("buildMode", s.build_mode.as_deref())
            .param("port", u32::from(s.port))
            .param_opt("env", s.env.as_deref())
            .param("username_github", s.username_github.as_str())
            .param("arn", self.role_arn)
            .param("clusterName", self.cluster_name)
            .param("external_id", s.external_id.as_str())
            .param_opt("registry", s.registry.as_deref())
            .param("ownerId", s.owner_id.as_str())
            .param_opt("github_token", s.github_token.as_deref())
    }

    fn source(&self, action: BuildAction) -> BuildRequest {
        let s = self.spec;
        BuildRequest::new(action)
            .param("appName", s.app_name.as_str())
            .param("gitRepository", s.git_repository.as_str())
            .param_opt("gitPath", s.git_path.as_deref())
            .param_opt("repoType", s.repo_type.as_deref())
            .param_opt("rootPath", s.root_path.as_deref())
            .param("gitBranch", s.git_branch.as_str())
            .param("region", s.region.as_str())
            .param("clusterId", s.cluster_id.as_str())
            .param_opt("projId", s.proj_id.as_deref())
            .param_opt("orgId", s.org_id.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

pub struct ClusterParams<'a> {
    pub spec: &'a ClusterSpec,
    pub role_arn: &'a str,
    pub bucket_name: &'a str,
}

impl ClusterParams<'_> {
    pub fn apply(&self, github_username: &str) -> BuildRequest {
        self.build(
            BuildAction::Apply,
            self.spec.cloud.as_str(),
            github_username,
        )
    }

    /// Teardown always targets AWS and runs without a user login.
    pub fn destroy(&self) -> BuildRequest {
        self.build(BuildAction::Destroy, "aws", DESTROY_GITHUB_USERNAME)
    }

    fn build(&self, action: BuildAction, cloud: &str, github_username: &str) -> BuildRequest {
        let s = self.spec;
        BuildRequest::new(action)
            .param("name", s.name.as_str())
            .param("cloud", cloud)
            .param("region", s.region.as_str())
            .param("ownerId", s.owner_id.as_str())
            .param_opt("accessKeyId", s.access_key_id.as_deref())
            .param_opt("secretAccessKey", s.secret_access_key.as_deref())
            .param("min", s.min)
            .param("max", s.max)
            .param_opt("description", s.description.as_deref())
            .param("iscredentials", s.iscredentials)
            .param_opt("credentials", s.credentials.as_deref())
            .param("external_id", s.external_id.as_str())
            .param("arn", self.role_arn)
            .param_opt("environment", s.environment.as_deref())
            .param_opt("instance_type", s.instance_type.as_deref())
            .param_opt("disk_size", s.disk_size)
            .param("node_autoscaling", s.node_autoscaling)
            .param_opt("vpc_subnet", s.vpc_subnet.as_deref())
            .param_opt("orgId", s.org_id.as_deref())
            .param_opt("projId", s.proj_id.as_deref())
            .param("github_username", github_username)
            .param("bucketName", self.bucket_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn app_spec() -> ApplicationSpec {
        serde_json::from_value(json!({
            "appName": "web",
            "gitRepository": "site",
            "region": "us-east-1",
            "clusterId": "c1",
            "memory": 256,
            "cpu": 250,
            "port": 8080,
            "envVariables": {"LOG": "debug"},
            "usernameGithub": "alice",
            "accountId": "123",
            "ownerId": "u1"
        }))
        .unwrap()
    }

    fn cluster_spec() -> ClusterSpec {
        serde_json::from_value(json!({
            "name": "prod",
            "cloud": "gcp",
            "region": "us-east-1",
            "ownerId": "u1",
            "accountId": "123",
            "min": 1,
            "max": 3,
            "diskSize": 40
        }))
        .unwrap()
    }

    fn keys(req: &BuildRequest) -> Vec<&'static str> {
        req.pairs().into_iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn application_apply_suffixes_units_and_encodes_env() {
        let spec = app_spec();
        let params = ApplicationParams {
            spec: &spec,
            role_arn: "arn:aws:iam::123:role/cool_customer",
            cluster_name: "prod",
        };
        let req = params.apply("bucket-1");
        assert_eq!(req.get("memory").as_deref(), Some("256Mi"));
        assert_eq!(req.get("cpu").as_deref(), Some("250m"));
        assert_eq!(req.get("envVariables").as_deref(), Some(r#"{"LOG":"debug"}"#));
        assert_eq!(req.get("bucketName").as_deref(), Some("bucket-1"));
        assert_eq!(req.get("ACTION").as_deref(), Some("Apply"));
        assert_eq!(keys(&req).first(), Some(&"appName"));
        assert_eq!(keys(&req).last(), Some(&"ACTION"));
    }

    #[test]
    fn application_destroy_drops_bucket_and_env() {
        let spec = app_spec();
        let params = ApplicationParams {
            spec: &spec,
            role_arn: "arn",
            cluster_name: "prod",
        };
        let req = params.destroy();
        assert_eq!(req.get("memory").as_deref(), Some("256"));
        assert_eq!(req.get("cpu").as_deref(), Some("250"));
        assert_eq!(req.get("bucketName"), None);
        assert_eq!(req.get("envVariables"), None);
        assert_eq!(req.get("ACTION").as_deref(), Some("Destroy"));
    }

    #[test]
    fn cluster_destroy_forces_aws_and_default_login() {
        let spec = cluster_spec();
        let params = ClusterParams {
            spec: &spec,
            role_arn: "arn",
            bucket_name: "b",
        };
        let apply = params.apply("alice");
        assert_eq!(apply.get("cloud").as_deref(), Some("gcp"));
        assert_eq!(apply.get("github_username").as_deref(), Some("alice"));
        assert_eq!(apply.get("disk_size").as_deref(), Some("40"));

        let destroy = params.destroy();
        assert_eq!(destroy.get("cloud").as_deref(), Some("aws"));
        assert_eq!(destroy.get("github_username").as_deref(), Some("default"));
        assert_eq!(keys(&apply), keys(&destroy));
    }
}
