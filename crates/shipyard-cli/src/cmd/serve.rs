use crate::output::{has_errors, print_warnings};
use anyhow::Context;
use clap::Args;
use shipyard_core::config::ServiceConfig;
use std::path::Path;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on (overrides server.port; 0 = OS-assigned)
    #[arg(long)]
    port: Option<u16>,

    /// Jenkins user (overrides ci.username)
    #[arg(long, env = "SHIPYARD_CI_USERNAME")]
    ci_username: Option<String>,

    /// Jenkins API token or password (overrides ci.password)
    #[arg(long, env = "SHIPYARD_CI_PASSWORD", hide_env_values = true)]
    ci_password: Option<String>,

    /// Fixed Jenkins base URL (overrides ci.base_url)
    #[arg(long, env = "SHIPYARD_JENKINS_URL")]
    jenkins_url: Option<String>,

    /// Bearer token required on /api routes (overrides server.api_token)
    #[arg(long, env = "SHIPYARD_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,
}

impl ServeArgs {
    fn apply(self, config: &mut ServiceConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(user) = self.ci_username {
            config.ci.username = user;
        }
        if let Some(password) = self.ci_password {
            config.ci.password = password;
        }
        if let Some(url) = self.jenkins_url {
            config.ci.base_url = Some(url);
        }
        if let Some(token) = self.api_token.filter(|t| !t.is_empty()) {
            config.server.api_token = Some(token);
        }
    }
}

pub fn run(path: &Path, args: ServeArgs) -> anyhow::Result<()> {
    let mut config = if path.exists() {
        ServiceConfig::load(path).context("failed to load config")?
    } else {
        tracing::warn!(path = %path.display(), "config file not found; using defaults");
        ServiceConfig::default()
    };
    args.apply(&mut config);

    let warnings = config.validate();
    if has_errors(&warnings) {
        print_warnings(&warnings);
        anyhow::bail!("config validation found errors");
    }
    for w in &warnings {
        tracing::warn!("{}", w.message);
    }

    let port = config.server.port;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(shipyard_server::serve(config, port))
}
