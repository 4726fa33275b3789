//! Server and runner settings.
//!
//! Built once at startup from flags and environment, then shared by
//! reference with the gateway and the job runner.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{ConfigError, ConfigResult};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_WORKING_DIR: &str = "/tmp/build-job";
pub const DEFAULT_IMAGE_NAMESPACE: &str = "project";
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Locations searched for a deployment config when deployment is enabled
/// without an explicit path.
pub const CONFIG_CANDIDATES: &[&str] = &[
    "deploy.yml",
    "deploy.yaml",
    "deploy.kdl",
    ".deploy/config.yml",
    ".deploy/config.yaml",
    ".deploy/config.kdl",
    "config/deploy.yml",
    "config/deploy.yaml",
    ".github/workflows/deploy-config.yml",
];

/// How webhook deliveries are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum WebhookAuth {
    /// Require a valid `sha256=` signature made with this secret.
    Secret(String),
    /// Operator opted out of signature checks.
    Unsigned,
}

impl std::fmt::Debug for WebhookAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookAuth::Secret(_) => write!(f, "Secret([REDACTED])"),
            WebhookAuth::Unsigned => write!(f, "Unsigned"),
        }
    }
}

impl WebhookAuth {
    /// An empty secret is only accepted with an explicit opt-in.
    pub fn from_parts(secret: Option<String>, allow_unsigned: bool) -> ConfigResult<Self> {
        match secret.filter(|s| !s.is_empty()) {
            Some(secret) => Ok(WebhookAuth::Secret(secret)),
            None if allow_unsigned => {
                warn!("Webhook signature verification disabled; any caller can trigger builds");
                Ok(WebhookAuth::Unsigned)
            }
            None => Err(ConfigError::InvalidValue {
                field: "webhook secret".to_string(),
                message: "no secret configured; set WEBHOOK_SECRET or pass --allow-unsigned"
                    .to_string(),
            }),
        }
    }
}

/// Settings for executing build jobs.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Base directory; each job gets its own subdirectory.
    pub working_dir: PathBuf,
    /// Prefix of local image tags.
    pub image_namespace: String,
    /// Deployment runs after the build only when a config path is set.
    pub deploy_config_path: Option<PathBuf>,
    pub max_concurrent_jobs: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from(DEFAULT_WORKING_DIR),
            image_namespace: DEFAULT_IMAGE_NAMESPACE.to_string(),
            deploy_config_path: None,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }
}

impl RunnerSettings {
    pub fn deploy_enabled(&self) -> bool {
        self.deploy_config_path.is_some()
    }
}

/// Settings for the webhook server.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub port: u16,
    /// Event type that triggers a build.
    pub trigger_event: String,
    pub auth: WebhookAuth,
    pub runner: RunnerSettings,
}

/// Decide the deployment config path.
///
/// Deployment stays off unless requested. When requested without a path,
/// the [`CONFIG_CANDIDATES`] under `search_base` are tried; if none exists
/// deployment is disabled with a warning.
pub fn resolve_deploy_config(
    deploy_requested: bool,
    config_path: Option<PathBuf>,
    search_base: &Path,
) -> Option<PathBuf> {
    if !deploy_requested {
        return None;
    }

    if let Some(path) = config_path {
        return Some(path);
    }

    info!("Deployment enabled but no config file specified, searching for one");
    match find_config_file(search_base) {
        Some(path) => Some(path),
        None => {
            warn!("No deployment config file found; deployment disabled");
            None
        }
    }
}

/// First existing [`CONFIG_CANDIDATES`] entry under `base`.
pub fn find_config_file(base: &Path) -> Option<PathBuf> {
    CONFIG_CANDIDATES
        .iter()
        .map(|candidate| base.join(candidate))
        .find(|path| path.is_file())
        .inspect(|path| info!(path = %path.display(), "Found deployment config file"))
}
