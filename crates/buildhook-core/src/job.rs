//! Build job definition.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::event::PushEvent;
use crate::id::JobId;

/// One accepted push, owned by the task that executes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildJob {
    pub id: JobId,
    pub clone_url: String,
    pub commit_ref: String,
    /// Exclusively owned by this job; wiped before and after use.
    pub working_dir: PathBuf,
    pub deploy_enabled: bool,
    pub deploy_config_path: Option<PathBuf>,
}

impl BuildJob {
    pub fn new(event: PushEvent, working_dir: PathBuf) -> Self {
        Self {
            id: JobId::new(),
            clone_url: event.clone_url,
            commit_ref: event.commit_ref,
            working_dir,
            deploy_enabled: false,
            deploy_config_path: None,
        }
    }

    /// Enable deployment using the config at `path`.
    pub fn with_deploy(mut self, path: Option<PathBuf>) -> Self {
        self.deploy_enabled = path.is_some();
        self.deploy_config_path = path;
        self
    }
}

/// Stages a job moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Fetch,
    Build,
    LoadConfig,
    Publish,
    Rollout,
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStage::Fetch => write!(f, "fetch"),
            JobStage::Build => write!(f, "build"),
            JobStage::LoadConfig => write!(f, "load_config"),
            JobStage::Publish => write!(f, "publish"),
            JobStage::Rollout => write!(f, "rollout"),
        }
    }
}
