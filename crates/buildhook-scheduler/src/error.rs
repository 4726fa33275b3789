//! Job errors.

use buildhook_config::ConfigError;
use buildhook_core::FetchError;
use buildhook_core::job::JobStage;
use buildhook_deployer::{PublishError, RolloutError};
use thiserror::Error;

/// Failure that ended a build job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to scan working tree: {0}")]
    Build(#[source] std::io::Error),

    #[error("no deployment config path set")]
    NoDeployConfig,

    #[error("failed to load deployment config: {0}")]
    Config(#[from] ConfigError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Rollout(#[from] RolloutError),

    #[error("job runner is shutting down")]
    Shutdown,
}

impl JobError {
    /// Stage the job was in when it failed.
    pub fn stage(&self) -> Option<JobStage> {
        match self {
            JobError::Fetch(_) => Some(JobStage::Fetch),
            JobError::Build(_) => Some(JobStage::Build),
            JobError::NoDeployConfig | JobError::Config(_) => Some(JobStage::LoadConfig),
            JobError::Publish(_) => Some(JobStage::Publish),
            JobError::Rollout(_) => Some(JobStage::Rollout),
            JobError::Shutdown => None,
        }
    }
}
