//! Orchestration platform trait.
//!
//! Rollout works on task-definition documents: the current one is fetched,
//! patched, and registered as a new revision before the service is pointed
//! at it.

use async_trait::async_trait;

use crate::error::CommandError;

/// Container orchestration platform.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Name of this deployer.
    fn name(&self) -> &'static str;

    /// Fetch the current task definition for `family`.
    async fn describe_task_definition(
        &self,
        region: &str,
        family: &str,
    ) -> Result<serde_json::Value, CommandError>;

    /// Register `definition` as a new revision, returning its ARN.
    async fn register_task_definition(
        &self,
        region: &str,
        definition: &serde_json::Value,
    ) -> Result<String, CommandError>;

    /// Point `service` at `task_definition` and force a new deployment.
    async fn update_service(
        &self,
        region: &str,
        cluster: &str,
        service: &str,
        task_definition: &str,
    ) -> Result<(), CommandError>;
}
