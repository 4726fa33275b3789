//! Rollout controller.
//!
//! Points each configured ECS service at a new task-definition revision
//! carrying its freshly pushed image. Services are independent: one failing
//! does not stop the others.

use buildhook_config::{DeploymentConfig, ServiceConfig};
use buildhook_core::PublishedImages;
use buildhook_core::deployer::Deployer;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::task_definition::patch_image;

/// Step of a service rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutStage {
    Describe,
    Patch,
    Register,
    Update,
}

impl fmt::Display for RolloutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RolloutStage::Describe => write!(f, "describe"),
            RolloutStage::Patch => write!(f, "patch"),
            RolloutStage::Register => write!(f, "register"),
            RolloutStage::Update => write!(f, "update"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFailure {
    pub service: String,
    pub stage: RolloutStage,
    pub message: String,
}

impl fmt::Display for ServiceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.service, self.stage, self.message)
    }
}

#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("rollout failed for {} service(s): {}", .failures.len(), join_failures(.failures))]
    Failed { failures: Vec<ServiceFailure> },
}

fn join_failures(failures: &[ServiceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of a successful rollout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloutSummary {
    /// Service name to the task-definition ARN it now runs.
    pub updated: BTreeMap<String, String>,
    /// Published services with no deployment config entry.
    pub skipped: Vec<String>,
}

pub struct RolloutController {
    deployer: Arc<dyn Deployer>,
}

impl RolloutController {
    pub fn new(deployer: Arc<dyn Deployer>) -> Self {
        Self { deployer }
    }

    pub async fn rollout(
        &self,
        published: &PublishedImages,
        config: &DeploymentConfig,
    ) -> Result<RolloutSummary, RolloutError> {
        let mut summary = RolloutSummary::default();
        let mut failures = Vec::new();

        for (name, image) in published {
            let Some(service) = config.service(name) else {
                warn!(service = %name, "No deployment config for service, skipping rollout");
                summary.skipped.push(name.clone());
                continue;
            };

            match self.rollout_service(config, name, service, image).await {
                Ok(arn) => {
                    summary.updated.insert(name.clone(), arn);
                }
                Err(failure) => {
                    error!(
                        service = %name,
                        stage = %failure.stage,
                        error = %failure.message,
                        "Rollout failed"
                    );
                    failures.push(failure);
                }
            }
        }

        if failures.is_empty() {
            info!(
                deployer = self.deployer.name(),
                updated = summary.updated.len(),
                skipped = summary.skipped.len(),
                "Rollout complete"
            );
            Ok(summary)
        } else {
            Err(RolloutError::Failed { failures })
        }
    }

    async fn rollout_service(
        &self,
        config: &DeploymentConfig,
        name: &str,
        service: &ServiceConfig,
        image: &str,
    ) -> Result<String, ServiceFailure> {
        let region = &config.aws.region;
        let fail = |stage, message: String| ServiceFailure {
            service: name.to_string(),
            stage,
            message,
        };

        info!(service = %name, image = %image, "Rolling out service");

        let current = self
            .deployer
            .describe_task_definition(region, &service.task_definition)
            .await
            .map_err(|e| fail(RolloutStage::Describe, e.to_string()))?;

        let patched = patch_image(&current, &service.container_name, image)
            .map_err(|e| fail(RolloutStage::Patch, e.to_string()))?;

        let arn = self
            .deployer
            .register_task_definition(region, &patched)
            .await
            .map_err(|e| fail(RolloutStage::Register, e.to_string()))?;

        self.deployer
            .update_service(region, &config.aws.ecs_cluster, &service.service_name, &arn)
            .await
            .map_err(|e| fail(RolloutStage::Update, e.to_string()))?;

        info!(
            service = %name,
            ecs_service = %service.service_name,
            task_definition_arn = %arn,
            "Service updated"
        );
        Ok(arn)
    }
}
