//! Image publishing and service rollout for buildhook.
//!
//! Provides:
//! - `aws` CLI backed registry credentials and ECS deployer
//! - Registry publisher (tag and push built images)
//! - Rollout controller (new task-definition revision per service)

pub mod aws;
pub mod publisher;
pub mod rollout;
pub mod task_definition;

pub use aws::AwsCli;
pub use publisher::{PublishError, RegistryPublisher};
pub use rollout::{RolloutController, RolloutError, RolloutSummary, ServiceFailure};

pub use buildhook_core::deployer::Deployer;
