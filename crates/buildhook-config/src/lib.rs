//! Configuration for buildhook.
//!
//! This crate handles:
//! - Deployment config files (YAML or KDL)
//! - `${VAR}` environment interpolation
//! - Server and runner settings

pub mod deploy;
pub mod error;
pub mod settings;
pub mod variables;

pub use deploy::{AwsSettings, DeploymentConfig, Provider, ServiceConfig};
pub use error::{ConfigError, ConfigResult};
pub use settings::{RunnerSettings, ServerSettings, WebhookAuth};
pub use variables::{Interpolated, interpolate};
