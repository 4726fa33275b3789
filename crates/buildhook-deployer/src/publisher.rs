//! Registry publisher.
//!
//! Pushes every built image to the account's ECR registry under one run tag,
//! plus a best-effort `latest`. Any tag or push failure aborts the run.
//! Services without a config entry get the conventional settings written back
//! into the config, so the rollout that follows covers them too.

use buildhook_config::DeploymentConfig;
use buildhook_core::registry::{CredentialProvider, Registry, RegistryCredentials};
use buildhook_core::{BuiltImages, CommandError, EnvSource, PublishedImages};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

/// Username ECR expects alongside a `get-login-password` token.
pub const REGISTRY_USERNAME: &str = "AWS";

pub const LATEST_TAG: &str = "latest";

/// Format of the per-run image tag.
pub const RUN_TAG_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("{0} is not set")]
    MissingCredentials(&'static str),

    #[error("no AWS account id: set aws.accountId or AWS_ACCOUNT_ID")]
    MissingAccountId,

    #[error("failed to obtain registry password: {0}")]
    Credentials(#[source] CommandError),

    #[error("registry login failed: {0}")]
    Login(#[source] CommandError),

    #[error("failed to tag image for {service}: {source}")]
    Tag {
        service: String,
        #[source]
        source: CommandError,
    },

    #[error("failed to push image for {service}: {source}")]
    Push {
        service: String,
        #[source]
        source: CommandError,
    },
}

impl PublishError {
    /// Service whose image could not be published, if the failure was per service.
    pub fn service(&self) -> Option<&str> {
        match self {
            PublishError::Tag { service, .. } | PublishError::Push { service, .. } => Some(service),
            _ => None,
        }
    }
}

/// Tag for a run started now.
pub fn run_tag() -> String {
    Utc::now().format(RUN_TAG_FORMAT).to_string()
}

pub struct RegistryPublisher {
    registry: Arc<dyn Registry>,
    credentials: Arc<dyn CredentialProvider>,
    env: Arc<dyn EnvSource>,
}

impl RegistryPublisher {
    pub fn new(
        registry: Arc<dyn Registry>,
        credentials: Arc<dyn CredentialProvider>,
        env: Arc<dyn EnvSource>,
    ) -> Self {
        Self {
            registry,
            credentials,
            env,
        }
    }

    /// Publish `images` under a fresh run tag.
    pub async fn publish(
        &self,
        images: &BuiltImages,
        config: &mut DeploymentConfig,
    ) -> Result<PublishedImages, PublishError> {
        self.publish_with_tag(images, config, &run_tag()).await
    }

    /// Publish `images` under `tag`, in service name order.
    pub async fn publish_with_tag(
        &self,
        images: &BuiltImages,
        config: &mut DeploymentConfig,
        tag: &str,
    ) -> Result<PublishedImages, PublishError> {
        for key in [ACCESS_KEY_ENV, SECRET_KEY_ENV] {
            if self.env.var(key).is_none() {
                return Err(PublishError::MissingCredentials(key));
            }
        }

        let account_id = config
            .account_id(self.env.as_ref())
            .ok_or(PublishError::MissingAccountId)?;
        let registry_host = config.registry_host(&account_id);

        let password = self
            .credentials
            .registry_password(&config.aws.region)
            .await
            .map_err(PublishError::Credentials)?;
        self.registry
            .login(&RegistryCredentials {
                server: registry_host.clone(),
                username: REGISTRY_USERNAME.to_string(),
                password,
            })
            .await
            .map_err(PublishError::Login)?;

        info!(registry = %registry_host, tag = %tag, count = images.len(), "Publishing images");

        let mut published = PublishedImages::new();
        for (name, local) in images {
            if config.service(name).is_none() {
                warn!(service = %name, "No deployment config for service, using defaults");
            }
            let service = config.resolve_service(name).clone();

            let repository = config.repository_uri(&registry_host, &service);
            let remote = format!("{}:{}", repository, tag);

            self.registry
                .tag(local, &remote)
                .await
                .map_err(|source| PublishError::Tag {
                    service: name.clone(),
                    source,
                })?;
            self.registry
                .push(&remote)
                .await
                .map_err(|source| PublishError::Push {
                    service: name.clone(),
                    source,
                })?;
            info!(service = %name, image = %remote, "Pushed image");

            let latest = format!("{}:{}", repository, LATEST_TAG);
            match self.push_latest(local, &latest).await {
                Ok(()) => debug!(service = %name, image = %latest, "Pushed latest"),
                Err(e) => warn!(service = %name, error = %e, "Failed to push latest tag"),
            }

            published.insert(name.clone(), remote);
        }

        Ok(published)
    }

    async fn push_latest(&self, local: &str, latest: &str) -> Result<(), CommandError> {
        self.registry.tag(local, latest).await?;
        self.registry.push(latest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use buildhook_config::deploy::{ConfigFormat, parse};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records calls; fails pushes whose reference contains any of `fail_pushes`.
    #[derive(Default)]
    struct MockRegistry {
        calls: Mutex<Vec<String>>,
        fail_pushes: Vec<String>,
    }

    fn failure(program: &str) -> CommandError {
        CommandError::Failed {
            program: program.to_string(),
            code: Some(1),
            output: "denied".to_string(),
        }
    }

    #[async_trait]
    impl Registry for MockRegistry {
        async fn login(&self, credentials: &RegistryCredentials) -> Result<(), CommandError> {
            self.calls.lock().unwrap().push(format!(
                "login {} {} {}",
                credentials.username, credentials.server, credentials.password
            ));
            Ok(())
        }

        async fn tag(&self, source: &str, target: &str) -> Result<(), CommandError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("tag {} {}", source, target));
            Ok(())
        }

        async fn push(&self, reference: &str) -> Result<(), CommandError> {
            self.calls.lock().unwrap().push(format!("push {}", reference));
            if self.fail_pushes.iter().any(|f| reference.contains(f.as_str())) {
                return Err(failure("docker"));
            }
            Ok(())
        }
    }

    struct StaticPassword;

    #[async_trait]
    impl CredentialProvider for StaticPassword {
        async fn registry_password(&self, _region: &str) -> Result<String, CommandError> {
            Ok("token".to_string())
        }
    }

    fn env(pairs: &[(&str, &str)]) -> Arc<dyn EnvSource> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(map)
    }

    fn aws_env() -> Arc<dyn EnvSource> {
        env(&[
            (ACCESS_KEY_ENV, "AKIA"),
            (SECRET_KEY_ENV, "secret"),
            ("AWS_ACCOUNT_ID", "123456789012"),
        ])
    }

    fn config() -> DeploymentConfig {
        parse(
            r#"
provider: aws
aws:
  region: us-east-1
  ecrRepositoryPrefix: shop
  ecsCluster: prod
services:
  a:
    taskDefinition: shop-a
    serviceName: a-svc
    containerName: a
"#,
            ConfigFormat::Yaml,
        )
        .unwrap()
    }

    fn images(names: &[&str]) -> BuiltImages {
        names
            .iter()
            .map(|n| (n.to_string(), format!("project-{}:local", n)))
            .collect()
    }

    #[test]
    fn test_run_tag_format() {
        let tag = run_tag();
        assert_eq!(tag.len(), "20240101-000000".len());
        assert_eq!(&tag[8..9], "-");
        assert!(tag.chars().filter(|c| *c != '-').all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_publish_tags_and_pushes() {
        let registry = Arc::new(MockRegistry::default());
        let publisher = RegistryPublisher::new(registry.clone(), Arc::new(StaticPassword), aws_env());

        let mut config = config();
        let published = publisher
            .publish_with_tag(&images(&["a", "b"]), &mut config, "20240101-000000")
            .await
            .unwrap();

        // Defaults are recorded for the rollout
        let b = config.service("b").unwrap();
        assert_eq!(b.task_definition, "shop-b");
        assert_eq!(b.service_name, "shop-b-service");

        let host = "123456789012.dkr.ecr.us-east-1.amazonaws.com";
        assert_eq!(published["a"], format!("{}/shop/a-svc:20240101-000000", host));
        // No explicit entry: named by convention
        assert_eq!(
            published["b"],
            format!("{}/shop/shop-b-service:20240101-000000", host)
        );

        let calls = registry.calls.lock().unwrap();
        assert_eq!(calls[0], format!("login AWS {} token", host));
        assert_eq!(
            calls[1],
            format!("tag project-a:local {}/shop/a-svc:20240101-000000", host)
        );
        assert_eq!(calls[2], format!("push {}/shop/a-svc:20240101-000000", host));
        assert_eq!(calls[3], format!("tag project-a:local {}/shop/a-svc:latest", host));
        assert_eq!(calls[4], format!("push {}/shop/a-svc:latest", host));
    }

    #[tokio::test]
    async fn test_push_failure_names_service() {
        let registry = Arc::new(MockRegistry {
            fail_pushes: vec!["shop-b-service:2024".to_string()],
            ..Default::default()
        });
        let publisher = RegistryPublisher::new(registry.clone(), Arc::new(StaticPassword), aws_env());

        let err = publisher
            .publish_with_tag(&images(&["a", "b", "c"]), &mut config(), "20240101-000000")
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Push { .. }));
        assert_eq!(err.service(), Some("b"));
        // Aborted before c
        let calls = registry.calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c.contains("project-c")));
    }

    #[tokio::test]
    async fn test_latest_failure_is_not_fatal() {
        let registry = Arc::new(MockRegistry {
            fail_pushes: vec![":latest".to_string()],
            ..Default::default()
        });
        let publisher = RegistryPublisher::new(registry, Arc::new(StaticPassword), aws_env());

        let published = publisher
            .publish_with_tag(&images(&["a", "b"]), &mut config(), "20240101-000000")
            .await
            .unwrap();
        assert_eq!(published.len(), 2);
    }

    #[tokio::test]
    async fn test_requires_credentials() {
        let registry = Arc::new(MockRegistry::default());
        let publisher = RegistryPublisher::new(
            registry.clone(),
            Arc::new(StaticPassword),
            env(&[(ACCESS_KEY_ENV, "AKIA"), ("AWS_ACCOUNT_ID", "123456789012")]),
        );

        let err = publisher
            .publish_with_tag(&images(&["a"]), &mut config(), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::MissingCredentials(SECRET_KEY_ENV)));
        assert!(registry.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requires_account_id() {
        let publisher = RegistryPublisher::new(
            Arc::new(MockRegistry::default()),
            Arc::new(StaticPassword),
            env(&[(ACCESS_KEY_ENV, "AKIA"), (SECRET_KEY_ENV, "secret")]),
        );

        let err = publisher
            .publish_with_tag(&images(&["a"]), &mut config(), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::MissingAccountId));
    }
}
