//! Job runner.

use buildhook_config::RunnerSettings;
use buildhook_config::deploy;
use buildhook_core::builder::ImageBuilder;
use buildhook_core::deployer::Deployer;
use buildhook_core::fetcher::SourceFetcher;
use buildhook_core::registry::{CredentialProvider, Registry};
use buildhook_core::{BuildJob, BuiltImages, EnvSource, JobId, ProcessEnv, PublishedImages};
use buildhook_deployer::{AwsCli, RegistryPublisher, RolloutController, RolloutSummary};
use buildhook_executor::git::{redact_url, reset_dir};
use buildhook_executor::{DockerCli, GitFetcher, ServiceDiscoverer};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::JobError;

/// External tools a job drives.
pub struct Toolchain {
    pub fetcher: Arc<dyn SourceFetcher>,
    pub builder: Arc<dyn ImageBuilder>,
    pub registry: Arc<dyn Registry>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub deployer: Arc<dyn Deployer>,
}

impl Toolchain {
    /// `git`, `docker` and `aws` CLIs.
    pub fn cli() -> Self {
        let docker = Arc::new(DockerCli::new());
        let aws = Arc::new(AwsCli::new());
        Self {
            fetcher: Arc::new(GitFetcher::new()),
            builder: docker.clone(),
            registry: docker,
            credentials: aws.clone(),
            deployer: aws,
        }
    }
}

/// What a finished job produced.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: JobId,
    pub built: BuiltImages,
    /// Set when deployment ran.
    pub published: Option<PublishedImages>,
    pub rollout: Option<RolloutSummary>,
}

/// Executes one build job from fetch to rollout.
pub struct JobRunner {
    fetcher: Arc<dyn SourceFetcher>,
    discoverer: ServiceDiscoverer,
    publisher: RegistryPublisher,
    rollout: RolloutController,
    env: Arc<dyn EnvSource>,
}

impl JobRunner {
    pub fn new(tools: Toolchain, env: Arc<dyn EnvSource>, image_namespace: &str) -> Self {
        Self {
            fetcher: tools.fetcher,
            discoverer: ServiceDiscoverer::new(tools.builder, image_namespace),
            publisher: RegistryPublisher::new(tools.registry, tools.credentials, env.clone()),
            rollout: RolloutController::new(tools.deployer),
            env,
        }
    }

    /// Runner using the CLI toolchain and the process environment.
    pub fn from_settings(settings: &RunnerSettings) -> Self {
        Self::new(
            Toolchain::cli(),
            Arc::new(ProcessEnv),
            &settings.image_namespace,
        )
    }

    /// Run `job` to completion, then remove its working directory.
    pub async fn run(&self, job: &BuildJob) -> Result<JobReport, JobError> {
        info!(
            job_id = %job.id,
            clone_url = %redact_url(&job.clone_url),
            commit = %job.commit_ref,
            deploy = job.deploy_enabled,
            "Starting build job"
        );

        let result = self.execute(job).await;

        if let Err(e) = reset_dir(&job.working_dir).await {
            warn!(
                job_id = %job.id,
                path = %job.working_dir.display(),
                error = %e,
                "Failed to clean up working directory"
            );
        }

        match &result {
            Ok(report) => info!(
                job_id = %job.id,
                built = report.built.len(),
                published = report.published.as_ref().map_or(0, |p| p.len()),
                "Build job finished"
            ),
            Err(e) => error!(
                job_id = %job.id,
                stage = ?e.stage(),
                error = %e,
                "Build job failed"
            ),
        }

        result
    }

    async fn execute(&self, job: &BuildJob) -> Result<JobReport, JobError> {
        self.fetcher
            .fetch(&job.clone_url, &job.commit_ref, &job.working_dir)
            .await?;

        let built = self
            .discoverer
            .build_all(&job.working_dir)
            .await
            .map_err(JobError::Build)?;

        let mut report = JobReport {
            job_id: job.id,
            built,
            published: None,
            rollout: None,
        };

        if !job.deploy_enabled {
            return Ok(report);
        }
        if report.built.is_empty() {
            info!(job_id = %job.id, "No images built, skipping deployment");
            return Ok(report);
        }

        let path = job
            .deploy_config_path
            .as_deref()
            .ok_or(JobError::NoDeployConfig)?;
        let mut config = deploy::load_with(path, self.env.as_ref())?;
        info!(
            provider = %config.provider,
            region = %config.aws.region,
            cluster = %config.aws.ecs_cluster,
            "Loaded deployment config"
        );

        let published = self.publisher.publish(&report.built, &mut config).await?;
        let summary = self.rollout.rollout(&published, &config).await?;

        report.published = Some(published);
        report.rollout = Some(summary);
        Ok(report)
    }
}
