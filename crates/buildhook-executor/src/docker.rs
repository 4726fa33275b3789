//! Docker CLI image builder and registry client.

use async_trait::async_trait;
use buildhook_core::CommandError;
use buildhook_core::builder::{BuildRequest, ImageBuilder};
use buildhook_core::registry::{Registry, RegistryCredentials};
use tokio::process::Command;
use tracing::{debug, info};

use crate::command;

/// Builds, tags and pushes images by shelling out to `docker`.
pub struct DockerCli {
    docker_bin: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    /// Use the binary named by `DOCKER_BIN`, falling back to `docker`.
    pub fn new() -> Self {
        let docker_bin = std::env::var("DOCKER_BIN").unwrap_or_else(|_| "docker".to_string());
        Self { docker_bin }
    }

    pub fn with_binary(docker_bin: impl Into<String>) -> Self {
        Self {
            docker_bin: docker_bin.into(),
        }
    }

    fn docker(&self) -> Command {
        Command::new(&self.docker_bin)
    }
}

#[async_trait]
impl ImageBuilder for DockerCli {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn build(&self, request: &BuildRequest) -> Result<String, CommandError> {
        info!(
            tag = %request.tag,
            context = %request.context_dir.display(),
            "Building image"
        );

        let mut cmd = self.docker();
        cmd.arg("build")
            .arg("-t")
            .arg(&request.tag)
            .arg("-f")
            .arg(&request.descriptor)
            .arg(&request.context_dir);

        command::run(cmd, None).await
    }
}

#[async_trait]
impl Registry for DockerCli {
    async fn login(&self, credentials: &RegistryCredentials) -> Result<(), CommandError> {
        info!(server = %credentials.server, "Logging in to registry");

        let mut cmd = self.docker();
        cmd.args([
            "login",
            "--username",
            &credentials.username,
            "--password-stdin",
            &credentials.server,
        ]);

        // Never on the command line
        command::run(cmd, Some(credentials.password.as_bytes())).await?;
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<(), CommandError> {
        debug!(source = %source, target = %target, "Tagging image");

        let mut cmd = self.docker();
        cmd.args(["tag", source, target]);
        command::run(cmd, None).await?;
        Ok(())
    }

    async fn push(&self, reference: &str) -> Result<(), CommandError> {
        info!(image = %reference, "Pushing image");

        let mut cmd = self.docker();
        cmd.args(["push", reference]);
        command::run(cmd, None).await?;
        Ok(())
    }
}
