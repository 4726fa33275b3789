//! CLI command implementations.

pub mod run;

use anyhow::{Context, Result};
use buildhook_config::DeploymentConfig;
use buildhook_config::deploy;
use buildhook_core::signature;
use std::path::Path;
use tracing::error;

pub fn validate(path: &Path) -> Result<()> {
    let config = deploy::load(path).map_err(|e| {
        error!(path = %path.display(), error = %e, "Invalid deployment configuration");
        e
    })?;
    print!("{}", describe(&config));
    println!("Configuration is valid");
    Ok(())
}

fn describe(config: &DeploymentConfig) -> String {
    let mut out = format!(
        "provider: {}\nregion: {}\ncluster: {}\nrepository prefix: {}\n",
        config.provider, config.aws.region, config.aws.ecs_cluster, config.aws.ecr_repository_prefix
    );
    if config.services.is_empty() {
        out.push_str("services: none configured\n");
    } else {
        out.push_str("services:\n");
        for (name, service) in &config.services {
            out.push_str(&format!(
                "  {}: task definition {}, service {}, container {}\n",
                name, service.task_definition, service.service_name, service.container_name
            ));
        }
    }
    out
}

pub fn sign(secret: &str, file: &Path) -> Result<()> {
    let body =
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let header = signature::sign(&body, secret).context("signing key rejected")?;
    println!("{}", header);
    Ok(())
}
