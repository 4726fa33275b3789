//! AWS CLI backed registry credentials and ECS deployer.

use async_trait::async_trait;
use buildhook_core::CommandError;
use buildhook_core::deployer::Deployer;
use buildhook_core::registry::CredentialProvider;
use buildhook_executor::command;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info};

/// Talks to ECR and ECS through the `aws` CLI.
///
/// Credentials come from the usual AWS environment variables or profile.
pub struct AwsCli {
    aws_bin: String,
}

impl Default for AwsCli {
    fn default() -> Self {
        Self::new()
    }
}

impl AwsCli {
    /// Use the binary named by `AWS_BIN`, falling back to `aws`.
    pub fn new() -> Self {
        let aws_bin = std::env::var("AWS_BIN").unwrap_or_else(|_| "aws".to_string());
        Self { aws_bin }
    }

    pub fn with_binary(aws_bin: impl Into<String>) -> Self {
        Self {
            aws_bin: aws_bin.into(),
        }
    }

    fn aws(&self, region: &str) -> Command {
        let mut cmd = Command::new(&self.aws_bin);
        cmd.args(["--region", region]);
        cmd
    }

    fn invalid_output(&self, message: impl Into<String>) -> CommandError {
        CommandError::InvalidOutput {
            program: self.aws_bin.clone(),
            message: message.into(),
        }
    }

    fn parse_json(&self, output: &str) -> Result<Value, CommandError> {
        serde_json::from_str(output).map_err(|e| self.invalid_output(e.to_string()))
    }
}

#[async_trait]
impl CredentialProvider for AwsCli {
    async fn registry_password(&self, region: &str) -> Result<String, CommandError> {
        let mut cmd = self.aws(region);
        cmd.args(["ecr", "get-login-password"]);

        let password = command::run(cmd, None).await?.trim().to_string();
        if password.is_empty() {
            return Err(self.invalid_output("empty registry password"));
        }
        Ok(password)
    }
}

#[async_trait]
impl Deployer for AwsCli {
    fn name(&self) -> &'static str {
        "ecs"
    }

    async fn describe_task_definition(
        &self,
        region: &str,
        family: &str,
    ) -> Result<Value, CommandError> {
        debug!(task_definition = %family, "Describing task definition");

        let mut cmd = self.aws(region);
        cmd.args([
            "ecs",
            "describe-task-definition",
            "--task-definition",
            family,
            "--query",
            "taskDefinition",
            "--output",
            "json",
        ]);

        let output = command::run(cmd, None).await?;
        self.parse_json(&output)
    }

    async fn register_task_definition(
        &self,
        region: &str,
        definition: &Value,
    ) -> Result<String, CommandError> {
        let mut cmd = self.aws(region);
        cmd.args(["ecs", "register-task-definition", "--cli-input-json"])
            .arg(definition.to_string())
            .args(["--output", "json"]);

        let output = command::run(cmd, None).await?;
        let arn = registered_arn(&self.parse_json(&output)?)
            .ok_or_else(|| self.invalid_output("response has no taskDefinitionArn"))?;

        info!(task_definition_arn = %arn, "Registered task definition");
        Ok(arn)
    }

    async fn update_service(
        &self,
        region: &str,
        cluster: &str,
        service: &str,
        task_definition: &str,
    ) -> Result<(), CommandError> {
        let mut cmd = self.aws(region);
        cmd.args([
            "ecs",
            "update-service",
            "--cluster",
            cluster,
            "--service",
            service,
            "--task-definition",
            task_definition,
            "--force-new-deployment",
            "--output",
            "json",
        ]);

        command::run(cmd, None).await?;
        info!(cluster = %cluster, service = %service, "Service update started");
        Ok(())
    }
}

/// ARN of the revision in a `register-task-definition` response.
fn registered_arn(response: &Value) -> Option<String> {
    response
        .get("taskDefinition")
        .and_then(|td| td.get("taskDefinitionArn"))
        .and_then(|arn| arn.as_str())
        .map(String::from)
}
