//! Deployment configuration.
//!
//! Maps discovered services to registry repositories and orchestration
//! targets. Files are YAML unless they end in `.kdl`:
//!
//! ```yaml
//! provider: aws
//! aws:
//!   region: ${AWS_REGION}
//!   ecrRepositoryPrefix: shop
//!   ecsCluster: production
//!   accountId: ${AWS_ACCOUNT_ID}
//! services:
//!   svc-api:
//!     directory: svc/api
//!     taskDefinition: shop-api
//!     serviceName: shop-api-service
//!     containerName: api
//! ```
//!
//! ```kdl
//! provider "aws"
//! aws {
//!     region "eu-west-1"
//!     ecr-repository-prefix "shop"
//!     ecs-cluster "production"
//! }
//! services {
//!     svc-api directory="svc/api" task-definition="shop-api" service-name="shop-api-service" container-name="api"
//! }
//! ```

use buildhook_core::{EnvSource, ProcessEnv};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::variables::interpolate;
use crate::{ConfigError, ConfigResult};

/// Environment variable consulted when the config has no account id.
pub const ACCOUNT_ID_ENV: &str = "AWS_ACCOUNT_ID";

/// Deployment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Aws => write!(f, "aws"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" => Ok(Provider::Aws),
            _ => Err(ConfigError::InvalidValue {
                field: "provider".to_string(),
                message: format!("unknown provider: {}", s),
            }),
        }
    }
}

/// Registry and cluster settings for AWS (ECR + ECS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsSettings {
    pub region: String,
    pub ecr_repository_prefix: String,
    pub ecs_cluster: String,
    /// Falls back to `AWS_ACCOUNT_ID` when absent.
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub account_id: Option<String>,
}

/// Deployment target of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Service directory in the repository.
    #[serde(default)]
    pub directory: String,
    /// Task definition family.
    pub task_definition: String,
    /// Orchestrator service name; also names the registry repository.
    pub service_name: String,
    /// Container in the task definition whose image is replaced.
    pub container_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub provider: Provider,
    pub aws: AwsSettings,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

impl DeploymentConfig {
    /// Explicitly configured settings for `service`.
    pub fn service(&self, service: &str) -> Option<&ServiceConfig> {
        self.services.get(service)
    }

    /// Conventional settings for a service with no explicit entry.
    pub fn default_service(&self, service: &str) -> ServiceConfig {
        let prefix = &self.aws.ecr_repository_prefix;
        ServiceConfig {
            directory: service.to_string(),
            task_definition: format!("{}-{}", prefix, service),
            service_name: format!("{}-{}-service", prefix, service),
            container_name: service.to_string(),
        }
    }

    /// Settings for `service`, recording the conventional ones if it has no entry.
    pub fn resolve_service(&mut self, service: &str) -> &ServiceConfig {
        if !self.services.contains_key(service) {
            let defaults = self.default_service(service);
            self.services.insert(service.to_string(), defaults);
        }
        &self.services[service]
    }

    /// Account id from the config, else from the environment.
    pub fn account_id(&self, env: &dyn EnvSource) -> Option<String> {
        self.aws
            .account_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| env.var(ACCOUNT_ID_ENV))
    }

    /// Registry host for `account_id`.
    pub fn registry_host(&self, account_id: &str) -> String {
        format!("{}.dkr.ecr.{}.amazonaws.com", account_id, self.aws.region)
    }

    /// Repository (without tag) a service's images are pushed to.
    pub fn repository_uri(&self, registry_host: &str, service: &ServiceConfig) -> String {
        format!(
            "{}/{}/{}",
            registry_host, self.aws.ecr_repository_prefix, service.service_name
        )
    }

    pub fn validate(&self) -> ConfigResult<()> {
        require("aws.region", &self.aws.region)?;
        require("aws.ecrRepositoryPrefix", &self.aws.ecr_repository_prefix)?;
        require("aws.ecsCluster", &self.aws.ecs_cluster)?;

        for (name, service) in &self.services {
            require(&format!("services.{}.taskDefinition", name), &service.task_definition)?;
            require(&format!("services.{}.serviceName", name), &service.service_name)?;
            require(&format!("services.{}.containerName", name), &service.container_name)?;
        }
        Ok(())
    }
}

fn require(field: &str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(field.to_string()));
    }
    Ok(())
}

// Account ids are often written (or interpolated) as bare numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

/// On-disk format of a deployment config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Kdl,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("kdl") => ConfigFormat::Kdl,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Load a deployment config, interpolating from the process environment.
pub fn load(path: &Path) -> ConfigResult<DeploymentConfig> {
    load_with(path, &ProcessEnv)
}

/// Load a deployment config, interpolating from `env`.
pub fn load_with(path: &Path, env: &dyn EnvSource) -> ConfigResult<DeploymentConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let interpolated = interpolate(&raw, env);
    for name in &interpolated.unresolved {
        warn!(
            variable = %name,
            path = %path.display(),
            "Unresolved placeholder left verbatim in deployment config"
        );
    }

    let format = ConfigFormat::from_path(path);
    debug!(path = %path.display(), format = ?format, "Parsing deployment config");
    parse(&interpolated.text, format)
}

/// Parse an already-interpolated deployment config.
pub fn parse(text: &str, format: ConfigFormat) -> ConfigResult<DeploymentConfig> {
    let config = match format {
        ConfigFormat::Yaml => parse_yaml(text)?,
        ConfigFormat::Kdl => parse_kdl(text)?,
    };
    config.validate()?;
    Ok(config)
}

fn parse_yaml(text: &str) -> ConfigResult<DeploymentConfig> {
    Ok(serde_yaml::from_str(text)?)
}

fn parse_kdl(text: &str) -> ConfigResult<DeploymentConfig> {
    let doc: KdlDocument = text.parse()?;

    let mut provider = None;
    let mut aws = None;
    let mut services = BTreeMap::new();

    for node in doc.nodes() {
        match node.name().value() {
            "provider" => {
                let value = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("provider".to_string()))?;
                provider = Some(value.parse::<Provider>()?);
            }
            "aws" => {
                aws = Some(parse_aws(node)?);
            }
            "services" => {
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        let name = child.name().value().to_string();
                        let service = parse_service(&name, child)?;
                        services.insert(name, service);
                    }
                }
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(DeploymentConfig {
        provider: provider.ok_or_else(|| ConfigError::MissingField("provider".to_string()))?,
        aws: aws.ok_or_else(|| ConfigError::MissingField("aws".to_string()))?,
        services,
    })
}

fn parse_aws(node: &KdlNode) -> ConfigResult<AwsSettings> {
    Ok(AwsSettings {
        region: get_setting(node, "region").unwrap_or_default(),
        ecr_repository_prefix: get_setting(node, "ecr-repository-prefix").unwrap_or_default(),
        ecs_cluster: get_setting(node, "ecs-cluster").unwrap_or_default(),
        account_id: get_setting(node, "account-id"),
    })
}

fn parse_service(name: &str, node: &KdlNode) -> ConfigResult<ServiceConfig> {
    let field = |key: &str| {
        get_setting(node, key)
            .ok_or_else(|| ConfigError::MissingField(format!("services.{}.{}", name, key)))
    };

    Ok(ServiceConfig {
        directory: get_setting(node, "directory").unwrap_or_default(),
        task_definition: field("task-definition")?,
        service_name: field("service-name")?,
        container_name: field("container-name")?,
    })
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| value_to_string(e.value()))
}

/// A setting given either as a property (`key="v"`) or a child node (`key "v"`).
fn get_setting(node: &KdlNode, key: &str) -> Option<String> {
    if let Some(value) = node.get(key).and_then(value_to_string) {
        return Some(value);
    }

    node.children()?
        .nodes()
        .iter()
        .find(|child| child.name().value() == key)
        .and_then(get_first_string_arg)
}

fn value_to_string(value: &kdl::KdlValue) -> Option<String> {
    value
        .as_string()
        .map(|s| s.to_string())
        .or_else(|| value.as_integer().map(|n| n.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const YAML: &str = r#"
provider: aws
aws:
  region: ${AWS_REGION}
  ecrRepositoryPrefix: shop
  ecsCluster: production
  accountId: ${AWS_ACCOUNT_ID}
services:
  svc-api:
    directory: svc/api
    taskDefinition: shop-api
    serviceName: shop-api-service
    containerName: api
  root:
    taskDefinition: shop-web
    serviceName: shop-web-service
    containerName: web
"#;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml_with_env() {
        let file = write_config(".yml", YAML);
        let env = env(&[("AWS_REGION", "eu-west-1"), ("AWS_ACCOUNT_ID", "123456789012")]);

        let config = load_with(file.path(), &env).unwrap();
        assert_eq!(config.provider, Provider::Aws);
        assert_eq!(config.aws.region, "eu-west-1");
        // Interpolated bare number still becomes a string.
        assert_eq!(config.aws.account_id.as_deref(), Some("123456789012"));
        assert_eq!(config.services.len(), 2);

        let api = config.service("svc-api").unwrap();
        assert_eq!(api.directory, "svc/api");
        assert_eq!(api.container_name, "api");
        assert_eq!(config.service("root").unwrap().directory, "");
    }

    #[test]
    fn test_unresolved_placeholder_left_verbatim() {
        let file = write_config(".yaml", YAML);
        let env = env(&[("AWS_ACCOUNT_ID", "123456789012")]);

        let config = load_with(file.path(), &env).unwrap();
        assert_eq!(config.aws.region, "${AWS_REGION}");
    }

    #[test]
    fn test_missing_file() {
        let err = load_with(Path::new("/nonexistent/deploy.yml"), &HashMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = parse("provider: [aws", ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));

        // Missing the aws block entirely.
        let err = parse("provider: aws\n", ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_unknown_provider() {
        let text = "provider: gcp\naws:\n  region: r\n  ecrRepositoryPrefix: p\n  ecsCluster: c\n";
        assert!(parse(text, ConfigFormat::Yaml).is_err());
    }

    #[test]
    fn test_empty_required_setting() {
        let text = "provider: aws\naws:\n  region: \"\"\n  ecrRepositoryPrefix: p\n  ecsCluster: c\n";
        let err = parse(text, ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f == "aws.region"));
    }

    #[test]
    fn test_services_default_to_empty() {
        let text = "provider: aws\naws:\n  region: r\n  ecrRepositoryPrefix: p\n  ecsCluster: c\n";
        let config = parse(text, ConfigFormat::Yaml).unwrap();
        assert!(config.services.is_empty());
        assert!(config.aws.account_id.is_none());
    }

    #[test]
    fn test_parse_kdl() {
        let kdl = r#"
            provider "aws"
            aws {
                region "us-east-1"
                ecr-repository-prefix "shop"
                ecs-cluster "production"
                account-id "123456789012"
            }
            services {
                svc-api directory="svc/api" task-definition="shop-api" service-name="shop-api-service" container-name="api"
                worker {
                    task-definition "shop-worker"
                    service-name "shop-worker-service"
                    container-name "worker"
                }
            }
        "#;

        let config = parse(kdl, ConfigFormat::Kdl).unwrap();
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.aws.account_id.as_deref(), Some("123456789012"));
        assert_eq!(config.service("svc-api").unwrap().directory, "svc/api");
        assert_eq!(
            config.service("worker").unwrap().task_definition,
            "shop-worker"
        );
    }

    #[test]
    fn test_kdl_service_missing_container() {
        let kdl = r#"
            provider "aws"
            aws {
                region "us-east-1"
                ecr-repository-prefix "shop"
                ecs-cluster "production"
            }
            services {
                api task-definition="shop-api" service-name="shop-api-service"
            }
        "#;

        let err = parse(kdl, ConfigFormat::Kdl).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(f) if f.contains("container-name")));
    }

    #[test]
    fn test_load_kdl_by_extension() {
        let kdl = "provider \"aws\"\naws {\n    region \"${REGION}\"\n    ecr-repository-prefix \"shop\"\n    ecs-cluster \"c\"\n}\n";
        let file = write_config(".kdl", kdl);

        let config = load_with(file.path(), &env(&[("REGION", "ap-south-1")])).unwrap();
        assert_eq!(config.aws.region, "ap-south-1");
    }

    #[test]
    fn test_default_service_naming() {
        let config = parse(
            "provider: aws\naws:\n  region: r\n  ecrRepositoryPrefix: shop\n  ecsCluster: c\n",
            ConfigFormat::Yaml,
        )
        .unwrap();

        let svc = config.default_service("svc-api");
        assert_eq!(svc.directory, "svc-api");
        assert_eq!(svc.task_definition, "shop-svc-api");
        assert_eq!(svc.service_name, "shop-svc-api-service");
        assert_eq!(svc.container_name, "svc-api");
    }

    #[test]
    fn test_resolve_service_keeps_explicit_entry() {
        let mut config = parse(
            r#"
provider: aws
aws:
  region: r
  ecrRepositoryPrefix: shop
  ecsCluster: c
services:
  api:
    taskDefinition: custom-td
    serviceName: api-svc
    containerName: app
"#,
            ConfigFormat::Yaml,
        )
        .unwrap();

        assert_eq!(config.resolve_service("api").task_definition, "custom-td");
        assert_eq!(config.resolve_service("worker").service_name, "shop-worker-service");
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.service("worker"), Some(&config.default_service("worker")));
    }

    #[test]
    fn test_account_id_and_registry() {
        let mut config = parse(
            "provider: aws\naws:\n  region: eu-west-1\n  ecrRepositoryPrefix: shop\n  ecsCluster: c\n",
            ConfigFormat::Yaml,
        )
        .unwrap();

        assert_eq!(config.account_id(&HashMap::new()), None);
        assert_eq!(
            config.account_id(&env(&[("AWS_ACCOUNT_ID", "999")])),
            Some("999".to_string())
        );

        config.aws.account_id = Some("111".to_string());
        assert_eq!(
            config.account_id(&env(&[("AWS_ACCOUNT_ID", "999")])),
            Some("111".to_string())
        );

        let host = config.registry_host("111");
        assert_eq!(host, "111.dkr.ecr.eu-west-1.amazonaws.com");
        let svc = config.default_service("api");
        assert_eq!(
            config.repository_uri(&host, &svc),
            "111.dkr.ecr.eu-west-1.amazonaws.com/shop/shop-api-service"
        );
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("deploy.kdl")), ConfigFormat::Kdl);
        assert_eq!(ConfigFormat::from_path(Path::new("deploy.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("deploy")), ConfigFormat::Yaml);
    }
}
