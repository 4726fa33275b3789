//! Task-definition patching.
//!
//! `describe-task-definition` returns fields that `register-task-definition`
//! refuses; they are removed before the patched document is registered.

use serde_json::Value;
use thiserror::Error;

/// Fields present in a described task definition but not accepted on registration.
pub const READ_ONLY_FIELDS: &[&str] = &[
    "taskDefinitionArn",
    "revision",
    "status",
    "requiresAttributes",
    "compatibilities",
    "registeredAt",
    "registeredBy",
    "deregisteredAt",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("task definition is not a JSON object")]
    NotAnObject,

    #[error("task definition has no containerDefinitions")]
    NoContainers,

    #[error("no container named {0} in task definition")]
    ContainerNotFound(String),
}

/// Copy of `current` with the image of `container` set to `image`.
///
/// Other containers are left untouched.
pub fn patch_image(current: &Value, container: &str, image: &str) -> Result<Value, PatchError> {
    let mut patched = current.clone();
    let object = patched.as_object_mut().ok_or(PatchError::NotAnObject)?;

    for field in READ_ONLY_FIELDS {
        object.remove(*field);
    }

    let containers = object
        .get_mut("containerDefinitions")
        .and_then(|c| c.as_array_mut())
        .ok_or(PatchError::NoContainers)?;

    let target = containers
        .iter_mut()
        .find(|c| c.get("name").and_then(|n| n.as_str()) == Some(container))
        .ok_or_else(|| PatchError::ContainerNotFound(container.to_string()))?;

    target["image"] = Value::String(image.to_string());
    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn described() -> Value {
        json!({
            "taskDefinitionArn": "arn:aws:ecs:us-east-1:123:task-definition/shop-api:7",
            "family": "shop-api",
            "revision": 7,
            "status": "ACTIVE",
            "compatibilities": ["EC2", "FARGATE"],
            "requiresCompatibilities": ["FARGATE"],
            "requiresAttributes": [{"name": "com.amazonaws.ecs.capability.docker-remote-api.1.18"}],
            "registeredAt": "2024-01-01T00:00:00Z",
            "registeredBy": "arn:aws:iam::123:user/ci",
            "cpu": "256",
            "memory": "512",
            "containerDefinitions": [
                {"name": "api", "image": "old/api:1", "essential": true},
                {"name": "sidecar", "image": "envoy:1.29"}
            ]
        })
    }

    #[test]
    fn test_patches_only_named_container() {
        let patched = patch_image(&described(), "api", "reg/shop/api:20240101-000000").unwrap();

        let containers = patched["containerDefinitions"].as_array().unwrap();
        assert_eq!(containers[0]["image"], "reg/shop/api:20240101-000000");
        assert_eq!(containers[0]["essential"], true);
        assert_eq!(containers[1]["image"], "envoy:1.29");
    }

    #[test]
    fn test_strips_read_only_fields() {
        let patched = patch_image(&described(), "api", "x").unwrap();

        for field in READ_ONLY_FIELDS {
            assert!(patched.get(*field).is_none(), "{} should be removed", field);
        }
        assert_eq!(patched["family"], "shop-api");
        assert_eq!(patched["cpu"], "256");
        assert_eq!(patched["requiresCompatibilities"], json!(["FARGATE"]));
    }

    #[test]
    fn test_does_not_modify_input() {
        let current = described();
        patch_image(&current, "api", "x").unwrap();
        assert_eq!(current, described());
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            patch_image(&json!([]), "api", "x").unwrap_err(),
            PatchError::NotAnObject
        );
        assert_eq!(
            patch_image(&json!({"family": "f"}), "api", "x").unwrap_err(),
            PatchError::NoContainers
        );
        assert_eq!(
            patch_image(&described(), "web", "x").unwrap_err(),
            PatchError::ContainerNotFound("web".to_string())
        );
    }
}
