//! Discovered services and image maps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// File marking a directory as a buildable unit.
pub const BUILD_DESCRIPTOR: &str = "Dockerfile";

/// Service name given to a build descriptor at the repository root.
pub const ROOT_SERVICE_NAME: &str = "root";

/// Joins path components into a service name.
pub const NAME_SEPARATOR: &str = "-";

/// Service name to locally built image reference. Only successful builds.
pub type BuiltImages = BTreeMap<String, String>;

/// Service name to fully qualified remote image reference.
pub type PublishedImages = BTreeMap<String, String>;

/// A directory in the working tree holding a build descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredService {
    pub name: String,
    /// Build context: the directory containing the descriptor.
    pub context_dir: PathBuf,
    pub build_descriptor_path: PathBuf,
    /// Set once the image has been built.
    pub image_ref: Option<String>,
}

impl DiscoveredService {
    pub fn new(root: &Path, descriptor: PathBuf) -> Self {
        let context_dir = descriptor
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());
        let relative = context_dir.strip_prefix(root).unwrap_or(&context_dir);

        Self {
            name: service_name(relative),
            context_dir,
            build_descriptor_path: descriptor,
            image_ref: None,
        }
    }
}

/// Derive a service name from a directory path relative to the repository root.
///
/// `svc/api` becomes `svc-api`; the root itself becomes [`ROOT_SERVICE_NAME`].
pub fn service_name(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        ROOT_SERVICE_NAME.to_string()
    } else {
        parts.join(NAME_SEPARATOR)
    }
}

/// Deterministic local tag for a service image.
pub fn local_image_tag(namespace: &str, service: &str) -> String {
    format!("{}-{}:local", namespace, service.to_lowercase())
}
