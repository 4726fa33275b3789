//! Service discovery and image builds.
//!
//! Every directory under the working tree that directly contains a
//! `Dockerfile` is one service. Builds run one after another; a failed build
//! is logged and left out of the result without stopping the rest.

use buildhook_core::builder::{BuildRequest, ImageBuilder};
use buildhook_core::service::{BUILD_DESCRIPTOR, local_image_tag};
use buildhook_core::{BuiltImages, DiscoveredService};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Version-control metadata directories never searched.
const SKIPPED_DIRS: &[&str] = &[".git", ".hg", ".svn"];

pub struct ServiceDiscoverer {
    builder: Arc<dyn ImageBuilder>,
    namespace: String,
}

impl ServiceDiscoverer {
    pub fn new(builder: Arc<dyn ImageBuilder>, namespace: impl Into<String>) -> Self {
        Self {
            builder,
            namespace: namespace.into(),
        }
    }

    /// Find all services under `root`, ordered by path.
    ///
    /// Symlinked directories are not followed. When two directories map to
    /// the same service name the first one wins.
    pub async fn discover(&self, root: &Path) -> std::io::Result<Vec<DiscoveredService>> {
        let mut services = Vec::new();
        scan_directory(root, root, &mut services).await?;

        let mut by_name: BTreeMap<String, DiscoveredService> = BTreeMap::new();
        let mut ordered = Vec::with_capacity(services.len());
        for service in services {
            if let Some(existing) = by_name.get(&service.name) {
                warn!(
                    service = %service.name,
                    kept = %existing.context_dir.display(),
                    skipped = %service.context_dir.display(),
                    "Service name collision, skipping"
                );
                continue;
            }
            by_name.insert(service.name.clone(), service.clone());
            ordered.push(service);
        }

        Ok(ordered)
    }

    /// Discover and build every service under `root`.
    ///
    /// Returns only the services whose build succeeded.
    pub async fn build_all(&self, root: &Path) -> std::io::Result<BuiltImages> {
        let mut services = self.discover(root).await?;

        if services.is_empty() {
            info!(path = %root.display(), "No Dockerfiles found");
            return Ok(BuiltImages::new());
        }

        self.build(&mut services).await;

        Ok(services
            .into_iter()
            .filter_map(|service| service.image_ref.map(|image| (service.name, image)))
            .collect())
    }

    /// Build `services` in order, setting `image_ref` on each one that succeeds.
    pub async fn build(&self, services: &mut [DiscoveredService]) {
        info!(count = services.len(), builder = self.builder.name(), "Building services");

        let mut built = 0;
        for service in services.iter_mut() {
            let tag = local_image_tag(&self.namespace, &service.name);
            let request = BuildRequest {
                context_dir: service.context_dir.clone(),
                descriptor: service.build_descriptor_path.clone(),
                tag: tag.clone(),
            };

            match self.builder.build(&request).await {
                Ok(output) => {
                    debug!(service = %service.name, output = %output, "Build output");
                    info!(service = %service.name, image = %tag, "Built image");
                    service.image_ref = Some(tag);
                    built += 1;
                }
                Err(e) => {
                    error!(
                        service = %service.name,
                        error = %e,
                        "Failed to build image"
                    );
                }
            }
        }

        info!(
            built,
            failed = services.len() - built,
            "Finished building services"
        );
    }
}

#[async_recursion::async_recursion]
async fn scan_directory(
    root: &Path,
    current: &Path,
    services: &mut Vec<DiscoveredService>,
) -> std::io::Result<()> {
    let mut entries = tokio::fs::read_dir(current).await?;
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        // file_type does not follow symlinks
        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        } else if file_type.is_file() {
            files.push(entry.file_name());
        }
    }

    if files.iter().any(|name| name == BUILD_DESCRIPTOR) {
        let descriptor = current.join(BUILD_DESCRIPTOR);
        debug!(path = %descriptor.display(), "Found Dockerfile");
        services.push(DiscoveredService::new(root, descriptor));
    }

    dirs.sort();
    for dir in dirs {
        let skipped = dir
            .file_name()
            .map(|name| SKIPPED_DIRS.iter().any(|s| name == *s))
            .unwrap_or(false);
        if skipped {
            continue;
        }

        if let Err(e) = scan_directory(root, &dir, services).await {
            warn!(path = %dir.display(), error = %e, "Skipping unreadable directory");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use buildhook_core::CommandError;
    use std::sync::Mutex;

    /// Records requests; fails for tags listed in `fail`.
    #[derive(Default)]
    struct MockBuilder {
        requests: Mutex<Vec<BuildRequest>>,
        fail: Vec<String>,
    }

    #[async_trait]
    impl ImageBuilder for MockBuilder {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn build(&self, request: &BuildRequest) -> Result<String, CommandError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail.contains(&request.tag) {
                return Err(CommandError::Failed {
                    program: "docker".to_string(),
                    code: Some(1),
                    output: "failed to solve".to_string(),
                });
            }
            Ok(String::new())
        }
    }

    fn write_descriptor(root: &Path, relative: &str) {
        let dir = root.join(relative);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(BUILD_DESCRIPTOR), "FROM scratch\n").unwrap();
    }

    #[tokio::test]
    async fn test_discovers_only_directories_with_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "api");
        write_descriptor(dir.path(), "svc/worker");
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/README.md"), "hi").unwrap();
        // Only the exact file name counts
        std::fs::create_dir_all(dir.path().join("tools")).unwrap();
        std::fs::write(dir.path().join("tools/Dockerfile.dev"), "FROM scratch").unwrap();

        let discoverer = ServiceDiscoverer::new(Arc::new(MockBuilder::default()), "project");
        let services = discoverer.discover(dir.path()).await.unwrap();

        let names: Vec<_> = services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["api", "svc-worker"]);
    }

    #[tokio::test]
    async fn test_root_and_nested_names() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "");
        write_descriptor(dir.path(), "svc/api");

        let builder = Arc::new(MockBuilder::default());
        let discoverer = ServiceDiscoverer::new(builder.clone(), "project");
        let built = discoverer.build_all(dir.path()).await.unwrap();

        assert_eq!(built.len(), 2);
        assert_eq!(built["root"], "project-root:local");
        assert_eq!(built["svc-api"], "project-svc-api:local");

        let requests = builder.requests.lock().unwrap();
        let api = requests
            .iter()
            .find(|r| r.tag == "project-svc-api:local")
            .unwrap();
        assert_eq!(api.context_dir, dir.path().join("svc/api"));
        assert_eq!(api.descriptor, dir.path().join("svc/api/Dockerfile"));
    }

    #[tokio::test]
    async fn test_failed_build_is_left_out() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "a");
        write_descriptor(dir.path(), "b");
        write_descriptor(dir.path(), "c");

        let builder = Arc::new(MockBuilder {
            fail: vec!["project-b:local".to_string()],
            ..Default::default()
        });
        let discoverer = ServiceDiscoverer::new(builder.clone(), "project");
        let built = discoverer.build_all(dir.path()).await.unwrap();

        assert_eq!(built.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        // Every service was still attempted
        assert_eq!(builder.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_build_sets_image_ref_on_success() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "a");
        write_descriptor(dir.path(), "b");

        let builder = Arc::new(MockBuilder {
            fail: vec!["project-b:local".to_string()],
            ..Default::default()
        });
        let discoverer = ServiceDiscoverer::new(builder, "project");
        let mut services = discoverer.discover(dir.path()).await.unwrap();
        assert!(services.iter().all(|s| s.image_ref.is_none()));

        discoverer.build(&mut services).await;

        assert_eq!(services[0].image_ref.as_deref(), Some("project-a:local"));
        assert_eq!(services[1].image_ref, None);
    }

    #[tokio::test]
    async fn test_empty_tree_builds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let builder = Arc::new(MockBuilder::default());
        let discoverer = ServiceDiscoverer::new(builder.clone(), "project");

        assert!(discoverer.build_all(dir.path()).await.unwrap().is_empty());
        assert!(builder.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skips_vcs_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), ".git/hooks");
        write_descriptor(dir.path(), "web");

        let discoverer = ServiceDiscoverer::new(Arc::new(MockBuilder::default()), "project");
        let services = discoverer.discover(dir.path()).await.unwrap();

        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "web");
    }

    #[tokio::test]
    async fn test_name_collision_keeps_first() {
        let dir = tempfile::tempdir().unwrap();
        // Both map to "a-b"
        write_descriptor(dir.path(), "a/b");
        write_descriptor(dir.path(), "a-b");

        let discoverer = ServiceDiscoverer::new(Arc::new(MockBuilder::default()), "project");
        let services = discoverer.discover(dir.path()).await.unwrap();

        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "a-b");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_does_not_follow_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        write_descriptor(dir.path(), "real");
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();

        let discoverer = ServiceDiscoverer::new(Arc::new(MockBuilder::default()), "project");
        let services = discoverer.discover(dir.path()).await.unwrap();

        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "real");
    }
}
