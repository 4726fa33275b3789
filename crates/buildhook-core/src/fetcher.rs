//! Source fetcher trait.

use async_trait::async_trait;
use std::path::Path;

use crate::error::FetchError;

/// Materialises one commit of a repository in a clean directory.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Remove `target_dir` if present, clone `clone_url` into it and check
    /// out `commit_ref`.
    async fn fetch(
        &self,
        clone_url: &str,
        commit_ref: &str,
        target_dir: &Path,
    ) -> Result<(), FetchError>;
}
