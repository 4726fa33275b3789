//! Image builder trait.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::CommandError;

/// One image build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub context_dir: PathBuf,
    pub descriptor: PathBuf,
    pub tag: String,
}

/// Container build tool.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Name of this builder.
    fn name(&self) -> &'static str;

    /// Build an image, returning the tool's combined output.
    async fn build(&self, request: &BuildRequest) -> Result<String, CommandError>;
}
