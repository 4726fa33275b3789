//! Source fetching, service discovery and image builds for buildhook.
//!
//! External tools are driven as child processes:
//! - `git` for cloning and checkout
//! - `docker` for building, tagging and pushing images

pub mod command;
pub mod discovery;
pub mod docker;
pub mod git;

pub use discovery::ServiceDiscoverer;
pub use docker::DockerCli;
pub use git::GitFetcher;
