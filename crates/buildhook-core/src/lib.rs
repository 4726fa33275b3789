//! Core domain types and traits for buildhook.
//!
//! This crate contains:
//! - Push events and event-type classification
//! - Webhook signature verification
//! - Build jobs, discovered services and image maps
//! - Seams for external tools (git, image builder, registry, orchestrator)

pub mod builder;
pub mod deployer;
pub mod env;
pub mod error;
pub mod event;
pub mod fetcher;
pub mod id;
pub mod job;
pub mod registry;
pub mod service;
pub mod signature;

pub use env::{EnvSource, ProcessEnv};
pub use error::{CommandError, FetchError, FetchStage, ParseError};
pub use event::{EventKind, PushEvent};
pub use id::JobId;
pub use job::BuildJob;
pub use service::{BuiltImages, DiscoveredService, PublishedImages};
