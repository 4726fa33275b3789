//! Job execution and dispatch for buildhook.
//!
//! A job runs fetch, build and (optionally) publish and rollout strictly in
//! order. The dispatcher runs each job on its own tokio task, bounded by a
//! semaphore and serialized per working directory.

pub mod dispatcher;
pub mod error;
pub mod runner;

pub use dispatcher::JobDispatcher;
pub use error::JobError;
pub use runner::{JobReport, JobRunner, Toolchain};
