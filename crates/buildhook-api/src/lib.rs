//! Webhook gateway for buildhook.
//!
//! Receives push notifications over HTTP and hands accepted ones to the job
//! dispatcher.

pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;
