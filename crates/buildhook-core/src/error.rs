//! Error types shared across buildhook crates.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of an external process (git, docker, aws).
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {output}", exit_code_label(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("unexpected output from {program}: {message}")]
    InvalidOutput { program: String, message: String },
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

impl CommandError {
    /// Combined stdout/stderr of a failed command, if any was captured.
    pub fn output(&self) -> Option<&str> {
        match self {
            CommandError::Failed { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Malformed push payload.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Stage of the source fetch that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Prepare,
    Clone,
    Checkout,
}

impl std::fmt::Display for FetchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStage::Prepare => write!(f, "prepare"),
            FetchStage::Clone => write!(f, "clone"),
            FetchStage::Checkout => write!(f, "checkout"),
        }
    }
}

/// Failure to materialise a commit in a working directory.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to prepare {}: {source}", .path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git clone failed: {0}")]
    Clone(#[source] CommandError),

    #[error("git checkout failed: {0}")]
    Checkout(#[source] CommandError),
}

impl FetchError {
    pub fn stage(&self) -> FetchStage {
        match self {
            FetchError::Prepare { .. } => FetchStage::Prepare,
            FetchError::Clone(_) => FetchStage::Clone,
            FetchError::Checkout(_) => FetchStage::Checkout,
        }
    }
}
