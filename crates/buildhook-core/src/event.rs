//! Push events and webhook event classification.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Header carrying the event type.
pub const EVENT_HEADER: &str = "X-GitHub-Event";

/// Event-type header value providers send when a webhook is first set up.
pub const PING_EVENT: &str = "ping";

/// Default event type that triggers a build.
pub const DEFAULT_TRIGGER_EVENT: &str = "push";

/// How the gateway should treat a delivery, judged from its event-type header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Connectivity check; acknowledged without a build.
    Ping,
    /// The configured build-trigger event.
    Trigger,
    /// Anything else, including a missing header.
    Unsupported(String),
}

impl EventKind {
    pub fn classify(header: Option<&str>, trigger_event: &str) -> Self {
        match header {
            Some(PING_EVENT) => EventKind::Ping,
            Some(event) if event == trigger_event => EventKind::Trigger,
            Some(event) => EventKind::Unsupported(event.to_string()),
            None => EventKind::Unsupported(String::new()),
        }
    }
}

/// The parts of a push notification needed to build it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    pub clone_url: String,
    pub commit_ref: String,
}

impl PushEvent {
    /// Parse a raw push payload.
    ///
    /// Only `repository.clone_url` and `after` are read; every other field
    /// is ignored.
    pub fn from_payload(body: &[u8]) -> Result<Self, ParseError> {
        let payload: serde_json::Value = serde_json::from_slice(body)?;
        Self::from_value(&payload)
    }

    pub fn from_value(payload: &serde_json::Value) -> Result<Self, ParseError> {
        let clone_url = payload
            .get("repository")
            .and_then(|r| r.get("clone_url"))
            .and_then(|u| u.as_str())
            .ok_or(ParseError::MissingField("repository.clone_url"))?;

        let commit_ref = payload
            .get("after")
            .and_then(|a| a.as_str())
            .ok_or(ParseError::MissingField("after"))?;

        Self::new(clone_url, commit_ref)
    }

    /// Build an event from its parts, with the same checks as payload parsing.
    pub fn new(clone_url: &str, commit_ref: &str) -> Result<Self, ParseError> {
        Ok(PushEvent {
            clone_url: validate_arg("repository.clone_url", clone_url)?,
            commit_ref: validate_arg("after", commit_ref)?,
        })
    }

    /// First seven characters of the commit reference, for log lines.
    pub fn short_ref(&self) -> &str {
        let end = self
            .commit_ref
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.commit_ref.len());
        &self.commit_ref[..end]
    }
}

// Both values end up as git command-line arguments.
fn validate_arg(field: &'static str, value: &str) -> Result<String, ParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ParseError::InvalidField {
            field,
            reason: "empty".to_string(),
        });
    }
    if value.starts_with('-') {
        return Err(ParseError::InvalidField {
            field,
            reason: "must not start with '-'".to_string(),
        });
    }
    Ok(value.to_string())
}
