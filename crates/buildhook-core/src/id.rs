//! Job identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one accepted webhook delivery and the job it starts.
/// Uses UUIDv7 so ids sort by acceptance time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_ids_are_unique() {
        let first = JobId::new();
        let second = JobId::new();
        assert_ne!(first, second);

        let uuid = Uuid::parse_str(&first.to_string()).unwrap();
        assert_eq!(uuid.get_version_num(), 7);
    }
}
