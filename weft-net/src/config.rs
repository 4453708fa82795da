//! Replication service configuration

use std::time::Duration;

/// Process-wide tunables for the replication service.
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Deadline for a single outbound request to a peer.
    pub req_timeout: Duration,
    /// Deadline for a background history pull across all of a log's
    /// addresses.
    pub history_timeout: Duration,
    /// Maximum number of records requested in one pull.
    pub max_pull_limit: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            req_timeout: Duration::from_secs(5),
            history_timeout: Duration::from_secs(60),
            max_pull_limit: 10_000,
        }
    }
}
