//! Replication configuration

use std::time::Duration;

/// Tunables for task execution supplied by the surrounding server.
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Base round-trip allowance for a single record operation. The
    /// permissible time for a whole transaction task scales with its batch
    /// size on top of this base.
    pub crud_task_timeout: Duration,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        ReplicationConfig {
            crud_task_timeout: Duration::from_millis(3000),
        }
    }
}
