//! Record identifiers
//!
//! A record is addressed by a (cluster, position) pair. Positions are
//! assigned by the store when a record is created; until then a record
//! carries a *temporary* identifier with a negative position. Temporary
//! identifiers are only meaningful inside a single transaction batch and
//! must never appear in committed data.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a record: cluster id plus position within the cluster.
///
/// A negative position marks a temporary identifier for a record that has
/// not been persisted yet. A negative cluster means the cluster has not
/// been chosen either (the store picks one at create time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId {
    /// Cluster the record lives in (-1 = not yet assigned).
    pub cluster: i32,
    /// Position within the cluster (negative = temporary).
    pub position: i64,
}

impl RecordId {
    /// Create an identifier from explicit cluster and position.
    pub const fn new(cluster: i32, position: i64) -> Self {
        RecordId { cluster, position }
    }

    /// Create a temporary identifier for the `seq`-th new record of a batch.
    ///
    /// Temporary identifiers use position `-(seq + 1)` so that `seq = 0`
    /// yields a negative position.
    pub const fn temporary(seq: u32) -> Self {
        RecordId {
            cluster: -1,
            position: -(seq as i64) - 1,
        }
    }

    /// True while the record has not been assigned permanent storage.
    pub const fn is_temporary(&self) -> bool {
        self.position < 0
    }

    /// True once both cluster and position are assigned.
    pub const fn is_valid(&self) -> bool {
        self.cluster >= 0 && self.position >= 0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster, self.position)
    }
}
