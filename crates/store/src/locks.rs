//! Advisory record locks
//!
//! The lock manager grants exclusive, non-blocking advisory locks on record
//! identifiers. A lock request either succeeds immediately or fails; nothing
//! ever waits. The requesting node's identity is stored with the lock so
//! that only the holder can release it (stale or foreign unlock attempts are
//! rejected).

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use quorum_core::{NodeId, RecordId};

/// Per-database advisory lock table keyed by record identifier.
#[derive(Debug, Default)]
pub struct RecordLockManager {
    locks: DashMap<RecordId, NodeId>,
}

impl RecordLockManager {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to acquire an exclusive lock on `rid` for `requester`.
    ///
    /// Returns `true` if the lock was acquired, or if `requester` already
    /// holds it (a node retrying its own batch must not self-deadlock).
    /// Returns `false` when another requester holds the lock.
    pub fn try_lock(&self, rid: RecordId, requester: &NodeId) -> bool {
        match self.locks.entry(rid) {
            Entry::Occupied(e) => e.get() == requester,
            Entry::Vacant(v) => {
                v.insert(requester.clone());
                true
            }
        }
    }

    /// Release the lock on `rid` if `requester` holds it.
    ///
    /// Returns `true` if a lock was released. Unlock attempts by a
    /// non-holder leave the lock in place and return `false`.
    pub fn unlock(&self, rid: &RecordId, requester: &NodeId) -> bool {
        self.locks
            .remove_if(rid, |_, holder| holder == requester)
            .is_some()
    }

    /// Current holder of the lock on `rid`, if any.
    pub fn holder(&self, rid: &RecordId) -> Option<NodeId> {
        self.locks.get(rid).map(|entry| entry.value().clone())
    }

    /// Whether `rid` is currently locked by anyone.
    pub fn is_locked(&self, rid: &RecordId) -> bool {
        self.locks.contains_key(rid)
    }

    /// Number of held locks.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True when no locks are held.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
