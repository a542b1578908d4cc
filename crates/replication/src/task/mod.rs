//! Replicated tasks
//!
//! A task is the unit shipped by the replication layer to every replica of a
//! database. This module holds the task contract plus the transaction task
//! and its compensating tasks.

pub mod fix;
pub mod record;
pub mod result;
pub mod tx;

use crate::config::ReplicationConfig;
use quorum_core::NodeId;
use quorum_store::RecordLockManager;
use std::sync::Arc;
use std::time::Duration;

/// How many replicas must agree on a task's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuorumType {
    /// No agreement required.
    None,
    /// Agreement among read-capable replicas.
    Read,
    /// Agreement among write-capable replicas.
    Write,
    /// Every replica must agree.
    All,
}

/// Node-local context a task executes in.
///
/// `source_node` is the identity of the requesting node; it travels with
/// every lock and unlock call so the lock manager can reject foreign
/// releases.
pub struct TaskContext {
    /// The node executing the task.
    pub local_node: NodeId,
    /// The node the request originated from (lock requester identity).
    pub source_node: NodeId,
    /// Advisory lock table for the target database.
    pub lock_manager: Arc<RecordLockManager>,
    /// Server-supplied tunables.
    pub config: ReplicationConfig,
}

/// Contract every task kind exposes to the replication layer.
pub trait ReplicatedTask {
    /// Short name for dispatch tables and operator logs.
    fn name(&self) -> &'static str;

    /// Quorum semantics required for this task's outcome.
    fn quorum_type(&self) -> QuorumType;

    /// Permissible round-trip time before the caller abandons the task.
    fn distributed_timeout(&self, config: &ReplicationConfig) -> Duration;
}
