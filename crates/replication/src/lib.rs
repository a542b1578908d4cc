//! Replicated transaction tasks for QuorumDB
//!
//! This crate implements the unit of work a node executes when a
//! multi-record transaction is applied across replicas:
//! - `TxTask`: batches create/update/delete operations into one atomic local
//!   commit, pre-locking affected records and resolving temporary
//!   identifiers created mid-batch
//! - `FixTxTask`: compensating task that rolls a divergent replica forward
//!   (fix) or unwinds an already-applied transaction (undo)
//! - `RecordTask`: the closed set of per-record operations
//!
//! Execution never unwinds past the task boundary: every failure becomes a
//! [`TaskOutcome`] value the replication layer can compare across replicas.

pub mod config;
pub mod task;

mod wire;

pub use config::ReplicationConfig;
pub use task::fix::{CompensatingAction, FixTxTask};
pub use task::record::{RecordTask, UndoInput};
pub use task::result::{BadResponse, OpOutcome, TaskOutcome, TxTaskResult};
pub use task::tx::TxTask;
pub use task::{QuorumType, ReplicatedTask, TaskContext};
