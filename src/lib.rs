//! QuorumDB - Replicated transaction coordination for a distributed record database
//!
//! QuorumDB replicates batches of record operations (create, update, delete)
//! across a cluster. Each batch travels as a transaction task, commits
//! atomically on every replica, and reports a comparable outcome so the
//! coordinator can vote on agreement and repair divergent nodes.
//!
//! # Quick Start
//!
//! ```ignore
//! use quorumdb::{
//!     FieldValue, LocalStore, RecordId, RecordPayload, RecordTask, TxTask,
//! };
//!
//! // Build a batch: create one record, link it from another.
//! let mut doc = RecordPayload::new();
//! doc.set("name", FieldValue::String("Alice".into()));
//!
//! let temp = RecordId::temporary(0);
//! let mut task = TxTask::new();
//! task.add(RecordTask::create(temp, doc));
//!
//! // Execute on a replica; the outcome is compared across the cluster.
//! let outcome = task.execute(&ctx, &store);
//! ```
//!
//! # Architecture
//!
//! The workspace is layered: `quorum-core` holds the record model and error
//! taxonomy, `quorum-store` the local versioned store and the record lock
//! manager, `quorum-replication` the transaction task, its wire form, and
//! the compensating fix/undo tasks.

pub use quorum_core::*;
pub use quorum_replication::*;
pub use quorum_store::*;
