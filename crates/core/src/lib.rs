//! Core types for QuorumDB
//!
//! This crate defines the foundational types shared by the store and
//! replication layers:
//! - RecordId: (cluster, position) record identifier, temporary while negative
//! - NodeId: identity of a cluster node, travels with every lock call
//! - FieldValue / RecordPayload: record field data, including links to other records
//! - VersionedRecord: payload plus its committed version
//! - Error: error taxonomy with retryable classification

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod node;
pub mod record;
pub mod rid;

pub use error::{Error, Result};
pub use node::NodeId;
pub use record::{FieldValue, RecordPayload, VersionedRecord};
pub use rid::RecordId;
