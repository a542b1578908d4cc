//! Local store and lock manager for QuorumDB
//!
//! This crate provides the two collaborators the replication layer executes
//! against on each node:
//! - `LocalStore` / `StoreTransaction`: an in-memory versioned record store
//!   with optimistic transactions (stage, validate, commit atomically)
//! - `RecordLockManager`: per-database advisory locks on record identifiers,
//!   keyed by the requesting node

pub mod locks;
pub mod store;

pub use locks::RecordLockManager;
pub use store::{LocalStore, StoreTransaction, DEFAULT_CLUSTER};
