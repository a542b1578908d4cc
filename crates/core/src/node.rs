//! Node identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a node in the cluster.
///
/// The requesting node's identity travels with every lock and unlock call
/// so the lock manager can reject foreign unlock attempts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node identity from its cluster-wide name.
    pub fn new(name: impl Into<String>) -> Self {
        NodeId(name.into())
    }

    /// The node name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(name: &str) -> Self {
        NodeId::new(name)
    }
}
