//! Wire form of the transaction task
//!
//! A transaction task crosses the cluster as an ordered count followed by
//! each record operation in its own frame:
//!
//! ```text
//! [count: u32][len: u32][op: bincode] ... [len: u32][op: bincode]
//! ```
//!
//! Only the operation list is encoded. The execution result and the lock
//! policy are process-local and never leave the node; transient operation
//! state (assigned identifiers, captured previous versions) is skipped by
//! the operation serializers.

use crate::task::record::RecordTask;
use crate::task::tx::TxTask;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use quorum_core::{Error, Result};
use std::io::{Cursor, Read};

impl TxTask {
    /// Encode the task for shipping to a remote node.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(self.ops.len() as u32)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        for op in &self.ops {
            let frame =
                bincode::serialize(op).map_err(|e| Error::Serialization(e.to_string()))?;
            buf.write_u32::<BigEndian>(frame.len() as u32)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            buf.extend_from_slice(&frame);
        }

        Ok(buf)
    }

    /// Decode a task received from a remote node. Operations are re-added
    /// through [`TxTask::add`], which restores their in-transaction marker.
    pub fn from_wire(bytes: &[u8]) -> Result<TxTask> {
        let mut cursor = Cursor::new(bytes);
        let count = cursor
            .read_u32::<BigEndian>()
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let mut task = TxTask::new();
        for _ in 0..count {
            let len = cursor
                .read_u32::<BigEndian>()
                .map_err(|e| Error::Serialization(e.to_string()))?;
            let mut frame = vec![0u8; len as usize];
            cursor
                .read_exact(&mut frame)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            let op: RecordTask = bincode::deserialize(&frame)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            task.add(op);
        }

        if cursor.position() != bytes.len() as u64 {
            return Err(Error::Serialization(format!(
                "{} trailing bytes after {} operations",
                bytes.len() as u64 - cursor.position(),
                count
            )));
        }

        Ok(task)
    }
}
