//! Log payloads
//!
//! The engine stores opaque bytes. This module gives the durability log a
//! concrete payload: one key-value mutation, bincode-encoded.

use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};

/// A mutating operation recorded in the durability log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Set an absolute expiry (unix millis) on a key
    Expire { key: Vec<u8>, at_millis: u64 },

    /// Drop every key
    FlushAll,
}

impl Operation {
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| LogError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| LogError::Serialization(e.to_string()))
    }

    /// Key touched by the operation, if any
    pub fn key(&self) -> Option<&[u8]> {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } | Operation::Expire { key, .. } => {
                Some(key.as_slice())
            }
            Operation::FlushAll => None,
        }
    }
}
