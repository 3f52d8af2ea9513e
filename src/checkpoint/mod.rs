//! Checkpoint Module
//!
//! Small text records that let a restarted process resume at an exact ring
//! position.
//!
//! ## Files
//! ```text
//! {directory}/
//!   ├── {prefix}.checkpoint   primary checkpoint, overwritten in place
//!   │     idx:007\r\n
//!   │     curr ts:0001700000000000\r\n
//!   │     curr offset:0000000000004096\r\n
//!   │     remote ts:0000000000000000\r\n
//!   ├── {prefix}.cp           cursor checkpoint, atomic rename
//!   │     7 4096\n
//!   │     7 4200\n
//!   └── {prefix}.index        current file index, atomic rename
//!         7\n
//! ```
//!
//! The persistence style is chosen per store: the primary checkpoint may be
//! torn by a crash (loading then falls back to a ring scan), the relay
//! variants are always replaced atomically.

mod format;
mod pointer;
mod store;

pub use format::CheckpointFormat;
pub use pointer::IndexPointer;
pub use store::{CheckpointStore, PersistStyle};

use crate::log::Cursor;

/// A confirmed ring position plus an optional staged one
///
/// `next_*` is a tentative position ("durable up to here") that becomes the
/// current position on [`confirm`](Checkpoint::confirm).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Checkpoint {
    pub current_index: u32,
    pub current_offset: u64,
    /// Timestamp of the last record covered by the current position
    pub current_timestamp: u64,
    pub next_index: u32,
    pub next_offset: u64,
    pub next_timestamp: u64,
    /// Last clock value reported by the replication peer
    pub remote_timestamp: u64,
}

impl Checkpoint {
    /// Checkpoint whose current and staged positions are both `cursor`
    pub fn at(cursor: Cursor) -> Self {
        let mut checkpoint = Self::default();
        checkpoint.stage(cursor);
        checkpoint.confirm();
        checkpoint
    }

    /// Record a tentative position without confirming it
    pub fn stage(&mut self, cursor: Cursor) {
        self.next_index = cursor.index;
        self.next_offset = cursor.offset;
        self.next_timestamp = cursor.timestamp;
    }

    /// Collapse the staged position into the current one
    pub fn confirm(&mut self) {
        self.current_index = self.next_index;
        self.current_offset = self.next_offset;
        self.current_timestamp = self.next_timestamp;
    }

    /// True when a staged position differs from the confirmed one
    pub fn has_staged(&self) -> bool {
        self.next_index != self.current_index || self.next_offset != self.current_offset
    }

    /// Confirmed position as a cursor
    pub fn cursor(&self) -> Cursor {
        Cursor {
            index: self.current_index,
            offset: self.current_offset,
            timestamp: self.current_timestamp,
        }
    }

    /// Staged position as a cursor
    pub fn staged_cursor(&self) -> Cursor {
        Cursor {
            index: self.next_index,
            offset: self.next_offset,
            timestamp: self.next_timestamp,
        }
    }
}
