//! Log Engine Module
//!
//! Append-only record log on top of a [`RotatingFile`](crate::ring::RotatingFile).
//!
//! ## Responsibilities
//! - Append framed records, rotating before a record would start in a full file
//! - Read records from any byte offset, resynchronizing past corruption
//! - Locate files by the timestamp of their first record
//! - Decide when a reader may follow the ring into the next file
//!
//! ## Reading Model
//! ```text
//!   cursor(index, offset, ts)
//!          │
//!          ▼
//!   ┌──────────────┐  bad magic / length / checksum
//!   │ read header  │──────────────► offset += 1, retry
//!   └──────┬───────┘
//!          │ valid
//!          ▼
//!   ┌──────────────┐  0 bytes        ► EndOfFile
//!   │ read payload │  short read     ► error
//!   └──────┬───────┘
//!          ▼
//!   record + cursor(index, offset + record_len, record.ts)
//! ```
//!
//! The engine never moves a cursor into the next file on its own; see
//! [`LogEngine::advance`].

mod engine;
mod reader;
mod seek;

pub use engine::{now_micros, LogEngine};

use crate::record::Record;

/// Position of a reader or writer in the ring
///
/// `offset` always sits on a record boundary or at end of file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Ring file index
    pub index: u32,
    /// Byte offset inside that file
    pub offset: u64,
    /// Timestamp of the last record seen (0 before any record)
    pub timestamp: u64,
}

impl Cursor {
    pub fn new(index: u32, offset: u64) -> Self {
        Self {
            index,
            offset,
            timestamp: 0,
        }
    }

    /// Cursor at the first byte of file `index`
    pub fn start_of(index: u32) -> Self {
        Self::new(index, 0)
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Result of a read call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A record and the cursor positioned just past it
    Record(Record, Cursor),

    /// The file (or the whole ring) is cleanly exhausted
    EndOfFile,

    /// The next ring file exists but starts before the reader's position,
    /// so it has not yet been replaced by the writer's current lap
    SwitchPending,
}

impl ReadOutcome {
    pub fn into_record(self) -> Option<(Record, Cursor)> {
        match self {
            ReadOutcome::Record(record, cursor) => Some((record, cursor)),
            _ => None,
        }
    }
}

/// Decision about moving a reader into the next ring file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Next file is newer than the reader: continue there
    Switched(Cursor),

    /// No next file with data: the reader is at the end of the ring
    EndOfRing,

    /// Next file starts before the reader's last timestamp
    SwitchPending { next: u32, first_timestamp: u64 },
}
