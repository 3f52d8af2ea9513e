//! Log Engine
//!
//! Appends and reads records on one ring of files.

use std::fs;
use std::io::{self, IoSlice};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{LogConfig, SyncStrategy};
use crate::error::{LogError, Result};
use crate::record::encode_header;
use crate::ring::{OpenMode, RotatingFile};

use super::reader::read_record_at;
use super::{Advance, Cursor, ReadOutcome};

/// Record log over a ring of files
///
/// ## Concurrency Model
///
/// Not internally synchronized. One writer per ring directory; any number
/// of readers, each with its own `LogEngine` opened read-only (and so its
/// own file handle). Callers that need concurrent producers serialize
/// `append` themselves, see [`AsyncAppender`](crate::durability::AsyncAppender).
pub struct LogEngine {
    /// The ring this engine reads from or appends to
    pub(super) ring: RotatingFile,

    /// Writer: end of the last append. Reader: position after the last read
    cursor: Cursor,

    /// Highest timestamp stamped or observed
    pub(super) last_timestamp: u64,

    /// Clock of the peer feeding a relay log
    remote_timestamp: u64,

    sync_strategy: SyncStrategy,

    /// Appends since the last fsync
    unsynced: usize,
}

impl LogEngine {
    /// Open the writer side of a ring
    ///
    /// Continues in the file whose first record is newest, or file 0 in an
    /// empty ring.
    pub fn open_writer(config: &LogConfig) -> Result<Self> {
        let mut engine = Self::with_mode(config, OpenMode::Write)?;
        let index = engine.locate_newest_index()?.unwrap_or(0);
        engine.resume_writer_at(index)?;
        Ok(engine)
    }

    /// Open the writer side of a ring at a known file index
    pub fn open_writer_at(config: &LogConfig, index: u32) -> Result<Self> {
        let mut engine = Self::with_mode(config, OpenMode::Write)?;
        engine.resume_writer_at(index)?;
        Ok(engine)
    }

    /// Open a reader. Files are opened lazily by the first read.
    pub fn open_reader(config: &LogConfig) -> Result<Self> {
        Self::with_mode(config, OpenMode::ReadOnly)
    }

    fn with_mode(config: &LogConfig, mode: OpenMode) -> Result<Self> {
        let ring = RotatingFile::from_config(config, mode)?;
        if mode == OpenMode::Write {
            fs::create_dir_all(&config.directory)?;
        }

        Ok(Self {
            ring,
            cursor: Cursor::default(),
            last_timestamp: 0,
            remote_timestamp: 0,
            sync_strategy: config.sync_strategy,
            unsynced: 0,
        })
    }

    /// Position the writer at the end of file `index`
    ///
    /// Raises the timestamp floor to the file's last record so a clock that
    /// stepped back across a restart cannot stamp older records after it.
    fn resume_writer_at(&mut self, index: u32) -> Result<()> {
        self.ring.open_at(index)?;
        if let Some(last) = self.peek_last_timestamp(index)? {
            self.last_timestamp = self.last_timestamp.max(last);
        }

        let offset = self.ring.len()?;
        self.cursor = Cursor {
            index,
            offset,
            timestamp: self.last_timestamp,
        };

        tracing::info!(
            index,
            offset,
            ts = self.last_timestamp,
            prefix = self.ring.prefix(),
            "log writer positioned"
        );
        Ok(())
    }

    // =========================================================================
    // Append
    // =========================================================================

    /// Append a record stamped with the current time
    ///
    /// Returns the timestamp written into the header. Timestamps from one
    /// writer are strictly increasing even if the wall clock is not.
    pub fn append(&mut self, payload: &[u8], session_id: Option<u64>) -> Result<u64> {
        let timestamp = self.next_timestamp();
        self.append_at(payload, session_id, timestamp)
    }

    /// Append a record with a caller-supplied timestamp
    ///
    /// Steps:
    /// 1. Frame the header; an oversized payload fails here, before any I/O
    /// 2. Rotate if the active file is full (a record never spans files)
    /// 3. Write header, session id and payload with one vectored write
    /// 4. On a short or failed write, cut the file back to its prior length
    pub fn append_at(&mut self, payload: &[u8], session_id: Option<u64>, timestamp: u64) -> Result<u64> {
        // Step 1: Frame
        let header = encode_header(payload, timestamp, session_id)?;

        if !self.ring.is_open() {
            self.ring.open()?;
        }

        // Step 2: Rotate before writing
        if self.ring.needs_rotation()? {
            self.rotate()?;
        }

        // Step 3: Write in a single call
        let header_bytes = header.to_bytes();
        let session_bytes = session_id.map(u64::to_ne_bytes);
        let expected = header.record_len() as usize;

        let before = self.ring.len()?;
        let written = {
            let slices: Vec<IoSlice<'_>> = match session_bytes.as_ref() {
                Some(id) => vec![IoSlice::new(&header_bytes), IoSlice::new(id), IoSlice::new(payload)],
                None => vec![IoSlice::new(&header_bytes), IoSlice::new(payload)],
            };
            self.ring.append_vectored(&slices)
        };

        // Step 4: Never leave a partial record behind
        match written {
            Ok(n) if n == expected => {}
            Ok(n) => {
                self.discard_tail(before);
                return Err(LogError::ShortWrite {
                    expected,
                    written: n,
                });
            }
            Err(e) => {
                self.discard_tail(before);
                return Err(e);
            }
        }

        self.cursor = Cursor {
            index: self.ring.index(),
            offset: before + expected as u64,
            timestamp,
        };
        self.last_timestamp = self.last_timestamp.max(timestamp);
        self.after_write()?;

        tracing::trace!(
            index = self.cursor.index,
            offset = before,
            len = payload.len(),
            ts = timestamp,
            "appended record"
        );
        Ok(timestamp)
    }

    fn rotate(&mut self) -> Result<()> {
        if self.sync_strategy != SyncStrategy::Never {
            self.ring.sync()?;
            self.unsynced = 0;
        }

        let previous = self.ring.index();
        let next = self.ring.switch_to_next()?;
        tracing::info!(from = previous, to = next, prefix = self.ring.prefix(), "rotated log file");
        Ok(())
    }

    fn discard_tail(&self, len: u64) {
        if let Err(e) = self.ring.truncate(len) {
            tracing::error!(error = %e, len, "failed to discard partial record");
        }
    }

    fn after_write(&mut self) -> Result<()> {
        match self.sync_strategy {
            SyncStrategy::EveryWrite => self.ring.sync(),
            SyncStrategy::EveryNEntries { count } => {
                self.unsynced += 1;
                if self.unsynced >= count {
                    self.ring.sync()?;
                    self.unsynced = 0;
                }
                Ok(())
            }
            SyncStrategy::Never => Ok(()),
        }
    }

    /// Force pending appends to stable storage
    pub fn sync(&mut self) -> Result<()> {
        if self.ring.is_open() && self.ring.mode() == OpenMode::Write {
            self.ring.sync()?;
            self.unsynced = 0;
        }
        Ok(())
    }

    fn next_timestamp(&self) -> u64 {
        now_micros().max(self.last_timestamp + 1)
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Read the next record at or after `cursor`
    ///
    /// Never moves into another file: the end of the cursor's file is
    /// reported as [`ReadOutcome::EndOfFile`].
    pub fn read_next(&mut self, cursor: Cursor) -> Result<ReadOutcome> {
        if !self.position_at(cursor.index)? {
            return Ok(ReadOutcome::EndOfFile);
        }

        match read_record_at(self.ring.file()?, cursor.index, cursor.offset)? {
            Some((record, next)) => {
                let new_cursor = Cursor {
                    index: cursor.index,
                    offset: next,
                    timestamp: record.timestamp(),
                };
                if self.ring.mode() == OpenMode::ReadOnly {
                    self.cursor = new_cursor;
                }
                self.last_timestamp = self.last_timestamp.max(record.timestamp());
                Ok(ReadOutcome::Record(record, new_cursor))
            }
            None => Ok(ReadOutcome::EndOfFile),
        }
    }

    /// Make the open handle point at file `index`
    ///
    /// Returns false when a reader's file does not exist yet.
    fn position_at(&mut self, index: u32) -> Result<bool> {
        if self.ring.is_open() && self.ring.index() == index {
            return Ok(true);
        }

        if self.ring.mode() == OpenMode::Write {
            return Err(LogError::CursorMismatch {
                cursor: index,
                current: self.ring.index(),
            });
        }

        match self.ring.open_at(index) {
            Ok(()) => Ok(true),
            Err(LogError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Decide whether a reader at the end of `cursor`'s file may continue in
    /// the next ring file
    ///
    /// The next file is accepted only if its first record is not older than
    /// the last record the reader saw. An older first record means the file
    /// still holds the previous lap.
    pub fn advance(&mut self, cursor: &Cursor) -> Result<Advance> {
        let next = self.ring.next_index(cursor.index);
        if next == cursor.index {
            return Ok(Advance::EndOfRing);
        }

        match self.peek_first_timestamp(next)? {
            None => Ok(Advance::EndOfRing),
            Some(first) if first < cursor.timestamp => {
                tracing::debug!(
                    current = cursor.index,
                    next,
                    first_timestamp = first,
                    reader_timestamp = cursor.timestamp,
                    "next ring file is older than reader, switch pending"
                );
                Ok(Advance::SwitchPending {
                    next,
                    first_timestamp: first,
                })
            }
            Some(_) => Ok(Advance::Switched(
                Cursor::start_of(next).with_timestamp(cursor.timestamp),
            )),
        }
    }

    /// Read the next record, following the ring into newer files
    pub fn read_across(&mut self, cursor: Cursor) -> Result<ReadOutcome> {
        let mut cursor = cursor;

        // Each pass moves one file forward, so one lap bounds the loop
        for _ in 0..=self.ring.max_index() {
            match self.read_next(cursor)? {
                ReadOutcome::EndOfFile => match self.advance(&cursor)? {
                    Advance::Switched(next) => cursor = next,
                    Advance::EndOfRing => return Ok(ReadOutcome::EndOfFile),
                    Advance::SwitchPending { .. } => return Ok(ReadOutcome::SwitchPending),
                },
                outcome => return Ok(outcome),
            }
        }

        Ok(ReadOutcome::EndOfFile)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Writer: position after the last append. Reader: after the last read.
    pub fn position(&self) -> Cursor {
        self.cursor
    }

    /// Highest timestamp written or observed by this engine
    pub fn current_timestamp(&self) -> u64 {
        self.last_timestamp
    }

    /// Raise the engine's timestamp floor, e.g. from a loaded checkpoint
    pub fn observe_timestamp(&mut self, timestamp: u64) {
        self.last_timestamp = self.last_timestamp.max(timestamp);
        self.cursor.timestamp = self.cursor.timestamp.max(timestamp);
    }

    pub fn remote_timestamp(&self) -> u64 {
        self.remote_timestamp
    }

    pub fn set_remote_timestamp(&mut self, timestamp: u64) {
        self.remote_timestamp = timestamp;
    }

    pub fn ring(&self) -> &RotatingFile {
        &self.ring
    }

    /// Index of the file the engine has open (or will open first)
    pub fn current_index(&self) -> u32 {
        self.ring.index()
    }
}

/// Microseconds since the Unix epoch
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
