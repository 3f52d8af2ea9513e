//! Timestamp positioning
//!
//! Every lookup reads only the first valid record of each ring file, using a
//! short-lived handle so the engine's own handle is left untouched. The one
//! exception is [`LogEngine::peek_last_timestamp`], used when a writer reopens.

use std::fs::File;
use std::io;

use crate::error::{LogError, Result};

use super::reader::read_record_at;
use super::{Cursor, LogEngine, ReadOutcome};

impl LogEngine {
    /// Timestamp of the first valid record in file `index`
    ///
    /// `None` when the file is absent or holds no valid record.
    pub fn peek_first_timestamp(&self, index: u32) -> Result<Option<u64>> {
        let file = match self.open_for_peek(index)? {
            Some(file) => file,
            None => return Ok(None),
        };

        let first = read_record_at(&file, index, 0)?.map(|(record, _)| record.timestamp());
        Ok(first)
    }

    /// Timestamp of the last valid record in file `index`
    ///
    /// Reads the whole file. A truncated record at the tail ends the scan.
    pub fn peek_last_timestamp(&self, index: u32) -> Result<Option<u64>> {
        let file = match self.open_for_peek(index)? {
            Some(file) => file,
            None => return Ok(None),
        };

        let mut offset = 0;
        let mut last = None;
        loop {
            match read_record_at(&file, index, offset) {
                Ok(Some((record, next))) => {
                    last = Some(record.timestamp());
                    offset = next;
                }
                Ok(None) | Err(LogError::ShortRead { .. }) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(last)
    }

    fn open_for_peek(&self, index: u32) -> Result<Option<File>> {
        match File::open(self.ring.file_name_at(index)) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LogError::Io(e)),
        }
    }

    /// First-record timestamp of every ring file that has one
    fn first_timestamps(&self) -> Result<Vec<(u32, u64)>> {
        let mut found = Vec::new();
        for index in 0..self.ring.max_index() {
            if !self.ring.exists_at(index) {
                continue;
            }
            if let Some(ts) = self.peek_first_timestamp(index)? {
                found.push((index, ts));
            }
        }

        tracing::debug!(files = found.len(), prefix = self.ring.prefix(), "scanned ring");
        Ok(found)
    }

    /// File to start reading from to reach `target_ts`
    ///
    /// Picks the file with the latest first timestamp that is still
    /// `<= target_ts`. If every file starts after the target, falls back to
    /// the oldest file. `None` only for a ring without any records.
    pub fn locate_index_by_timestamp(&self, target_ts: u64) -> Result<Option<u32>> {
        let files = self.first_timestamps()?;

        let at_or_before = files
            .iter()
            .filter(|(_, ts)| *ts <= target_ts)
            .max_by_key(|(_, ts)| *ts);

        let chosen = match at_or_before {
            Some(&(index, _)) => Some(index),
            None => files.iter().min_by_key(|(_, ts)| *ts).map(|&(index, _)| index),
        };

        tracing::debug!(target_ts, index = ?chosen, "located file by timestamp");
        Ok(chosen)
    }

    /// File whose first record is the newest in the ring
    ///
    /// Also raises the engine's current timestamp to that record's.
    pub fn locate_newest_index(&mut self) -> Result<Option<u32>> {
        let newest = self.first_timestamps()?.into_iter().max_by_key(|(_, ts)| *ts);

        Ok(newest.map(|(index, ts)| {
            self.last_timestamp = self.last_timestamp.max(ts);
            index
        }))
    }

    /// File whose first record is the oldest in the ring
    pub fn locate_oldest_index(&self) -> Result<Option<u32>> {
        let oldest = self.first_timestamps()?.into_iter().min_by_key(|(_, ts)| *ts);
        Ok(oldest.map(|(index, _)| index))
    }

    /// First record with timestamp `>= target_ts`, starting at `hint`
    ///
    /// Older records are read and discarded. Follows the ring into newer
    /// files, so a hint from [`locate_index_by_timestamp`](Self::locate_index_by_timestamp)
    /// finds the target even when it begins the next file.
    pub fn read_next_at_or_after_timestamp(&mut self, hint: Cursor, target_ts: u64) -> Result<ReadOutcome> {
        let mut cursor = hint;
        loop {
            match self.read_across(cursor)? {
                ReadOutcome::Record(record, next) => {
                    if record.timestamp() >= target_ts {
                        return Ok(ReadOutcome::Record(record, next));
                    }
                    cursor = next;
                }
                other => return Ok(other),
            }
        }
    }

    /// Cursor for the first record at or after `target_ts` without consuming it
    pub fn seek_timestamp(&mut self, target_ts: u64) -> Result<Option<Cursor>> {
        let index = match self.locate_index_by_timestamp(target_ts)? {
            Some(index) => index,
            None => return Ok(None),
        };

        let mut cursor = Cursor::start_of(index);
        loop {
            match self.read_across(cursor)? {
                ReadOutcome::Record(record, next) => {
                    if record.timestamp() >= target_ts {
                        // Rewind to the record's own start
                        let len = record.header.record_len();
                        return Ok(Some(Cursor {
                            index: next.index,
                            offset: next.offset - len,
                            timestamp: cursor.timestamp,
                        }));
                    }
                    cursor = next;
                }
                _ => return Ok(None),
            }
        }
    }
}
