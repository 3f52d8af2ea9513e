//! Replay
//!
//! Walks a ring from a consumer checkpoint to its end, handing every record
//! to the caller. Used at startup to rebuild state from the durability log.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::LogConfig;
use crate::error::Result;
use crate::log::{Cursor, LogEngine, ReadOutcome};
use crate::payload::Operation;
use crate::record::Record;

/// Summary of one replay pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records handed to the callback
    pub records: u64,
    /// Payload bytes handed to the callback
    pub bytes: u64,
    pub last_timestamp: u64,
    /// The pass stopped because the next file still holds an older lap
    pub switch_pending: bool,
}

/// Consumer that replays a ring and remembers how far it got
pub struct Replayer {
    engine: LogEngine,
    store: CheckpointStore,
    checkpoint: Option<Checkpoint>,
    confirm_every: u64,
}

impl Replayer {
    /// Replayer for `config`'s ring with its cursor checkpoint `{prefix}.cp`
    pub fn open(config: &LogConfig) -> Result<Self> {
        let engine = LogEngine::open_reader(config)?;
        let store = CheckpointStore::cursor(&config.directory, &config.prefix);
        Self::new(engine, store)
    }

    pub fn new(engine: LogEngine, store: CheckpointStore) -> Result<Self> {
        let checkpoint = store.load()?;
        Ok(Self {
            engine,
            store,
            checkpoint,
            confirm_every: 256,
        })
    }

    /// Confirm and persist the position every `count` records (minimum 1)
    pub fn confirm_every(mut self, count: u64) -> Self {
        self.confirm_every = count.max(1);
        self
    }

    /// Where the next pass starts
    ///
    /// The saved position if there is one, else the oldest file of the ring.
    /// `None` for an empty ring without a checkpoint.
    pub fn start_cursor(&self) -> Result<Option<Cursor>> {
        let cursor = match &self.checkpoint {
            Some(checkpoint) if checkpoint.current_index < self.engine.ring().max_index() => {
                checkpoint.cursor()
            }
            _ => match self.engine.locate_oldest_index()? {
                Some(index) => Cursor::start_of(index),
                None => return Ok(None),
            },
        };

        // Lower bound for the ring-switch check when the file has no timestamp
        let floor = self.engine.peek_first_timestamp(cursor.index)?.unwrap_or(0);
        Ok(Some(cursor.with_timestamp(cursor.timestamp.max(floor))))
    }

    /// Hand every record after the saved position to `apply`
    ///
    /// The position after each applied record is staged; it is confirmed and
    /// saved every `confirm_every` records, at the end of the ring, and
    /// before an error from `apply` is returned.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<ReplayStats>
    where
        F: FnMut(&Record) -> Result<()>,
    {
        let mut stats = ReplayStats::default();
        let mut cursor = match self.start_cursor()? {
            Some(cursor) => cursor,
            None => return Ok(stats),
        };
        let mut checkpoint = self.checkpoint.unwrap_or_else(|| Checkpoint::at(cursor));

        tracing::info!(index = cursor.index, offset = cursor.offset, "replay starting");

        loop {
            match self.engine.read_across(cursor)? {
                ReadOutcome::Record(record, next) => {
                    if let Err(e) = apply(&record) {
                        self.persist(&mut checkpoint)?;
                        return Err(e);
                    }

                    stats.records += 1;
                    stats.bytes += record.payload.len() as u64;
                    stats.last_timestamp = record.timestamp();

                    cursor = next;
                    checkpoint.stage(cursor);
                    if stats.records % self.confirm_every == 0 {
                        self.persist(&mut checkpoint)?;
                    }
                }
                ReadOutcome::EndOfFile => break,
                ReadOutcome::SwitchPending => {
                    stats.switch_pending = true;
                    break;
                }
            }
        }

        self.persist(&mut checkpoint)?;
        tracing::info!(
            records = stats.records,
            bytes = stats.bytes,
            index = cursor.index,
            offset = cursor.offset,
            "replay finished"
        );
        Ok(stats)
    }

    /// Replay and decode each payload as an [`Operation`]
    pub fn replay_operations<F>(&mut self, mut apply: F) -> Result<ReplayStats>
    where
        F: FnMut(Operation, &Record) -> Result<()>,
    {
        self.replay(|record| {
            let operation = Operation::decode(&record.payload)?;
            apply(operation, record)
        })
    }

    fn persist(&mut self, checkpoint: &mut Checkpoint) -> Result<()> {
        checkpoint.confirm();
        self.store.save(checkpoint)?;
        self.checkpoint = Some(*checkpoint);
        Ok(())
    }

    /// Last confirmed position, if any
    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoint.as_ref()
    }
}
