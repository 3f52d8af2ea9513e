//! Durability Module
//!
//! The write-ahead side of the server: a writer [`LogEngine`] paired with the
//! primary checkpoint.
//!
//! ## Startup
//! 1. Create the log directory
//! 2. Load the primary checkpoint
//! 3. Checkpoint found: reopen the writer at its file index, unless the
//!    next ring file already holds newer records
//! 4. Missing, unreadable or behind the ring: scan for the newest file
//!
//! ## Append
//! Engine append, then a synchronous checkpoint save when
//! `persist_checkpoint` is set. Batching belongs to the caller; see
//! [`AsyncAppender`].

mod async_writer;

pub use async_writer::{AppendStats, AsyncAppender, PendingAppend};

use std::fs;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::LogConfig;
use crate::error::Result;
use crate::log::{Cursor, LogEngine};
use crate::payload::Operation;

/// Durability log handle, owned by whichever component performs writes
pub struct DurableLog {
    config: LogConfig,
    engine: LogEngine,
    store: CheckpointStore,
    checkpoint: Checkpoint,
}

impl DurableLog {
    /// Open or create the durability log described by `config`
    pub fn open(config: LogConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.directory)?;

        let store = CheckpointStore::primary(&config.directory, &config.prefix);

        let stored = match store.load()? {
            Some(checkpoint) if checkpoint.current_index < config.max_index => Some(checkpoint),
            _ => None,
        };

        let (engine, checkpoint) = match stored {
            Some(checkpoint) if !Self::ring_moved_past(&config, &checkpoint)? => {
                let mut engine = LogEngine::open_writer_at(&config, checkpoint.current_index)?;
                engine.observe_timestamp(checkpoint.current_timestamp);
                engine.set_remote_timestamp(checkpoint.remote_timestamp);

                tracing::info!(
                    index = checkpoint.current_index,
                    offset = checkpoint.current_offset,
                    "resuming durability log from checkpoint"
                );
                (engine, checkpoint)
            }
            Some(stale) => {
                let mut engine = LogEngine::open_writer(&config)?;
                engine.observe_timestamp(stale.current_timestamp);
                engine.set_remote_timestamp(stale.remote_timestamp);

                let mut checkpoint = Checkpoint::at(engine.position());
                checkpoint.remote_timestamp = stale.remote_timestamp;
                tracing::warn!(
                    checkpoint_index = stale.current_index,
                    index = engine.current_index(),
                    "checkpoint is behind the ring, positioned by ring scan"
                );
                (engine, checkpoint)
            }
            None => {
                let engine = LogEngine::open_writer(&config)?;
                let checkpoint = Checkpoint::at(engine.position());
                tracing::info!(
                    index = engine.current_index(),
                    "no usable checkpoint, positioned by ring scan"
                );
                (engine, checkpoint)
            }
        };

        Ok(Self {
            config,
            engine,
            store,
            checkpoint,
        })
    }

    /// True when the file after the checkpoint's already starts at or after
    /// the checkpoint's timestamp: the writer rotated past the checkpoint
    /// before its last save
    fn ring_moved_past(config: &LogConfig, checkpoint: &Checkpoint) -> Result<bool> {
        let reader = LogEngine::open_reader(config)?;
        let next = reader.ring().next_index(checkpoint.current_index);
        if next == checkpoint.current_index {
            return Ok(false);
        }

        Ok(matches!(
            reader.peek_first_timestamp(next)?,
            Some(first) if first >= checkpoint.current_timestamp
        ))
    }

    /// Append an opaque payload and update the checkpoint
    pub fn append(&mut self, payload: &[u8], session_id: Option<u64>) -> Result<u64> {
        let timestamp = self.engine.append(payload, session_id)?;

        self.checkpoint.stage(self.engine.position());
        self.checkpoint.confirm();
        self.checkpoint.remote_timestamp = self.engine.remote_timestamp();

        if self.config.persist_checkpoint {
            self.store.save(&self.checkpoint)?;
        }
        Ok(timestamp)
    }

    /// Encode and append one key-value operation
    pub fn append_operation(&mut self, operation: &Operation) -> Result<u64> {
        let payload = operation.encode()?;
        self.append(&payload, None)
    }

    /// Flush appended records and the checkpoint to stable storage
    pub fn sync(&mut self) -> Result<()> {
        self.engine.sync()?;
        self.store.sync()
    }

    /// Open an independent reader over the same ring
    pub fn reader(&self) -> Result<LogEngine> {
        LogEngine::open_reader(&self.config)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Position just after the last append
    pub fn position(&self) -> Cursor {
        self.engine.position()
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn set_remote_timestamp(&mut self, timestamp: u64) {
        self.engine.set_remote_timestamp(timestamp);
    }

    pub fn engine(&self) -> &LogEngine {
        &self.engine
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }
}
