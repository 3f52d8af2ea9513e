//! Relay Log
//!
//! Per-peer replication log: the same engine and on-disk format as the
//! durability log, scoped to one directory per peer address.
//!
//! ## Layout
//! ```text
//! {base}/{ip}_{port}/
//!   ├── relay.000 ..      data files
//!   ├── relay.index       writer: current file index
//!   └── relay.cp          reader: consumed position
//! ```
//!
//! A relay is opened either for writing (the master's outbound cursor) or
//! for reading (what a consumer has replayed); the mode never changes.

use std::fs;
use std::path::{Path, PathBuf};

use crate::checkpoint::{Checkpoint, CheckpointStore, IndexPointer};
use crate::config::LogConfig;
use crate::error::{LogError, Result};
use crate::log::{Cursor, LogEngine, ReadOutcome};

/// File prefix used inside every relay directory
pub const RELAY_PREFIX: &str = "relay";

/// Identity of a replication peer and where its relay log lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayInfo {
    pub ip: String,
    pub port: u16,
    pub directory: PathBuf,
}

impl RelayInfo {
    /// Relay for `ip:port` under `base`, in `{base}/{ip}_{port}`
    pub fn new(base: &Path, ip: impl Into<String>, port: u16) -> Self {
        let ip = ip.into();
        let directory = base.join(format!("{}_{}", ip, port));
        Self { ip, port, directory }
    }

    /// `ip:port`
    pub fn peer(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// Direction a relay log was opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    Write,
    Read,
}

/// Append or read cursor over one peer's relay log
pub struct RelayLog {
    info: RelayInfo,
    mode: RelayMode,
    engine: LogEngine,

    /// Reader: consumed position
    cursor: Cursor,
    checkpoint: Checkpoint,
    store: CheckpointStore,

    /// Writer: current file index
    pointer: IndexPointer,
}

impl RelayLog {
    /// Open the master's outbound relay for `info`
    ///
    /// `template` supplies ring size and sync settings; directory and prefix
    /// come from the peer.
    pub fn open_writer(info: RelayInfo, template: &LogConfig) -> Result<Self> {
        let config = Self::config_for(&info, template);
        fs::create_dir_all(&info.directory)?;

        let pointer = IndexPointer::new(&info.directory, RELAY_PREFIX);
        let engine = match pointer.load()? {
            Some(index) if index < config.max_index => LogEngine::open_writer_at(&config, index)?,
            _ => LogEngine::open_writer(&config)?,
        };
        pointer.save(engine.current_index())?;

        tracing::info!(peer = %info.peer(), index = engine.current_index(), "opened relay writer");

        Ok(Self {
            store: CheckpointStore::cursor(&info.directory, RELAY_PREFIX),
            cursor: engine.position(),
            checkpoint: Checkpoint::default(),
            info,
            mode: RelayMode::Write,
            engine,
            pointer,
        })
    }

    /// Open the consumer side of the relay for `info`
    ///
    /// Resumes at the saved position, or at the oldest file of the ring.
    pub fn open_reader(info: RelayInfo, template: &LogConfig) -> Result<Self> {
        let config = Self::config_for(&info, template);
        let mut engine = LogEngine::open_reader(&config)?;
        let store = CheckpointStore::cursor(&info.directory, RELAY_PREFIX);

        let checkpoint = match store.load()? {
            Some(checkpoint) if checkpoint.current_index < config.max_index => checkpoint,
            _ => {
                let index = engine.locate_oldest_index()?.unwrap_or(0);
                Checkpoint::at(Cursor::start_of(index))
            }
        };

        // The cursor file carries no timestamp; the first record of the
        // file is a safe lower bound for the ring-switch check
        let floor = engine.peek_first_timestamp(checkpoint.current_index)?.unwrap_or(0);
        let cursor = checkpoint.cursor().with_timestamp(floor);
        engine.observe_timestamp(floor);

        tracing::info!(
            peer = %info.peer(),
            index = cursor.index,
            offset = cursor.offset,
            "opened relay reader"
        );

        Ok(Self {
            pointer: IndexPointer::new(&info.directory, RELAY_PREFIX),
            info,
            mode: RelayMode::Read,
            engine,
            cursor,
            checkpoint,
            store,
        })
    }

    fn config_for(info: &RelayInfo, template: &LogConfig) -> LogConfig {
        LogConfig {
            directory: info.directory.clone(),
            prefix: RELAY_PREFIX.to_string(),
            ..template.clone()
        }
    }

    // =========================================================================
    // Replication Operations
    // =========================================================================

    /// Append a record received from the peer
    ///
    /// `remote_timestamp` is the peer's clock when it produced the record.
    /// Returns the local timestamp stamped into the record.
    pub fn write(&mut self, payload: &[u8], session_id: u64, remote_timestamp: u64) -> Result<u64> {
        if self.mode != RelayMode::Write {
            return Err(LogError::WrongMode("write-mode relay"));
        }

        self.engine.set_remote_timestamp(remote_timestamp);
        let timestamp = self.engine.append(payload, Some(session_id))?;
        self.cursor = self.engine.position();
        self.pointer.save(self.cursor.index)?;

        Ok(timestamp)
    }

    /// Read the next unconsumed record
    ///
    /// The consumed position is saved after every record. `EndOfFile` and
    /// `SwitchPending` leave the position where it was.
    pub fn read(&mut self) -> Result<ReadOutcome> {
        if self.mode != RelayMode::Read {
            return Err(LogError::WrongMode("read-mode relay"));
        }

        let outcome = self.engine.read_across(self.cursor)?;
        match &outcome {
            ReadOutcome::Record(_, next) => {
                self.cursor = *next;
                self.checkpoint.stage(*next);
                self.checkpoint.confirm();
                self.store.save(&self.checkpoint)?;
            }
            ReadOutcome::SwitchPending => {
                tracing::debug!(peer = %self.info.peer(), index = self.cursor.index, "relay switch pending");
            }
            ReadOutcome::EndOfFile => {}
        }
        Ok(outcome)
    }

    /// Move a reader to the first record at or after `timestamp`
    ///
    /// Returns false when no such record exists yet.
    pub fn seek_timestamp(&mut self, timestamp: u64) -> Result<bool> {
        if self.mode != RelayMode::Read {
            return Err(LogError::WrongMode("read-mode relay"));
        }

        match self.engine.seek_timestamp(timestamp)? {
            Some(cursor) => {
                self.cursor = cursor;
                self.checkpoint = Checkpoint::at(cursor);
                self.store.save(&self.checkpoint)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn info(&self) -> &RelayInfo {
        &self.info
    }

    pub fn mode(&self) -> RelayMode {
        self.mode
    }

    /// Writer: after the last append. Reader: after the last consumed record.
    pub fn position(&self) -> Cursor {
        self.cursor
    }

    /// Last clock value the peer reported through [`write`](Self::write)
    pub fn remote_timestamp(&self) -> u64 {
        self.engine.remote_timestamp()
    }

    pub fn sync(&mut self) -> Result<()> {
        self.engine.sync()
    }
}
