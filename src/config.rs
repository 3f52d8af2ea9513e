//! Configuration for ringlog
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{LogError, Result};

/// Configuration for one log ring
#[derive(Debug, Clone)]
pub struct LogConfig {
    // -------------------------------------------------------------------------
    // Ring Layout
    // -------------------------------------------------------------------------
    /// Directory holding the ring files and their checkpoint files
    /// Internal structure:
    ///   {directory}/
    ///     ├── {prefix}.000 .. {prefix}.{max_index-1}   (data files)
    ///     ├── {prefix}.checkpoint                      (primary checkpoint)
    ///     ├── {prefix}.index                           (current index pointer)
    ///     └── {prefix}.cp                              (cursor checkpoint)
    pub directory: PathBuf,

    /// File name prefix shared by every file of the ring
    pub prefix: String,

    /// Number of files in the ring
    pub max_index: u32,

    /// Size at which the active file is rotated (in bytes)
    pub max_size_bytes: u64,

    // -------------------------------------------------------------------------
    // Durability
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync after appends
    pub sync_strategy: SyncStrategy,

    /// Save the primary checkpoint after every successful append
    pub persist_checkpoint: bool,
}

/// Sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced entries (balanced durability/performance)
    EveryNEntries { count: usize },

    /// Leave flushing to the OS
    Never,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./ringlog_data"),
            prefix: "binlog".to_string(),
            max_index: 16,
            max_size_bytes: 64 * 1024 * 1024, // 64 MB
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            persist_checkpoint: true,
        }
    }
}

impl LogConfig {
    /// Create a new config builder
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    /// Check the invariants every ring relies on
    pub fn validate(&self) -> Result<()> {
        if self.max_index == 0 {
            return Err(LogError::Config("ring capacity must be at least 1".to_string()));
        }
        if self.max_index > 1000 {
            // File names carry a three-digit index
            return Err(LogError::Config(format!(
                "ring capacity {} exceeds 1000 files",
                self.max_index
            )));
        }
        if self.max_size_bytes == 0 {
            return Err(LogError::Config("max file size must be non-zero".to_string()));
        }
        if self.prefix.is_empty() {
            return Err(LogError::Config("file prefix must not be empty".to_string()));
        }
        if self.directory.as_os_str().is_empty() {
            return Err(LogError::Config("directory must not be empty".to_string()));
        }
        if let SyncStrategy::EveryNEntries { count: 0 } = self.sync_strategy {
            return Err(LogError::Config("sync interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for LogConfig
#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    /// Set the ring directory
    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.directory = path.into();
        self
    }

    /// Set the file name prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    /// Set the number of files in the ring
    pub fn max_index(mut self, count: u32) -> Self {
        self.config.max_index = count;
        self
    }

    /// Set the rotation size (in bytes)
    pub fn max_size_bytes(mut self, size: u64) -> Self {
        self.config.max_size_bytes = size;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Enable or disable checkpoint persistence after appends
    pub fn persist_checkpoint(mut self, enabled: bool) -> Self {
        self.config.persist_checkpoint = enabled;
        self
    }

    pub fn build(self) -> Result<LogConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
