//! Error types for ringlog
//!
//! Provides a unified error type for all operations. Conditions that are
//! expected during normal reading (end of file, a pending ring switch) are
//! not errors; they are reported through [`crate::log::ReadOutcome`].

use thiserror::Error;

/// Result type alias using LogError
pub type Result<T> = std::result::Result<T, LogError>;

/// Unified error type for ringlog operations
#[derive(Debug, Error)]
pub enum LogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    /// Underlying syscall failure. The OS error is preserved for logging.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short write: expected {expected} bytes, wrote {written}")]
    ShortWrite { expected: usize, written: usize },

    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("record payload of {len} bytes exceeds the {max} byte limit")]
    RecordTooLarge { len: usize, max: usize },

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("cursor points at file {cursor} but the writer is on file {current}")]
    CursorMismatch { cursor: u32, current: u32 },

    #[error("log file is not open")]
    NotOpen,

    #[error("operation needs a {0} log")]
    WrongMode(&'static str),

    #[error("appender is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Checkpoint Errors
    // -------------------------------------------------------------------------
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LogError {
    /// True for failures that came from the operating system rather than
    /// from engine bookkeeping.
    pub fn is_system(&self) -> bool {
        matches!(
            self,
            LogError::Io(_) | LogError::ShortWrite { .. } | LogError::ShortRead { .. }
        )
    }
}
