//! # ringlog
//!
//! Append-only rotating binary log engine for a key-value database server:
//! - Durability log for mutating operations
//! - Relay log for master → slave replication, same on-disk format
//! - Byte-at-a-time resync past corrupt or torn records
//! - Timestamp seek across a bounded ring of files
//! - Checkpoints that survive process restart
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────┐        ┌──────────────────────────┐
//! │       DurableLog         │        │        RelayLog          │
//! │  (writer + checkpoint)   │        │   (per-peer directory)   │
//! └────────────┬─────────────┘        └────────────┬─────────────┘
//!              │                                   │
//!              └─────────────────┬─────────────────┘
//!                                ▼
//!                  ┌───────────────────────────┐
//!                  │         LogEngine         │
//!                  │ append / read / seek / ts │
//!                  └─────────────┬─────────────┘
//!                    ┌───────────┴───────────┐
//!                    ▼                       ▼
//!             ┌─────────────┐        ┌──────────────┐
//!             │   Record    │        │ RotatingFile │
//!             │   (codec)   │        │    (ring)    │
//!             └─────────────┘        └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod ring;
pub mod log;
pub mod checkpoint;
pub mod relay;
pub mod durability;
pub mod replay;
pub mod payload;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LogError, Result};
pub use config::{LogConfig, SyncStrategy};
pub use log::{Advance, Cursor, LogEngine, ReadOutcome};
pub use record::{Record, RecordHeader};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use relay::{RelayInfo, RelayLog};
pub use durability::{AsyncAppender, DurableLog};
pub use replay::Replayer;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ringlog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
