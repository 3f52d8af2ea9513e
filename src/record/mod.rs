//! Record Module
//!
//! Binary framing for a single log record. No I/O happens here.
//!
//! ## Record Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (16 bytes, native byte order)                         │
//! │ ┌───────────┬──────────────┬────────────┬──────────────────┐ │
//! │ │ Magic (2) │ Checksum (2) │ Length (4) │  Timestamp (8)   │ │
//! │ └───────────┴──────────────┴────────────┴──────────────────┘ │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Session Id (8), wire version 2 only                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Payload (Length bytes)                                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The checksum is CRC-16/XMODEM over the payload only. Header and session
//! id are not covered; existing logs depend on this exact layout.

mod codec;
mod crc16;

use bytes::Bytes;

pub use codec::{decode, decode_header, encode, encode_header, verify, DecodeError};
pub use crc16::crc16;

// =============================================================================
// Format Constants
// =============================================================================

/// Magic for wire version 1 (no session id)
pub const MAGIC_V1: u16 = 0xA5E1;

/// Magic for wire version 2 (session id follows the header)
pub const MAGIC_V2: u16 = 0xA5E2;

/// Header size: Magic (2) + Checksum (2) + Length (4) + Timestamp (8)
pub const HEADER_SIZE: usize = 16;

/// Size of the version 2 session id
pub const SESSION_ID_SIZE: usize = 8;

/// Largest payload a record may carry (128 MiB)
pub const MAX_RECORD_SIZE: usize = 128 * 1024 * 1024;

// =============================================================================
// Wire Version
// =============================================================================

/// Wire version, selected by the presence of a session id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireVersion {
    V1,
    V2,
}

impl WireVersion {
    pub fn magic(self) -> u16 {
        match self {
            WireVersion::V1 => MAGIC_V1,
            WireVersion::V2 => MAGIC_V2,
        }
    }

    pub fn from_magic(magic: u16) -> Option<Self> {
        match magic {
            MAGIC_V1 => Some(WireVersion::V1),
            MAGIC_V2 => Some(WireVersion::V2),
            _ => None,
        }
    }

    /// Bytes between the header and the payload
    pub fn extra_len(self) -> usize {
        match self {
            WireVersion::V1 => 0,
            WireVersion::V2 => SESSION_ID_SIZE,
        }
    }
}

// =============================================================================
// Header
// =============================================================================

/// Fixed-size header preceding every record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub magic: u16,
    /// CRC-16 of the payload
    pub checksum: u16,
    /// Payload length in bytes
    pub length: u32,
    /// Microseconds since the Unix epoch, assigned by the producer
    pub timestamp: u64,
}

impl RecordHeader {
    /// Wire version of a validated header.
    ///
    /// Headers produced by [`decode_header`] always carry a known magic; a
    /// hand-built header with an unknown magic reports version 1.
    pub fn version(&self) -> WireVersion {
        WireVersion::from_magic(self.magic).unwrap_or(WireVersion::V1)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..2].copy_from_slice(&self.magic.to_ne_bytes());
        buf[2..4].copy_from_slice(&self.checksum.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.length.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.timestamp.to_ne_bytes());
        buf
    }

    /// Parse the raw fields without validating them
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            magic: u16::from_ne_bytes([buf[0], buf[1]]),
            checksum: u16::from_ne_bytes([buf[2], buf[3]]),
            length: u32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]),
            timestamp: u64::from_ne_bytes([
                buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
            ]),
        }
    }

    /// Total on-disk size of the record this header describes
    pub fn record_len(&self) -> u64 {
        (HEADER_SIZE + self.version().extra_len()) as u64 + self.length as u64
    }
}

// =============================================================================
// Decoded Record
// =============================================================================

/// A record read back from the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub header: RecordHeader,
    /// Present for wire version 2 records
    pub session_id: Option<u64>,
    pub payload: Bytes,
}

impl Record {
    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    pub fn version(&self) -> WireVersion {
        self.header.version()
    }
}
