//! Record codec
//!
//! Encoding and decoding functions for a single log record.

use bytes::Bytes;
use thiserror::Error;

use crate::error::{LogError, Result};

use super::{crc16, Record, RecordHeader, WireVersion, HEADER_SIZE, MAX_RECORD_SIZE, SESSION_ID_SIZE};

/// Why a byte buffer does not hold a valid record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated record: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unknown magic 0x{0:04x}")]
    BadMagic(u16),

    #[error("record length {0} exceeds the maximum record size")]
    TooLong(u32),

    #[error("checksum mismatch: header 0x{expected:04x}, payload 0x{actual:04x}")]
    Checksum { expected: u16, actual: u16 },
}

// =============================================================================
// Encoding
// =============================================================================

/// Build the header for `payload`
///
/// The version is chosen by the presence of `session_id`.
pub fn encode_header(payload: &[u8], timestamp: u64, session_id: Option<u64>) -> Result<RecordHeader> {
    if payload.len() > MAX_RECORD_SIZE {
        return Err(LogError::RecordTooLarge {
            len: payload.len(),
            max: MAX_RECORD_SIZE,
        });
    }

    let version = if session_id.is_some() {
        WireVersion::V2
    } else {
        WireVersion::V1
    };

    Ok(RecordHeader {
        magic: version.magic(),
        checksum: crc16(payload),
        length: payload.len() as u32,
        timestamp,
    })
}

/// Encode a complete record to bytes
///
/// Format: header (16) + session id (8, v2 only) + payload
pub fn encode(payload: &[u8], timestamp: u64, session_id: Option<u64>) -> Result<Vec<u8>> {
    let header = encode_header(payload, timestamp, session_id)?;

    let mut buf = Vec::with_capacity(header.record_len() as usize);
    buf.extend_from_slice(&header.to_bytes());
    if let Some(id) = session_id {
        buf.extend_from_slice(&id.to_ne_bytes());
    }
    buf.extend_from_slice(payload);

    Ok(buf)
}

// =============================================================================
// Decoding
// =============================================================================

/// Parse and validate a header
///
/// Rejects unknown magic values and lengths above [`MAX_RECORD_SIZE`]. The
/// length is checked here so callers never allocate for a bogus header.
pub fn decode_header(bytes: &[u8]) -> std::result::Result<RecordHeader, DecodeError> {
    let raw: &[u8; HEADER_SIZE] = bytes
        .get(..HEADER_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or(DecodeError::Truncated {
            needed: HEADER_SIZE,
            available: bytes.len(),
        })?;

    let header = RecordHeader::from_bytes(raw);

    if WireVersion::from_magic(header.magic).is_none() {
        return Err(DecodeError::BadMagic(header.magic));
    }
    if header.length as usize > MAX_RECORD_SIZE {
        return Err(DecodeError::TooLong(header.length));
    }

    Ok(header)
}

/// Recompute the payload checksum and compare it with the header
pub fn verify(payload: &[u8], header: &RecordHeader) -> bool {
    payload.len() == header.length as usize && crc16(payload) == header.checksum
}

/// Decode one record from the front of `bytes`
///
/// Returns the record and the number of bytes consumed.
pub fn decode(bytes: &[u8]) -> std::result::Result<(Record, usize), DecodeError> {
    let header = decode_header(bytes)?;
    let total = header.record_len() as usize;

    if bytes.len() < total {
        return Err(DecodeError::Truncated {
            needed: total,
            available: bytes.len(),
        });
    }

    let mut pos = HEADER_SIZE;
    let session_id = match header.version() {
        WireVersion::V1 => None,
        WireVersion::V2 => {
            let mut raw = [0u8; SESSION_ID_SIZE];
            raw.copy_from_slice(&bytes[pos..pos + SESSION_ID_SIZE]);
            pos += SESSION_ID_SIZE;
            Some(u64::from_ne_bytes(raw))
        }
    };

    let payload = &bytes[pos..total];
    if !verify(payload, &header) {
        return Err(DecodeError::Checksum {
            expected: header.checksum,
            actual: crc16(payload),
        });
    }

    Ok((
        Record {
            header,
            session_id,
            payload: Bytes::copy_from_slice(payload),
        },
        total,
    ))
}
