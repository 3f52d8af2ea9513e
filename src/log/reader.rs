//! Record scanning with byte-at-a-time resync
//!
//! Works on a borrowed file handle so the same loop serves the engine's own
//! handle and the short-lived handles used by timestamp scans.

use std::fs::File;

use bytes::Bytes;

use crate::error::{LogError, Result};
use crate::record::{decode, decode_header, verify, Record, WireVersion, HEADER_SIZE, SESSION_ID_SIZE};
use crate::ring::read_full_at;

/// Read the first valid record at or after `start`
///
/// Returns the record and the offset just past it, or `None` when the file
/// is exhausted. Invalid headers and checksum mismatches move the candidate
/// offset forward by one byte. A short payload read after a valid header is
/// a truncated tail (zero bytes ends the file, anything else is an error)
/// unless a complete valid record starts somewhere in the bytes that were
/// read. Then the header's length field is corrupt and the scan resyncs.
pub(crate) fn read_record_at(file: &File, index: u32, start: u64) -> Result<Option<(Record, u64)>> {
    let mut offset = start;
    let mut skipped_from: Option<u64> = None;

    loop {
        let mut raw = [0u8; HEADER_SIZE];
        let n = read_full_at(file, offset, &mut raw)?;
        if n == 0 {
            report_skipped(index, skipped_from, offset);
            return Ok(None);
        }

        let header = match decode_header(&raw[..n]) {
            Ok(header) => header,
            Err(_) => {
                skipped_from.get_or_insert(offset);
                offset += 1;
                continue;
            }
        };

        let extra = header.version().extra_len();
        let body_len = extra + header.length as usize;
        let mut body = vec![0u8; body_len];
        let got = read_full_at(file, offset + HEADER_SIZE as u64, &mut body)?;
        if got != body_len && got > 0 && holds_later_record(&raw, &body[..got]) {
            skipped_from.get_or_insert(offset);
            offset += 1;
            continue;
        }
        if got != body_len {
            report_skipped(index, skipped_from, offset);
            if got == 0 {
                return Ok(None);
            }
            return Err(LogError::ShortRead {
                expected: body_len,
                got,
            });
        }

        let body = Bytes::from(body);
        let payload = body.slice(extra..);
        if !verify(&payload, &header) {
            skipped_from.get_or_insert(offset);
            offset += 1;
            continue;
        }

        report_skipped(index, skipped_from, offset);

        let session_id = match header.version() {
            WireVersion::V1 => None,
            WireVersion::V2 => {
                let mut raw_id = [0u8; SESSION_ID_SIZE];
                raw_id.copy_from_slice(&body[..SESSION_ID_SIZE]);
                Some(u64::from_ne_bytes(raw_id))
            }
        };

        let next = offset + header.record_len();
        tracing::trace!(index, offset, len = header.length, ts = header.timestamp, "read record");

        return Ok(Some((
            Record {
                header,
                session_id,
                payload,
            },
            next,
        )));
    }
}

/// True when a complete, checksummed record starts after the first byte of
/// `header` followed by `rest`
fn holds_later_record(header: &[u8], rest: &[u8]) -> bool {
    let mut tail = Vec::with_capacity(header.len() + rest.len());
    tail.extend_from_slice(header);
    tail.extend_from_slice(rest);

    (1..tail.len()).any(|start| decode(&tail[start..]).is_ok())
}

fn report_skipped(index: u32, skipped_from: Option<u64>, resumed_at: u64) {
    if let Some(from) = skipped_from {
        tracing::error!(
            index,
            offset = from,
            skipped = resumed_at - from,
            "skipped corrupt bytes in log file"
        );
    }
}
