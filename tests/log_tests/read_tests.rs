//! Tests for appending and sequential reads
//!
//! These tests verify:
//! - Records read back in append order with correct cursors
//! - Resync past corrupt headers and payloads
//! - Truncated tails (EndOfFile vs short read)
//! - Timestamps are strictly increasing per writer

use std::fs::{self, OpenOptions};

use ringlog::record::{encode, HEADER_SIZE, MAX_RECORD_SIZE};
use ringlog::{Cursor, LogEngine, LogError, ReadOutcome};
use tempfile::TempDir;

use crate::test_config;

// =============================================================================
// Helper Functions
// =============================================================================

fn read_all(engine: &mut LogEngine, start: Cursor) -> Vec<Vec<u8>> {
    let mut cursor = start;
    let mut payloads = Vec::new();
    while let ReadOutcome::Record(record, next) = engine.read_next(cursor).unwrap() {
        payloads.push(record.payload.to_vec());
        cursor = next;
    }
    payloads
}

fn flip_byte(path: &std::path::Path, offset: usize) {
    let mut bytes = fs::read(path).unwrap();
    bytes[offset] ^= 0xFF;
    fs::write(path, bytes).unwrap();
}

// =============================================================================
// Basic Read Tests
// =============================================================================

#[test]
fn test_append_then_read_in_order() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    let ts_a = writer.append(b"a", None).unwrap();
    let ts_b = writer.append(b"b", None).unwrap();
    let ts_c = writer.append(b"c", None).unwrap();

    let mut reader = LogEngine::open_reader(&config).unwrap();
    let cursor = Cursor::start_of(0);

    let (record, cursor) = reader.read_next(cursor).unwrap().into_record().unwrap();
    assert_eq!(&record.payload[..], b"a");
    assert_eq!(record.timestamp(), ts_a);
    assert_eq!(cursor.offset, (HEADER_SIZE + 1) as u64);
    assert_eq!(cursor.timestamp, ts_a);

    let (record, cursor) = reader.read_next(cursor).unwrap().into_record().unwrap();
    assert_eq!(&record.payload[..], b"b");
    assert_eq!(record.timestamp(), ts_b);

    let (record, cursor) = reader.read_next(cursor).unwrap().into_record().unwrap();
    assert_eq!(&record.payload[..], b"c");
    assert_eq!(record.timestamp(), ts_c);
    assert_eq!(cursor.offset, 3 * (HEADER_SIZE + 1) as u64);

    assert_eq!(reader.read_next(cursor).unwrap(), ReadOutcome::EndOfFile);
    assert_eq!(reader.position(), cursor);
}

#[test]
fn test_session_id_round_trips_through_file() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    writer.append(b"v1", None).unwrap();
    writer.append(b"v2", Some(99)).unwrap();

    let mut reader = LogEngine::open_reader(&config).unwrap();
    let (first, cursor) = reader.read_next(Cursor::start_of(0)).unwrap().into_record().unwrap();
    let (second, _) = reader.read_next(cursor).unwrap().into_record().unwrap();

    assert_eq!(first.session_id, None);
    assert_eq!(second.session_id, Some(99));
    assert_eq!(&second.payload[..], b"v2");
}

#[test]
fn test_reader_on_missing_file_is_end_of_file() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024);

    let mut reader = LogEngine::open_reader(&config).unwrap();
    assert_eq!(reader.read_next(Cursor::start_of(2)).unwrap(), ReadOutcome::EndOfFile);
}

#[test]
fn test_writer_reads_its_own_file() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    writer.append(b"mine", None).unwrap();

    let (record, _) = writer.read_next(Cursor::start_of(0)).unwrap().into_record().unwrap();
    assert_eq!(&record.payload[..], b"mine");
}

#[test]
fn test_writer_rejects_cursor_for_other_file() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    writer.append(b"x", None).unwrap();

    assert!(matches!(
        writer.read_next(Cursor::start_of(1)),
        Err(LogError::CursorMismatch { cursor: 1, current: 0 })
    ));
}

// =============================================================================
// Resync Tests
// =============================================================================

#[test]
fn test_resync_past_corrupt_payload() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    writer.append_at(b"alpha", None, 1000).unwrap();
    writer.append_at(b"bravo", None, 2000).unwrap();
    writer.append_at(b"charlie", None, 3000).unwrap();

    // Second record starts after header + "alpha"
    let bravo = HEADER_SIZE + 5;
    flip_byte(&writer.ring().file_name_at(0), bravo + HEADER_SIZE + 2);

    let mut reader = LogEngine::open_reader(&config).unwrap();
    let payloads = read_all(&mut reader, Cursor::start_of(0));
    assert_eq!(payloads, vec![b"alpha".to_vec(), b"charlie".to_vec()]);
}

#[test]
fn test_resync_past_corrupt_length() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    writer.append_at(b"alpha", None, 1000).unwrap();
    writer.append_at(b"bravo", None, 2000).unwrap();
    writer.append_at(b"charlie", None, 3000).unwrap();
    let path = writer.ring().file_name_at(0);
    drop(writer);

    // Bravo's length now points past the end of the file
    let length_at = HEADER_SIZE + 5 + 4;
    let mut bytes = fs::read(&path).unwrap();
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[length_at..length_at + 4]);
    let corrupt = u32::from_ne_bytes(raw) + 256;
    bytes[length_at..length_at + 4].copy_from_slice(&corrupt.to_ne_bytes());
    fs::write(&path, bytes).unwrap();

    let mut reader = LogEngine::open_reader(&config).unwrap();
    let payloads = read_all(&mut reader, Cursor::start_of(0));
    assert_eq!(payloads, vec![b"alpha".to_vec(), b"charlie".to_vec()]);
}

#[test]
fn test_resync_past_corrupt_magic() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    writer.append_at(b"alpha", None, 1000).unwrap();
    writer.append_at(b"bravo", None, 2000).unwrap();
    writer.append_at(b"charlie", None, 3000).unwrap();

    flip_byte(&writer.ring().file_name_at(0), HEADER_SIZE + 5);

    let mut reader = LogEngine::open_reader(&config).unwrap();
    let payloads = read_all(&mut reader, Cursor::start_of(0));
    assert_eq!(payloads, vec![b"alpha".to_vec(), b"charlie".to_vec()]);
}

#[test]
fn test_resync_from_unaligned_offset() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    writer.append_at(b"alpha", None, 1000).unwrap();
    writer.append_at(b"bravo", None, 2000).unwrap();

    // Starting mid-record skips forward to the next valid header
    let mut reader = LogEngine::open_reader(&config).unwrap();
    let (record, _) = reader.read_next(Cursor::new(0, 3)).unwrap().into_record().unwrap();
    assert_eq!(&record.payload[..], b"bravo");
}

#[test]
fn test_trailing_garbage_is_end_of_file() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    writer.append_at(b"alpha", None, 1000).unwrap();
    let path = writer.ring().file_name_at(0);
    drop(writer);

    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(b"not a record");
    fs::write(&path, bytes).unwrap();

    let mut reader = LogEngine::open_reader(&config).unwrap();
    let payloads = read_all(&mut reader, Cursor::start_of(0));
    assert_eq!(payloads, vec![b"alpha".to_vec()]);
}

// =============================================================================
// Truncated Tail Tests
// =============================================================================

#[test]
fn test_header_without_payload_is_end_of_file() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    writer.append_at(b"alpha", None, 1000).unwrap();
    let path = writer.ring().file_name_at(0);
    drop(writer);

    let tail = encode(b"bravo", 2000, None).unwrap();
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    std::io::Write::write_all(&mut file, &tail[..HEADER_SIZE]).unwrap();

    let mut reader = LogEngine::open_reader(&config).unwrap();
    let (_, cursor) = reader.read_next(Cursor::start_of(0)).unwrap().into_record().unwrap();
    assert_eq!(reader.read_next(cursor).unwrap(), ReadOutcome::EndOfFile);
}

#[test]
fn test_partial_payload_is_short_read() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    writer.append_at(b"alpha", None, 1000).unwrap();
    let path = writer.ring().file_name_at(0);
    drop(writer);

    let tail = encode(b"bravo", 2000, None).unwrap();
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    std::io::Write::write_all(&mut file, &tail[..HEADER_SIZE + 2]).unwrap();

    let mut reader = LogEngine::open_reader(&config).unwrap();
    let (_, cursor) = reader.read_next(Cursor::start_of(0)).unwrap().into_record().unwrap();
    assert!(matches!(
        reader.read_next(cursor),
        Err(LogError::ShortRead { expected: 5, got: 2 })
    ));
}

// =============================================================================
// Append Tests
// =============================================================================

#[test]
fn test_rejected_append_leaves_file_unchanged() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    writer.append(b"ok", None).unwrap();
    let before = writer.ring().len().unwrap();
    let position = writer.position();

    let oversized = vec![0u8; MAX_RECORD_SIZE + 1];
    assert!(matches!(
        writer.append(&oversized, None),
        Err(LogError::RecordTooLarge { .. })
    ));

    assert_eq!(writer.ring().len().unwrap(), before);
    assert_eq!(writer.position(), position);
}

#[test]
fn test_rejected_append_does_not_rotate() {
    let temp = TempDir::new().unwrap();
    // Two files, every record fills its file
    let config = test_config(temp.path(), 2, 1);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    crate::write_at(&mut writer, &[10, 20]);
    assert_eq!(writer.current_index(), 1);

    let file0 = temp.path().join("binlog.000");
    let file0_len = fs::metadata(&file0).unwrap().len();
    let position = writer.position();

    let oversized = vec![0u8; MAX_RECORD_SIZE + 1];
    assert!(matches!(
        writer.append(&oversized, None),
        Err(LogError::RecordTooLarge { .. })
    ));

    // The full file 1 stays active and file 0 keeps its record
    assert_eq!(writer.current_index(), 1);
    assert_eq!(writer.position(), position);
    assert_eq!(fs::metadata(&file0).unwrap().len(), file0_len);
    assert_eq!(writer.peek_first_timestamp(0).unwrap(), Some(10));
}

#[test]
fn test_timestamps_strictly_increase() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    let mut last = 0;
    for _ in 0..200 {
        let ts = writer.append(b"tick", None).unwrap();
        assert!(ts > last);
        last = ts;
    }
}

#[test]
fn test_timestamps_never_go_backwards_after_future_record() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let mut writer = LogEngine::open_writer(&config).unwrap();
    let future = ringlog::log::now_micros() + 60_000_000;
    writer.append_at(b"future", None, future).unwrap();

    let ts = writer.append(b"now", None).unwrap();
    assert_eq!(ts, future + 1);
    assert_eq!(writer.current_timestamp(), future + 1);
}

#[test]
fn test_reopen_at_index_raises_floor_to_last_record() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let future = ringlog::log::now_micros() + 60_000_000;
    {
        let mut writer = LogEngine::open_writer(&config).unwrap();
        writer.append(b"now", None).unwrap();
        writer.append_at(b"future", None, future).unwrap();
    }

    let mut writer = LogEngine::open_writer_at(&config, 0).unwrap();
    assert_eq!(writer.current_timestamp(), future);
    assert_eq!(writer.position().timestamp, future);

    let ts = writer.append(b"after restart", None).unwrap();
    assert_eq!(ts, future + 1);
}

#[test]
fn test_writer_reopen_continues_at_end() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), 4, 1024 * 1024);

    let end = {
        let mut writer = LogEngine::open_writer(&config).unwrap();
        writer.append(b"first", None).unwrap();
        writer.sync().unwrap();
        writer.position()
    };

    let mut writer = LogEngine::open_writer(&config).unwrap();
    assert_eq!(writer.position().index, end.index);
    assert_eq!(writer.position().offset, end.offset);

    writer.append(b"second", None).unwrap();

    let mut reader = LogEngine::open_reader(&config).unwrap();
    let payloads = read_all(&mut reader, Cursor::start_of(0));
    assert_eq!(payloads, vec![b"first".to_vec(), b"second".to_vec()]);
}
