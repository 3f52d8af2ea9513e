//! Tests for AsyncAppender
//!
//! These tests verify:
//! - Appends from many threads all reach the log exactly once
//! - Timestamps stay strictly increasing in file order
//! - Shutdown drains the queue and returns the log

use std::collections::HashSet;
use std::thread;

use ringlog::{AsyncAppender, Cursor, DurableLog, ReadOutcome};
use tempfile::TempDir;

use crate::durable_config;

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_single_producer_append() {
    let temp = TempDir::new().unwrap();
    let log = DurableLog::open(durable_config(temp.path(), 1024 * 1024)).unwrap();

    let appender = AsyncAppender::spawn(log, 8).unwrap();
    let first = appender.append(b"one".to_vec(), None).unwrap();
    let second = appender.append(b"two".to_vec(), Some(5)).unwrap();
    assert!(second > first);

    appender.sync().unwrap();
    let stats = appender.stats();
    assert_eq!(stats.appended, 2);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.bytes, 6);
    assert_eq!(stats.last_timestamp, second);

    let log = appender.shutdown().unwrap();
    assert_eq!(log.position().timestamp, second);
}

#[test]
fn test_concurrent_producers() {
    let temp = TempDir::new().unwrap();
    let log = DurableLog::open(durable_config(temp.path(), 4096)).unwrap();
    let appender = AsyncAppender::spawn(log, 4).unwrap();

    thread::scope(|scope| {
        for producer in 0..4 {
            let appender = &appender;
            scope.spawn(move || {
                for i in 0..25 {
                    let payload = format!("p{}-{}", producer, i).into_bytes();
                    appender.append(payload, None).unwrap();
                }
            });
        }
    });

    assert_eq!(appender.stats().appended, 100);
    let log = appender.shutdown().unwrap();

    let mut reader = log.reader().unwrap();
    let mut cursor = Cursor::start_of(0);
    let mut seen = HashSet::new();
    let mut last_ts = 0;
    while let ReadOutcome::Record(record, next) = reader.read_across(cursor).unwrap() {
        assert!(record.timestamp() > last_ts);
        last_ts = record.timestamp();
        assert!(seen.insert(record.payload.to_vec()));
        cursor = next;
    }

    assert_eq!(seen.len(), 100);
    assert!(seen.contains(&b"p3-24".to_vec()));
}

#[test]
fn test_submit_then_wait() {
    let temp = TempDir::new().unwrap();
    let log = DurableLog::open(durable_config(temp.path(), 1024 * 1024)).unwrap();
    let appender = AsyncAppender::spawn(log, 16).unwrap();

    let pending: Vec<_> = (0..10)
        .map(|i| appender.submit(vec![i as u8], None).unwrap())
        .collect();

    let timestamps: Vec<u64> = pending.into_iter().map(|p| p.wait().unwrap()).collect();
    assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn test_shutdown_drains_queue() {
    let temp = TempDir::new().unwrap();
    let config = durable_config(temp.path(), 1024 * 1024);
    let log = DurableLog::open(config.clone()).unwrap();
    let appender = AsyncAppender::spawn(log, 64).unwrap();

    let pending: Vec<_> = (0..20)
        .map(|i| appender.submit(format!("{}", i).into_bytes(), None).unwrap())
        .collect();
    let log = appender.shutdown().unwrap();

    for p in pending {
        assert!(p.wait().is_ok());
    }

    let saved = ringlog::CheckpointStore::primary(temp.path(), "binlog")
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(saved.current_offset, log.position().offset);
}

#[test]
fn test_drop_stops_writer() {
    let temp = TempDir::new().unwrap();
    let config = durable_config(temp.path(), 1024 * 1024);

    {
        let log = DurableLog::open(config.clone()).unwrap();
        let appender = AsyncAppender::spawn(log, 4).unwrap();
        appender.append(b"before drop".to_vec(), None).unwrap();
    }

    // The writer handle was released, so the log reopens cleanly
    let log = DurableLog::open(config).unwrap();
    let mut reader = log.reader().unwrap();
    let (record, _) = reader.read_next(Cursor::start_of(0)).unwrap().into_record().unwrap();
    assert_eq!(&record.payload[..], b"before drop");
}
