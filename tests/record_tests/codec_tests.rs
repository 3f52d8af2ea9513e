//! Tests for the record codec
//!
//! These tests verify:
//! - Encoding and decoding of both wire versions
//! - Header validation (magic, length, truncation)
//! - Checksum coverage (payload only)

use ringlog::record::{
    crc16, decode, decode_header, encode, encode_header, verify, DecodeError, RecordHeader, WireVersion,
    HEADER_SIZE, MAGIC_V1, MAGIC_V2, MAX_RECORD_SIZE, SESSION_ID_SIZE,
};
use ringlog::LogError;

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_encode_v1_record() {
    let bytes = encode(b"hello", 1_000, None).unwrap();

    assert_eq!(bytes.len(), HEADER_SIZE + 5);
    assert_eq!(u16::from_ne_bytes([bytes[0], bytes[1]]), MAGIC_V1);
    assert_eq!(&bytes[HEADER_SIZE..], b"hello");
}

#[test]
fn test_encode_v2_record_carries_session_id() {
    let bytes = encode(b"hello", 1_000, Some(77)).unwrap();

    assert_eq!(bytes.len(), HEADER_SIZE + SESSION_ID_SIZE + 5);
    assert_eq!(u16::from_ne_bytes([bytes[0], bytes[1]]), MAGIC_V2);

    let mut raw_id = [0u8; SESSION_ID_SIZE];
    raw_id.copy_from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + SESSION_ID_SIZE]);
    assert_eq!(u64::from_ne_bytes(raw_id), 77);
}

#[test]
fn test_encode_header_fields() {
    let header = encode_header(b"payload", 42, None).unwrap();

    assert_eq!(header.magic, MAGIC_V1);
    assert_eq!(header.length, 7);
    assert_eq!(header.timestamp, 42);
    assert_eq!(header.checksum, crc16(b"payload"));
    assert_eq!(header.version(), WireVersion::V1);
    assert_eq!(header.record_len(), (HEADER_SIZE + 7) as u64);
}

#[test]
fn test_header_bytes_layout() {
    let header = RecordHeader {
        magic: MAGIC_V2,
        checksum: 0xBEEF,
        length: 3,
        timestamp: 0x0102_0304_0506_0708,
    };

    let raw = header.to_bytes();
    assert_eq!(RecordHeader::from_bytes(&raw), header);
    assert_eq!(&raw[8..16], &0x0102_0304_0506_0708u64.to_ne_bytes());
}

#[test]
fn test_encode_rejects_oversized_payload() {
    let payload = vec![0u8; MAX_RECORD_SIZE + 1];
    let result = encode_header(&payload, 1, None);

    assert!(matches!(result, Err(LogError::RecordTooLarge { .. })));
}

#[test]
fn test_empty_payload() {
    let bytes = encode(b"", 9, None).unwrap();
    let (record, consumed) = decode(&bytes).unwrap();

    assert_eq!(consumed, HEADER_SIZE);
    assert!(record.payload.is_empty());
    assert_eq!(record.timestamp(), 9);
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_decode_v1_record() {
    let bytes = encode(b"value", 123, None).unwrap();
    let (record, consumed) = decode(&bytes).unwrap();

    assert_eq!(consumed, bytes.len());
    assert_eq!(&record.payload[..], b"value");
    assert_eq!(record.timestamp(), 123);
    assert_eq!(record.session_id, None);
    assert_eq!(record.version(), WireVersion::V1);
}

#[test]
fn test_decode_v2_record() {
    let bytes = encode(b"value", 123, Some(u64::MAX - 1)).unwrap();
    let (record, consumed) = decode(&bytes).unwrap();

    assert_eq!(consumed, bytes.len());
    assert_eq!(&record.payload[..], b"value");
    assert_eq!(record.session_id, Some(u64::MAX - 1));
    assert_eq!(record.version(), WireVersion::V2);
}

#[test]
fn test_decode_consumes_only_first_record() {
    let mut bytes = encode(b"first", 1, None).unwrap();
    let first_len = bytes.len();
    bytes.extend(encode(b"second", 2, None).unwrap());

    let (record, consumed) = decode(&bytes).unwrap();
    assert_eq!(consumed, first_len);
    assert_eq!(&record.payload[..], b"first");

    let (record, _) = decode(&bytes[consumed..]).unwrap();
    assert_eq!(&record.payload[..], b"second");
}

#[test]
fn test_decode_header_rejects_bad_magic() {
    let mut bytes = encode(b"x", 1, None).unwrap();
    bytes[0] ^= 0xFF;

    assert!(matches!(decode_header(&bytes), Err(DecodeError::BadMagic(_))));
}

#[test]
fn test_decode_header_rejects_oversized_length() {
    let mut bytes = encode(b"x", 1, None).unwrap();
    let too_long = (MAX_RECORD_SIZE as u32) + 1;
    bytes[4..8].copy_from_slice(&too_long.to_ne_bytes());

    assert_eq!(decode_header(&bytes), Err(DecodeError::TooLong(too_long)));
}

#[test]
fn test_decode_header_rejects_short_buffer() {
    let bytes = encode(b"x", 1, None).unwrap();

    assert_eq!(
        decode_header(&bytes[..10]),
        Err(DecodeError::Truncated {
            needed: HEADER_SIZE,
            available: 10
        })
    );
}

#[test]
fn test_decode_rejects_truncated_payload() {
    let bytes = encode(b"abcdef", 1, None).unwrap();

    assert!(matches!(
        decode(&bytes[..bytes.len() - 2]),
        Err(DecodeError::Truncated { .. })
    ));
}

// =============================================================================
// Checksum Tests
// =============================================================================

#[test]
fn test_decode_detects_payload_corruption() {
    let mut bytes = encode(b"abcdef", 1, None).unwrap();
    bytes[HEADER_SIZE + 2] ^= 0x01;

    assert!(matches!(decode(&bytes), Err(DecodeError::Checksum { .. })));
}

#[test]
fn test_checksum_covers_payload_only() {
    let mut bytes = encode(b"abcdef", 1, Some(5)).unwrap();

    // Timestamp and session id are outside the checksum
    bytes[8] ^= 0x01;
    bytes[HEADER_SIZE] ^= 0x01;

    let (record, _) = decode(&bytes).unwrap();
    assert_eq!(&record.payload[..], b"abcdef");
    assert_ne!(record.timestamp(), 1);
    assert_ne!(record.session_id, Some(5));
}

#[test]
fn test_verify() {
    let header = encode_header(b"data", 1, None).unwrap();

    assert!(verify(b"data", &header));
    assert!(!verify(b"date", &header));
    assert!(!verify(b"dat", &header));
}
