//! CRC-16/XMODEM
//!
//! Polynomial 0x1021, initial value 0, no reflection, no final xor.

use crc::{Crc, CRC_16_XMODEM};

const XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Compute the CRC-16 of `data`
pub fn crc16(data: &[u8]) -> u16 {
    XMODEM.checksum(data)
}
