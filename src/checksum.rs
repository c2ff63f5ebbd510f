//! Integrity functions used to build and verify module frames.

use crc::{CRC_16_GENIBUS, Crc};

/// CRC calculator for tag-traffic frames
const GENIBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_GENIBUS);

/// 8-bit wrapping sum of all bytes. The sum of an empty slice is 0.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// CRC-16/GENIBUS: poly 0x1021, init 0xFFFF, no reflection, output inverted.
///
/// This is the same CRC an EPC Gen2 tag stores in word 0 of its EPC bank.
pub fn crc16_genibus(data: &[u8]) -> u16 {
    GENIBUS.checksum(data)
}
