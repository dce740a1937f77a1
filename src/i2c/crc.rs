//! # Sensirion CRC-8 Implementation
//!
//! CRC-8 checksum protecting every 16-bit word read from an SHTW1/SHTC1.
//!
//! **Polynomial**: 0x131 (x^8 + x^5 + x^4 + 1)
//! **Initial Value**: 0xFF
//! **Bit order**: MSB first, no reflection, no final XOR

use thiserror::Error;

/// CRC-8 polynomial, the x^8 term is implied by the u8 shift
const CRC8_POLY: u8 = 0x31;

/// CRC-8 initial value
const CRC8_INIT: u8 = 0xFF;

/// Precomputed CRC8 lookup table for fast calculation
const CRC8_TABLE: [u8; 256] = generate_crc8_table();

/// Generate CRC8 lookup table at compile time
const fn generate_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Received checksum does not match the one computed over the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("CRC mismatch: computed 0x{computed:02X}, received 0x{received:02X}")]
pub struct ChecksumMismatch {
    pub computed: u8,
    pub received: u8,
}

/// Calculate the Sensirion CRC-8 checksum using the lookup table
///
/// # Arguments
///
/// * `data` - Byte slice to calculate CRC for (normally one 2-byte word)
///
/// # Examples
///
/// ```
/// use shtw1_bridge::i2c::crc::compute;
///
/// // Datasheet example
/// assert_eq!(compute(&[0xBE, 0xEF]), 0x92);
/// ```
pub fn compute(data: &[u8]) -> u8 {
    let mut crc = CRC8_INIT;

    for &byte in data {
        crc = CRC8_TABLE[(crc ^ byte) as usize];
    }

    crc
}

/// Verify that `received` is the checksum of `data`
///
/// # Errors
///
/// Returns [`ChecksumMismatch`] carrying both values when they differ.
pub fn verify(data: &[u8], received: u8) -> Result<(), ChecksumMismatch> {
    let computed = compute(data);
    if computed == received {
        Ok(())
    } else {
        Err(ChecksumMismatch { computed, received })
    }
}

/// Calculate the checksum bit by bit (slow, for verification)
///
/// Follows the datasheet description literally; used to check the table.
#[allow(dead_code)]
fn compute_slow(data: &[u8]) -> u8 {
    let mut crc = CRC8_INIT;

    for &byte in data {
        crc ^= byte;

        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}
