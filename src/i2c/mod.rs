//! # I2C-over-HID Module
//!
//! Transaction codec for the IO-Warrior I2C special mode.
//!
//! This module handles:
//! - Special-mode report layout and sensor command set
//! - Encoding mode, I2C write and I2C read reports
//! - Decoding acknowledge/status bits and read payloads
//! - Sensirion CRC-8 over received words

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod crc;
