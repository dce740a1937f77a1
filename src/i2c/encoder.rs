//! # I2C Report Encoder
//!
//! Builds the outgoing special-mode reports for mode switching and for I2C
//! write/read transactions with the sensor.

use super::protocol::*;

/// Encode a mode-set report enabling or disabling the I2C special mode
///
/// Enabling also switches on the pull-up resistors and the bus. Mode
/// reports are not answered by the bridge.
///
/// # Examples
///
/// ```
/// use shtw1_bridge::i2c::encoder::encode_mode;
///
/// assert_eq!(encode_mode(true).as_bytes(), &[0x01, 0x01, 0x80, 0, 0, 0, 0, 0]);
/// ```
pub fn encode_mode(enable: bool) -> Report {
    if enable {
        Report::with_payload(REPORT_ID_MODE, &[MODE_ENABLE_I2C, MODE_FLAGS_PULLUP_BUS])
    } else {
        Report::with_payload(REPORT_ID_MODE, &[MODE_DISABLE_I2C])
    }
}

/// Encode a 16-bit sensor command as an I2C write
///
/// Layout after the report id:
/// ```text
/// Byte 0: flags | count  (start + stop, 3 bytes)
/// Byte 1: address + write bit
/// Byte 2: command[15:8]
/// Byte 3: command[7:0]
/// ```
///
/// # Examples
///
/// ```
/// use shtw1_bridge::i2c::encoder::encode_write;
///
/// let report = encode_write(0xEFC8);
/// assert_eq!(&report.as_bytes()[..5], &[0x02, 0xC3, 0xE0, 0xEF, 0xC8]);
/// ```
pub fn encode_write(command: u16) -> Report {
    let [high, low] = command.to_be_bytes();
    Report::with_payload(
        REPORT_ID_I2C_WRITE,
        &[
            WRITE_FLAG_START_STOP | COMMAND_TRANSFER_LEN,
            SENSOR_WRITE_ADDRESS,
            high,
            low,
        ],
    )
}

/// Encode an I2C read of `byte_count` bytes from the sensor
///
/// Counts larger than one reply can carry are clamped to [`MAX_READ_LEN`].
pub fn encode_read(byte_count: u8) -> Report {
    Report::with_payload(
        REPORT_ID_I2C_READ,
        &[byte_count.min(MAX_READ_LEN), SENSOR_READ_ADDRESS],
    )
}
