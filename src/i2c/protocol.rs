//! # IO-Warrior I2C Special-Mode Constants and Types
//!
//! Wire layout of the bridge's special-mode HID reports and the SHTW1/SHTC1
//! command set.
//!
//! Every report is [`REPORT_SIZE`] bytes: a report id followed by seven
//! payload bytes. Offsets below are into the full report (id at 0).

/// Size of one special-mode HID report (report id + 7 bytes) on IOW24/IOW40
pub const REPORT_SIZE: usize = 8;

/// Number of payload bytes following the report id
pub const REPORT_PAYLOAD_SIZE: usize = REPORT_SIZE - 1;

/// Mode-set report (enable/disable I2C special mode)
pub const REPORT_ID_MODE: u8 = 0x01;

/// I2C write report
pub const REPORT_ID_I2C_WRITE: u8 = 0x02;

/// I2C read report
pub const REPORT_ID_I2C_READ: u8 = 0x03;

/// Mode-set flag: enable I2C
pub const MODE_ENABLE_I2C: u8 = 0x01;

/// Mode-set flag: disable I2C
pub const MODE_DISABLE_I2C: u8 = 0x00;

/// Mode-set flags: pull-up resistors on, bus on
pub const MODE_FLAGS_PULLUP_BUS: u8 = 0x80;

/// Write flags: generate start, generate stop
pub const WRITE_FLAG_START_STOP: u8 = 0xC0;

/// Status bit set by the bridge when the slave did not acknowledge
pub const STATUS_NACK: u8 = 0x80;

/// Bytes in one command transfer (address byte + 16-bit command)
pub const COMMAND_TRANSFER_LEN: u8 = 3;

/// Largest read that fits into one reply (status byte + data)
pub const MAX_READ_LEN: u8 = (REPORT_PAYLOAD_SIZE - 1) as u8;

/// 7-bit I2C address of the SHTW1/SHTC1
pub const SENSOR_I2C_ADDRESS: u8 = 0x70;

/// Address byte for a write transfer (address + write bit)
pub const SENSOR_WRITE_ADDRESS: u8 = SENSOR_I2C_ADDRESS << 1;

/// Address byte for a read transfer (address + read bit)
pub const SENSOR_READ_ADDRESS: u8 = (SENSOR_I2C_ADDRESS << 1) | 0x01;

/// Read the identification register
pub const CMD_READ_ID: u16 = 0xEFC8;

/// Soft reset
pub const CMD_SOFT_RESET: u16 = 0x805D;

/// Measure, temperature first, clock stretching disabled
pub const CMD_MEASURE_T_RH_POLLING: u16 = 0x7866;

/// Measure, temperature first, clock stretching enabled
pub const CMD_MEASURE_T_RH_CLOCK_STRETCHING: u16 = 0x7CA2;

/// Measure, humidity first, clock stretching disabled
pub const CMD_MEASURE_RH_T_POLLING: u16 = 0x58E0;

/// Measure, humidity first, clock stretching enabled
pub const CMD_MEASURE_RH_T_CLOCK_STRETCHING: u16 = 0x5C24;

/// Identification read: 16-bit word + CRC
pub const ID_READ_LEN: u8 = 3;

/// Measurement read: temperature word + CRC, humidity word + CRC
pub const MEASUREMENT_READ_LEN: u8 = 6;

/// Product code of SHTW1/SHTC1 in bits 5..0 of the identification word
pub const SHTC1_PRODUCT_CODE: u8 = 0x07;

/// Mask selecting the product code from the identification word
pub const PRODUCT_CODE_MASK: u16 = 0x3F;

/// One fixed-size special-mode HID report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report([u8; REPORT_SIZE]);

impl Report {
    /// Creates a zeroed report with the given id
    #[must_use]
    pub fn new(id: u8) -> Self {
        let mut bytes = [0u8; REPORT_SIZE];
        bytes[0] = id;
        Self(bytes)
    }

    /// Creates a report with the given id and leading payload bytes
    ///
    /// Payload bytes beyond the report size are dropped.
    #[must_use]
    pub fn with_payload(id: u8, payload: &[u8]) -> Self {
        let mut report = Self::new(id);
        let len = payload.len().min(REPORT_PAYLOAD_SIZE);
        report.0[1..1 + len].copy_from_slice(&payload[..len]);
        report
    }

    /// Wraps raw bytes as received from the transport
    #[must_use]
    pub fn from_bytes(bytes: [u8; REPORT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Report id
    #[must_use]
    pub fn id(&self) -> u8 {
        self.0[0]
    }

    /// Bytes following the report id
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.0[1..]
    }

    /// Full report including the id
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; REPORT_SIZE] {
        &self.0
    }
}

/// Which measurement command variant the session issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeasureMode {
    /// Sensor holds SCL until the result is ready
    #[default]
    ClockStretching,
    /// Sensor NACKs reads until the result is ready; the host waits first
    Polling,
}

impl MeasureMode {
    /// Temperature-first measurement command for this mode
    #[must_use]
    pub fn command(self) -> u16 {
        match self {
            MeasureMode::ClockStretching => CMD_MEASURE_T_RH_CLOCK_STRETCHING,
            MeasureMode::Polling => CMD_MEASURE_T_RH_POLLING,
        }
    }
}
