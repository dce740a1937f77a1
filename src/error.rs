//! # Error Types
//!
//! Custom error types for the SHTW1 bridge using `thiserror`.
//!
//! Errors are split by how far they reach:
//! - [`LinkError`]: the HID/I2C link failed for one adapter (counts toward disconnect)
//! - [`ChecksumError`]: a register read arrived corrupted (transient, never disconnects)
//! - [`BridgeError`]: process-level failures (configuration, no adapters, record files)

use std::fmt;
use std::io;

use thiserror::Error;

/// Failure of one request/response exchange with a bridge adapter
#[derive(Debug, Error)]
pub enum LinkError {
    /// Slave did not acknowledge (top bit of the status byte set)
    #[error("I2C slave did not acknowledge (status 0x{status:02X}), possible slave disconnection")]
    NotAcknowledged { status: u8 },

    /// The command was acknowledged only partially
    #[error("incomplete command transfer: {accepted} of 3 bytes acknowledged")]
    IncompleteTransfer { accepted: u8 },

    /// The bridge answered with a report of a different kind
    #[error("unexpected report id 0x{actual:02X} (expected 0x{expected:02X})")]
    UnexpectedReport { expected: u8, actual: u8 },

    /// The reply cannot hold the requested number of bytes
    #[error("reply too short: wanted {expected} bytes, report holds {available}")]
    ShortReply { expected: usize, available: usize },

    /// HID transport I/O failure
    #[error("HID transport error: {0}")]
    Io(#[from] io::Error),
}

impl LinkError {
    /// True for the I2C-level acknowledge failures, as opposed to host I/O errors
    #[must_use]
    pub fn is_ack_failure(&self) -> bool {
        matches!(
            self,
            LinkError::NotAcknowledged { .. } | LinkError::IncompleteTransfer { .. }
        )
    }
}

/// Which CRC-protected word failed validation
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ChecksumError {
    /// The identification register word
    #[error("checksum mismatch on identity word")]
    Identity,

    /// The temperature word; the whole sample is unusable
    #[error("checksum mismatch on temperature word")]
    Temperature,

    /// The humidity word; temperature is still valid
    #[error("checksum mismatch on humidity word (temperature {temperature_c:.2} °C still valid)")]
    Humidity { temperature_c: f32 },
}

/// Error of one sensor session operation
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Checksum(#[from] ChecksumError),
}

/// Problem found in one line of the sensor binding table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingIssue {
    /// 1-based line number inside the `sensors:` section
    pub line: usize,
    /// Offending line content (without newline)
    pub content: String,
    pub reason: BindingIssueKind,
}

/// Why a binding line was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingIssueKind {
    TooShort(usize),
    TooLong(usize),
    MissingSeparator,
    EmptyName,
    EmptySerial,
    NameTooLong(usize),
    InvalidSerial(String),
    DuplicateName(String),
    DuplicateSerial(u32),
}

impl fmt::Display for BindingIssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort(n) => write!(f, "{} characters - too few", n),
            Self::TooLong(n) => write!(f, "{} characters - too many", n),
            Self::MissingSeparator => write!(f, "missing separation character <tab>"),
            Self::EmptyName => write!(f, "no data before separation character <tab>"),
            Self::EmptySerial => write!(f, "no data after separation character <tab>"),
            Self::NameTooLong(n) => write!(f, "sensor name has {} characters, at most 29 allowed", n),
            Self::InvalidSerial(s) => {
                write!(f, "given decimal stick serial number \"{}\" is not a decimal number", s)
            }
            Self::DuplicateName(name) => write!(f, "sensor name \"{}\" is already bound", name),
            Self::DuplicateSerial(sn) => write!(f, "stick serial number {} is already bound", sn),
        }
    }
}

impl fmt::Display for BindingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sensors section, line {}: \"{}\" ({})",
            self.line, self.content, self.reason
        )
    }
}

/// Main error type for the SHTW1 bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No bridge adapter is connected at all
    #[error("No IO-Warrior device found (searched {0})")]
    NoAdapters(String),

    /// Binding table could not be loaded
    #[error("Sensor binding error: {0}")]
    Bindings(String),

    /// Measurement record or plot output failed
    #[error("Record output error: {0}")]
    Records(String),
}

/// Result type alias for the SHTW1 bridge
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_failure_classification() {
        assert!(LinkError::NotAcknowledged { status: 0x80 }.is_ack_failure());
        assert!(LinkError::IncompleteTransfer { accepted: 2 }.is_ack_failure());
        assert!(!LinkError::Io(io::Error::new(io::ErrorKind::Other, "gone")).is_ack_failure());
        assert!(!LinkError::ShortReply { expected: 7, available: 6 }.is_ack_failure());
    }

    #[test]
    fn test_binding_issue_display_names_line() {
        let issue = BindingIssue {
            line: 3,
            content: "outer".to_string(),
            reason: BindingIssueKind::MissingSeparator,
        };
        let text = issue.to_string();
        assert!(text.contains("line 3"));
        assert!(text.contains("outer"));
        assert!(text.contains("<tab>"));
    }

    #[test]
    fn test_humidity_checksum_error_mentions_temperature() {
        let err = ChecksumError::Humidity { temperature_c: 21.5 };
        assert!(err.to_string().contains("21.50"));
    }
}
