//! Trait abstraction for the USB-HID bridge transport to enable testing

use async_trait::async_trait;
use std::fmt;
use std::io;

use crate::i2c::protocol::Report;

/// Transport-local identifier of one connected bridge adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdapterId(pub usize);

impl fmt::Display for AdapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Adapter reference held by the core, with its cached serial number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterHandle {
    pub id: AdapterId,
    pub serial_number: u32,
}

/// Trait for HID report I/O with bridge adapters
///
/// Implementations own the device handles. Callers must not interleave two
/// exchanges on the same adapter; [`Transport::exchange`] keeps a request and
/// its reply together.
#[async_trait]
pub trait Transport: Send {
    /// Adapters connected at startup, in enumeration order
    async fn list_adapters(&mut self) -> io::Result<Vec<AdapterId>>;

    /// Serial number of an adapter
    fn serial_number(&self, adapter: AdapterId) -> io::Result<u32>;

    /// Write one report to the adapter's special-mode interface
    async fn write_report(&mut self, adapter: AdapterId, report: &Report) -> io::Result<()>;

    /// Read one report from the adapter's special-mode interface
    async fn read_report(&mut self, adapter: AdapterId) -> io::Result<Report>;

    /// Write a request and wait for its reply
    async fn exchange(&mut self, adapter: AdapterId, request: &Report) -> io::Result<Report> {
        self.write_report(adapter, request).await?;
        self.read_report(adapter).await
    }
}

/// Parse a hexadecimal serial number string as reported by the bridge
///
/// # Examples
///
/// ```
/// use shtw1_bridge::hid::transport::parse_serial_number;
///
/// assert_eq!(parse_serial_number("00001AD9"), Some(6873));
/// assert_eq!(parse_serial_number("zz"), None);
/// ```
pub fn parse_serial_number(text: &str) -> Option<u32> {
    let trimmed = text.trim().trim_end_matches('\0');
    if trimmed.is_empty() {
        return None;
    }
    u32::from_str_radix(trimmed, 16).ok()
}
