//! # Linux hidraw Transport
//!
//! Talks to IO-Warrior bridges through `/dev/hidrawN` nodes.
//!
//! Discovery walks `/sys/class/hidraw`, keeps nodes whose `HID_ID` matches
//! the configured vendor/product ids and whose parent USB interface is the
//! special-mode interface, and takes the serial number from `HID_UNIQ`.

use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::transport::{parse_serial_number, AdapterId, Transport};
use crate::config::TransportConfig;
use crate::error::{BridgeError, Result};
use crate::i2c::protocol::{Report, REPORT_SIZE};

/// hidraw node found during the sysfs scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidrawCandidate {
    /// Device node, e.g. `/dev/hidraw3`
    pub node: PathBuf,
    pub serial_number: u32,
}

struct HidrawDevice {
    node: PathBuf,
    serial_number: u32,
    file: tokio::fs::File,
}

/// Bridge transport backed by Linux hidraw device nodes
pub struct HidrawTransport {
    devices: Vec<HidrawDevice>,
}

impl std::fmt::Debug for HidrawTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HidrawTransport")
            .field(
                "devices",
                &self.devices.iter().map(|d| &d.node).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Fields of interest from a hidraw device's `uevent` file
#[derive(Debug, Default, PartialEq, Eq)]
struct UEvent {
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    uniq: Option<String>,
}

/// Parse `HID_ID=0003:000007C0:00001501` and `HID_UNIQ=...` lines
fn parse_uevent(contents: &str) -> UEvent {
    let mut event = UEvent::default();

    for line in contents.lines() {
        if let Some(id) = line.strip_prefix("HID_ID=") {
            let mut parts = id.split(':').skip(1);
            event.vendor_id = parts
                .next()
                .and_then(|v| u32::from_str_radix(v, 16).ok())
                .and_then(|v| u16::try_from(v).ok());
            event.product_id = parts
                .next()
                .and_then(|p| u32::from_str_radix(p, 16).ok())
                .and_then(|p| u16::try_from(p).ok());
        } else if let Some(uniq) = line.strip_prefix("HID_UNIQ=") {
            event.uniq = Some(uniq.to_string());
        }
    }

    event
}

/// Scan sysfs for bridge special-mode interfaces
///
/// # Returns
///
/// Matching nodes sorted by name. Entries that cannot be read are skipped
/// with a debug message.
pub fn scan(config: &TransportConfig) -> io::Result<Vec<HidrawCandidate>> {
    let sysfs_root = Path::new(&config.sysfs_root);
    let mut names: Vec<String> = fs::read_dir(sysfs_root)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();

    let mut found = Vec::new();

    for name in names {
        let device_dir = sysfs_root.join(&name).join("device");

        let uevent = match fs::read_to_string(device_dir.join("uevent")) {
            Ok(contents) => parse_uevent(&contents),
            Err(e) => {
                debug!("Skipping {}: cannot read uevent: {}", name, e);
                continue;
            }
        };

        if uevent.vendor_id != Some(config.vendor_id) {
            continue;
        }
        match uevent.product_id {
            Some(pid) if config.product_ids.contains(&pid) => {}
            _ => continue,
        }

        // The hid device's parent is the USB interface
        let interface = fs::read_to_string(device_dir.join("..").join("bInterfaceNumber"))
            .ok()
            .and_then(|s| u8::from_str_radix(s.trim(), 16).ok());
        if interface != Some(config.special_interface) {
            debug!("Skipping {}: interface {:?} is not the special-mode interface", name, interface);
            continue;
        }

        let Some(serial_number) = uevent.uniq.as_deref().and_then(parse_serial_number) else {
            warn!("Skipping {}: bridge reports no usable serial number", name);
            continue;
        };

        found.push(HidrawCandidate {
            node: Path::new(&config.dev_root).join(&name),
            serial_number,
        });
    }

    Ok(found)
}

impl HidrawTransport {
    /// Discover and open all bridges matching the configuration
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NoAdapters`] if no bridge could be opened.
    pub fn open(config: &TransportConfig) -> Result<Self> {
        let candidates = scan(config)?;
        let mut devices = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            debug!("Trying to open hidraw node: {}", candidate.node.display());

            match fs::OpenOptions::new().read(true).write(true).open(&candidate.node) {
                Ok(file) => {
                    info!(
                        "Opened IO-Warrior S/N {} at {}",
                        candidate.serial_number,
                        candidate.node.display()
                    );
                    devices.push(HidrawDevice {
                        node: candidate.node,
                        serial_number: candidate.serial_number,
                        file: tokio::fs::File::from_std(file),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", candidate.node.display(), e);
                }
            }
        }

        if devices.is_empty() {
            return Err(BridgeError::NoAdapters(config.sysfs_root.clone()));
        }

        Ok(Self { devices })
    }

    fn device(&mut self, adapter: AdapterId) -> io::Result<&mut HidrawDevice> {
        self.devices
            .get_mut(adapter.0)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no adapter {}", adapter)))
    }
}

#[async_trait]
impl Transport for HidrawTransport {
    async fn list_adapters(&mut self) -> io::Result<Vec<AdapterId>> {
        Ok((0..self.devices.len()).map(AdapterId).collect())
    }

    fn serial_number(&self, adapter: AdapterId) -> io::Result<u32> {
        self.devices
            .get(adapter.0)
            .map(|d| d.serial_number)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no adapter {}", adapter)))
    }

    async fn write_report(&mut self, adapter: AdapterId, report: &Report) -> io::Result<()> {
        let device = self.device(adapter)?;
        device.file.write_all(report.as_bytes()).await?;
        device.file.flush().await
    }

    async fn read_report(&mut self, adapter: AdapterId) -> io::Result<Report> {
        let device = self.device(adapter)?;
        let mut buf = [0u8; REPORT_SIZE];
        let n = device.file.read(&mut buf).await?;
        if n != REPORT_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: read {} bytes, expected {}", device.node.display(), n, REPORT_SIZE),
            ));
        }
        Ok(Report::from_bytes(buf))
    }
}
