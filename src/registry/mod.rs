//! # Sensor Registry
//!
//! Maps configured logical sensors to the bridge adapters they are wired to.
//!
//! The registry is built once at startup. Every adapter the transport
//! reports gets I2C enabled, a soft reset and an identification; its serial
//! number is then matched against the binding table. After that bind pass
//! the only status change is `Bound -> Disconnected`, made by the poller.

pub mod binding;

use std::fmt;
use tracing::{info, warn};

use crate::error::{BridgeError, Result};
use crate::hid::transport::{AdapterHandle, Transport};
use crate::i2c::protocol::MeasureMode;
use crate::sensor::{SensorIdentity, SensorSession};
use binding::{BindingTable, SensorBinding};

/// Binding state of one logical sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorStatus {
    /// No adapter with the configured serial number is connected
    Unbound,
    /// The adapter answers, but with a foreign product code
    IdentifiedUnknown(u8),
    /// Adapter and SHTW1/SHTC1 found; polled every cycle
    Bound,
    /// Adapter found without a responding sensor, or the sensor stopped answering
    Disconnected,
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound => write!(f, "USB stick not found"),
            Self::IdentifiedUnknown(id) => write!(f, "unknown physical sensor found (id {})", id),
            Self::Bound => write!(f, "USB stick and physical sensor found"),
            Self::Disconnected => write!(f, "physical sensor not found"),
        }
    }
}

/// One configured sensor and what the bind pass found for it
#[derive(Debug, Clone)]
pub struct BoundSensor {
    binding: SensorBinding,
    adapter: Option<AdapterHandle>,
    status: SensorStatus,
}

impl BoundSensor {
    fn new(binding: SensorBinding) -> Self {
        Self {
            binding,
            adapter: None,
            status: SensorStatus::Unbound,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.binding.name
    }

    /// Serial number of the bridge this sensor is configured behind
    #[must_use]
    pub fn serial_number(&self) -> u32 {
        self.binding.serial_number
    }

    /// Adapter, attached only while the sensor is or was `Bound`
    #[must_use]
    pub fn adapter(&self) -> Option<AdapterHandle> {
        self.adapter
    }

    #[must_use]
    pub fn status(&self) -> SensorStatus {
        self.status
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.status == SensorStatus::Bound
    }
}

/// All configured sensors, in binding-table order
#[derive(Debug, Clone)]
pub struct SensorRegistry {
    sensors: Vec<BoundSensor>,
    adapters: Vec<AdapterHandle>,
    mode: MeasureMode,
}

impl SensorRegistry {
    /// Run the bind pass over every connected adapter
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NoAdapters`] when the transport reports no
    /// adapter at all, or an I/O error if enumeration itself fails. Failures
    /// of individual adapters are logged and leave their sensor unbound.
    pub async fn build<T: Transport>(
        transport: &mut T,
        bindings: &BindingTable,
        mode: MeasureMode,
    ) -> Result<Self> {
        let mut registry = Self {
            sensors: bindings.entries().iter().cloned().map(BoundSensor::new).collect(),
            adapters: Vec::new(),
            mode,
        };

        let ids = transport.list_adapters().await?;
        if ids.is_empty() {
            return Err(BridgeError::NoAdapters("transport enumeration".to_string()));
        }
        info!("There are {} IO-Warrior devices connected", ids.len());

        for id in ids {
            let serial_number = match transport.serial_number(id) {
                Ok(sn) => sn,
                Err(e) => {
                    warn!("Adapter {}: cannot read serial number: {}", id, e);
                    continue;
                }
            };
            let handle = AdapterHandle { id, serial_number };
            registry.adapters.push(handle);

            let identity = Self::probe(transport, handle, mode).await;
            registry.bind(handle, identity);
        }

        Ok(registry)
    }

    /// Enable I2C, soft-reset and identify the sensor behind one adapter
    async fn probe<T: Transport>(
        transport: &mut T,
        handle: AdapterHandle,
        mode: MeasureMode,
    ) -> SensorIdentity {
        let session = SensorSession::new(handle, mode);
        let sn = handle.serial_number;

        if let Err(e) = session.enable_i2c(transport).await {
            warn!("S/N {}: enabling I2C failed: {}", sn, e);
        }
        if let Err(e) = session.soft_reset(transport).await {
            warn!("S/N {}: soft reset failed: {}", sn, e);
        }

        match session.identify(transport).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!("S/N {}: identification failed: {}", sn, e);
                SensorIdentity::NotPresent
            }
        }
    }

    /// Apply one adapter's identification to the matching binding
    fn bind(&mut self, handle: AdapterHandle, identity: SensorIdentity) {
        let sn = handle.serial_number;

        let Some(sensor) = self
            .sensors
            .iter_mut()
            .find(|s| s.serial_number() == sn && s.status == SensorStatus::Unbound)
        else {
            info!("S/N {}: adapter is not in the binding table ({:?})", sn, identity);
            return;
        };

        sensor.status = match identity {
            SensorIdentity::Known => {
                sensor.adapter = Some(handle);
                info!("Bound USB stick S/N {} with sensor '{}'", sn, sensor.name());
                SensorStatus::Bound
            }
            SensorIdentity::UnknownId(id) => {
                warn!("S/N {}: found unknown sensor with ID {} for '{}'", sn, id, sensor.name());
                SensorStatus::IdentifiedUnknown(id)
            }
            SensorIdentity::NotPresent => {
                warn!(
                    "S/N {}: could not connect to any sensor for '{}', probably sensor is missing",
                    sn,
                    sensor.name()
                );
                SensorStatus::Disconnected
            }
        };
    }

    /// Number of configured sensors that are not `Bound`
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.sensors.iter().filter(|s| !s.is_bound()).count()
    }

    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.sensors.iter().filter(|s| s.is_bound()).count()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoundSensor> {
        self.sensors.iter().find(|s| s.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundSensor> {
        self.sensors.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Every adapter seen during the bind pass, bound or not
    #[must_use]
    pub fn adapters(&self) -> &[AdapterHandle] {
        &self.adapters
    }

    #[must_use]
    pub fn measure_mode(&self) -> MeasureMode {
        self.mode
    }

    /// Session for a `Bound` sensor
    #[must_use]
    pub fn session(&self, name: &str) -> Option<SensorSession> {
        let sensor = self.get(name).filter(|s| s.is_bound())?;
        sensor.adapter.map(|a| SensorSession::new(a, self.mode))
    }

    /// Move a `Bound` sensor to `Disconnected`
    ///
    /// Returns false if the sensor is unknown or not `Bound`.
    pub fn mark_disconnected(&mut self, name: &str) -> bool {
        match self.sensors.iter_mut().find(|s| s.name() == name) {
            Some(sensor) if sensor.is_bound() => {
                sensor.status = SensorStatus::Disconnected;
                true
            }
            _ => false,
        }
    }

    /// Log the bind result of every configured sensor
    pub fn log_summary(&self) {
        info!("Virtual sensors list:");
        for sensor in &self.sensors {
            info!(
                "  {} (stick S/N {}): {}",
                sensor.name(),
                sensor.serial_number(),
                sensor.status()
            );
        }

        for sensor in self.sensors.iter().filter(|s| s.status == SensorStatus::Unbound) {
            warn!(
                "Have not found sensor '{}' with USB stick S/N {}",
                sensor.name(),
                sensor.serial_number()
            );
        }

        let missing = self.missing_count();
        if missing > 0 {
            warn!("{} of {} configured sensors are not available", missing, self.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::transport::mocks::{word_with_crc, MockTransport};
    use crate::i2c::encoder::{encode_mode, encode_write};
    use crate::i2c::protocol::CMD_SOFT_RESET;

    const SHTC1_ID: u16 = 0x0887;

    fn table(entries: &[(&str, u32)]) -> BindingTable {
        BindingTable::from_entries(
            entries
                .iter()
                .map(|&(name, serial_number)| SensorBinding {
                    name: name.to_string(),
                    serial_number,
                })
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_binds_by_serial() {
        let mut transport = MockTransport::new();
        let a = transport.add_adapter(6873);
        let b = transport.add_adapter(6181);
        transport.push_reset_and_identity(a, SHTC1_ID);
        transport.push_reset_and_identity(b, SHTC1_ID);

        let bindings = table(&[("outer", 6873), ("inner", 6367)]);
        let registry = SensorRegistry::build(&mut transport, &bindings, MeasureMode::default())
            .await
            .unwrap();

        let outer = registry.get("outer").unwrap();
        assert_eq!(outer.status(), SensorStatus::Bound);
        assert_eq!(outer.adapter().unwrap().id, a);

        let inner = registry.get("inner").unwrap();
        assert_eq!(inner.status(), SensorStatus::Unbound);
        assert_eq!(inner.adapter(), None);

        assert_eq!(registry.missing_count(), 1);
        assert_eq!(registry.bound_count(), 1);
        assert_eq!(registry.adapters().len(), 2);
    }

    #[tokio::test]
    async fn test_build_probes_every_adapter() {
        let mut transport = MockTransport::new();
        let a = transport.add_adapter(6873);
        transport.push_reset_and_identity(a, SHTC1_ID);

        let registry = SensorRegistry::build(&mut transport, &BindingTable::default(), MeasureMode::default())
            .await
            .unwrap();
        assert!(registry.is_empty());

        let written = transport.written(a);
        assert_eq!(written[0], encode_mode(true));
        assert_eq!(written[1], encode_write(CMD_SOFT_RESET));
        assert_eq!(written.len(), 4);
        assert_eq!(transport.pending_replies(a), 0);
    }

    #[tokio::test]
    async fn test_build_unknown_identity() {
        let mut transport = MockTransport::new();
        let a = transport.add_adapter(6873);
        transport.push_reset_and_identity(a, 0x0821);

        let registry = SensorRegistry::build(&mut transport, &table(&[("outer", 6873)]), MeasureMode::default())
            .await
            .unwrap();

        let outer = registry.get("outer").unwrap();
        assert_eq!(outer.status(), SensorStatus::IdentifiedUnknown(0x21));
        assert_eq!(outer.adapter(), None);
        assert!(registry.session("outer").is_none());
        assert_eq!(registry.missing_count(), 1);
    }

    #[tokio::test]
    async fn test_build_sensor_not_present() {
        let mut transport = MockTransport::new();
        let a = transport.add_adapter(6873);
        // Reset and READ_ID both rejected
        transport.push_write_nack(a);
        transport.push_write_nack(a);

        let registry = SensorRegistry::build(&mut transport, &table(&[("outer", 6873)]), MeasureMode::default())
            .await
            .unwrap();

        assert_eq!(registry.get("outer").unwrap().status(), SensorStatus::Disconnected);
        assert_eq!(registry.missing_count(), 1);
    }

    #[tokio::test]
    async fn test_build_identity_checksum_disconnects() {
        let mut transport = MockTransport::new();
        let a = transport.add_adapter(6873);
        let mut id_word = word_with_crc(SHTC1_ID);
        id_word[2] ^= 0x01;
        transport.push_command_ack(a);
        transport.push_command_ack(a);
        transport.push_read_data(a, &id_word);

        let registry = SensorRegistry::build(&mut transport, &table(&[("outer", 6873)]), MeasureMode::default())
            .await
            .unwrap();

        let outer = registry.get("outer").unwrap();
        assert_eq!(outer.status(), SensorStatus::Disconnected);
        assert_eq!(outer.adapter(), None);
        assert_eq!(registry.adapters().len(), 1);
        assert_eq!(transport.pending_replies(a), 0);
    }

    #[tokio::test]
    async fn test_build_identity_io_error_disconnects() {
        let mut transport = MockTransport::new();
        let a = transport.add_adapter(6873);
        transport.push_command_ack(a);
        transport.push_read_error(a, std::io::ErrorKind::BrokenPipe);

        let registry = SensorRegistry::build(&mut transport, &table(&[("outer", 6873)]), MeasureMode::default())
            .await
            .unwrap();

        assert_eq!(registry.get("outer").unwrap().status(), SensorStatus::Disconnected);
        assert_eq!(registry.bound_count(), 0);
    }

    #[tokio::test]
    async fn test_build_without_adapters_is_fatal() {
        let mut transport = MockTransport::new();
        let result = SensorRegistry::build(&mut transport, &table(&[("outer", 6873)]), MeasureMode::default()).await;
        assert!(matches!(result, Err(BridgeError::NoAdapters(_))));
    }

    #[tokio::test]
    async fn test_session_and_disconnect() {
        let mut transport = MockTransport::new();
        let a = transport.add_adapter(6873);
        transport.push_reset_and_identity(a, SHTC1_ID);

        let mut registry = SensorRegistry::build(&mut transport, &table(&[("outer", 6873)]), MeasureMode::Polling)
            .await
            .unwrap();

        let session = registry.session("outer").unwrap();
        assert_eq!(session.adapter().serial_number, 6873);

        assert!(registry.mark_disconnected("outer"));
        assert_eq!(registry.get("outer").unwrap().status(), SensorStatus::Disconnected);
        assert!(registry.session("outer").is_none());

        // Disconnected is terminal
        assert!(!registry.mark_disconnected("outer"));
        assert!(!registry.mark_disconnected("nobody"));
    }

    #[test]
    fn test_status_display() {
        assert!(SensorStatus::IdentifiedUnknown(33).to_string().contains("33"));
        assert_eq!(SensorStatus::Unbound.to_string(), "USB stick not found");
    }
}
