//! # Sensor Session
//!
//! Per-adapter operations on the SHTW1/SHTC1 behind one bridge: mode
//! switching, soft reset, identification and measurement.
//!
//! Each operation is one or more codec exchanges through the transport.
//! Sessions never retry; retry policy belongs to the poller.

use std::time::Duration;
use tracing::{debug, warn};

use super::convert;
use crate::error::{ChecksumError, LinkError, SessionError};
use crate::hid::transport::{AdapterHandle, Transport};
use crate::i2c::crc;
use crate::i2c::decoder::{decode_command_ack, decode_read};
use crate::i2c::encoder::{encode_mode, encode_read, encode_write};
use crate::i2c::protocol::*;

/// Longest conversion time of a normal-mode measurement (datasheet max 12.1 ms)
pub const POLLING_CONVERSION_WAIT: Duration = Duration::from_millis(15);

/// What answered on the adapter's I2C bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorIdentity {
    /// SHTW1/SHTC1 (product code 0b000111)
    Known,
    /// Some other device answered with this product code
    UnknownId(u8),
    /// Nothing acknowledged the identification request
    NotPresent,
}

/// One validated measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub raw_temperature: u16,
    pub raw_humidity: u16,
    pub temperature_c: f32,
    pub humidity_pct: f32,
    /// `None` when the dew point is undefined for these values
    pub dew_point_c: Option<f32>,
}

/// Session with the sensor behind one bridge adapter
#[derive(Debug, Clone, Copy)]
pub struct SensorSession {
    adapter: AdapterHandle,
    mode: MeasureMode,
}

impl SensorSession {
    #[must_use]
    pub fn new(adapter: AdapterHandle, mode: MeasureMode) -> Self {
        Self { adapter, mode }
    }

    #[must_use]
    pub fn adapter(&self) -> AdapterHandle {
        self.adapter
    }

    /// Switch the bridge into I2C special mode with pull-ups enabled
    pub async fn enable_i2c<T: Transport>(&self, transport: &mut T) -> Result<(), LinkError> {
        transport.write_report(self.adapter.id, &encode_mode(true)).await?;
        Ok(())
    }

    /// Leave I2C special mode
    pub async fn disable_i2c<T: Transport>(&self, transport: &mut T) -> Result<(), LinkError> {
        transport.write_report(self.adapter.id, &encode_mode(false)).await?;
        Ok(())
    }

    /// Send a 16-bit command and require a full 3-byte acknowledge
    async fn command<T: Transport>(&self, transport: &mut T, command: u16) -> Result<(), LinkError> {
        let reply = transport
            .exchange(self.adapter.id, &encode_write(command))
            .await?;
        decode_command_ack(&reply)
    }

    /// Issue an I2C read of `len` bytes and return the whole reply
    async fn read<T: Transport>(&self, transport: &mut T, len: u8) -> Result<Report, LinkError> {
        Ok(transport.exchange(self.adapter.id, &encode_read(len)).await?)
    }

    /// Soft-reset the sensor
    ///
    /// # Errors
    ///
    /// Any link failure, including a command acknowledged by fewer than 3 bytes.
    pub async fn soft_reset<T: Transport>(&self, transport: &mut T) -> Result<(), LinkError> {
        self.command(transport, CMD_SOFT_RESET).await
    }

    /// Read the identification register
    ///
    /// An acknowledge failure on either the command or the read means no
    /// sensor is there and yields [`SensorIdentity::NotPresent`].
    ///
    /// # Errors
    ///
    /// - [`ChecksumError::Identity`] when the identification word is corrupted
    /// - Host-side link failures (I/O, unexpected report)
    pub async fn identify<T: Transport>(&self, transport: &mut T) -> Result<SensorIdentity, SessionError> {
        match self.command(transport, CMD_READ_ID).await {
            Ok(()) => {}
            Err(e) if e.is_ack_failure() => {
                debug!("S/N {}: READ_ID not acknowledged: {}", self.adapter.serial_number, e);
                return Ok(SensorIdentity::NotPresent);
            }
            Err(e) => return Err(e.into()),
        }

        let reply = self.read(transport, ID_READ_LEN).await?;
        let data = match decode_read(&reply, ID_READ_LEN) {
            Ok(data) => data,
            Err(e) if e.is_ack_failure() => {
                debug!("S/N {}: identification read not acknowledged: {}", self.adapter.serial_number, e);
                return Ok(SensorIdentity::NotPresent);
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(mismatch) = crc::verify(&data[0..2], data[2]) {
            warn!("S/N {}: identity {}", self.adapter.serial_number, mismatch);
            return Err(ChecksumError::Identity.into());
        }

        let word = u16::from_be_bytes([data[0], data[1]]);
        let product_code = (word & PRODUCT_CODE_MASK) as u8;

        if product_code == SHTC1_PRODUCT_CODE {
            Ok(SensorIdentity::Known)
        } else {
            Ok(SensorIdentity::UnknownId(product_code))
        }
    }

    /// Perform one temperature + humidity measurement
    ///
    /// The temperature word is validated first. If it is corrupted the
    /// humidity word is not looked at. If only humidity is corrupted the
    /// error still carries the converted temperature.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Link`] on any acknowledge or transport failure
    /// - [`ChecksumError::Temperature`] / [`ChecksumError::Humidity`]
    pub async fn measure<T: Transport>(&self, transport: &mut T) -> Result<Measurement, SessionError> {
        self.command(transport, self.mode.command()).await?;

        if self.mode == MeasureMode::Polling {
            tokio::time::sleep(POLLING_CONVERSION_WAIT).await;
        }

        let reply = self.read(transport, MEASUREMENT_READ_LEN).await?;
        let data = decode_read(&reply, MEASUREMENT_READ_LEN)?;

        if let Err(mismatch) = crc::verify(&data[0..2], data[2]) {
            debug!("S/N {}: temperature {}", self.adapter.serial_number, mismatch);
            return Err(ChecksumError::Temperature.into());
        }
        let raw_temperature = u16::from_be_bytes([data[0], data[1]]);
        let temperature_c = convert::temperature(u32::from(raw_temperature));

        if let Err(mismatch) = crc::verify(&data[3..5], data[5]) {
            debug!("S/N {}: humidity {}", self.adapter.serial_number, mismatch);
            return Err(ChecksumError::Humidity { temperature_c }.into());
        }
        let raw_humidity = u16::from_be_bytes([data[3], data[4]]);
        let humidity_pct = convert::humidity(u32::from(raw_humidity));

        Ok(Measurement {
            raw_temperature,
            raw_humidity,
            temperature_c,
            humidity_pct,
            dew_point_c: convert::dew_point(temperature_c, humidity_pct),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::transport::mocks::{word_with_crc, MockTransport};
    use crate::hid::transport::AdapterId;
    use std::io;

    /// Identification word with the SHTC1 product code
    const SHTC1_ID: u16 = 0x0887;

    fn session(transport: &MockTransport, serial: u32) -> SensorSession {
        let id = transport.add_adapter(serial);
        SensorSession::new(
            AdapterHandle { id, serial_number: serial },
            MeasureMode::ClockStretching,
        )
    }

    #[tokio::test]
    async fn test_enable_and_disable_write_mode_reports() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);

        s.enable_i2c(&mut transport).await.unwrap();
        s.disable_i2c(&mut transport).await.unwrap();

        let written = transport.written(s.adapter().id);
        assert_eq!(written, vec![encode_mode(true), encode_mode(false)]);
        assert_eq!(transport.pending_replies(s.adapter().id), 0);
    }

    #[tokio::test]
    async fn test_soft_reset_requires_full_ack() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);
        let id = s.adapter().id;

        transport.push_command_ack(id);
        assert!(s.soft_reset(&mut transport).await.is_ok());
        assert_eq!(transport.written(id), vec![encode_write(CMD_SOFT_RESET)]);

        transport.push_reply(id, Report::with_payload(REPORT_ID_I2C_WRITE, &[0x02]));
        assert!(matches!(
            s.soft_reset(&mut transport).await,
            Err(LinkError::IncompleteTransfer { accepted: 2 })
        ));

        transport.push_write_nack(id);
        assert!(matches!(
            s.soft_reset(&mut transport).await,
            Err(LinkError::NotAcknowledged { .. })
        ));
    }

    #[tokio::test]
    async fn test_identify_known() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);
        transport.push_identity(s.adapter().id, SHTC1_ID);

        assert_eq!(s.identify(&mut transport).await.unwrap(), SensorIdentity::Known);
        assert_eq!(
            transport.written(s.adapter().id),
            vec![encode_write(CMD_READ_ID), encode_read(ID_READ_LEN)]
        );
    }

    #[tokio::test]
    async fn test_identify_unknown_product() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);
        transport.push_identity(s.adapter().id, 0x0821);

        assert_eq!(
            s.identify(&mut transport).await.unwrap(),
            SensorIdentity::UnknownId(0x21)
        );
    }

    #[tokio::test]
    async fn test_identify_not_present_on_nack() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);
        transport.push_write_nack(s.adapter().id);

        assert_eq!(s.identify(&mut transport).await.unwrap(), SensorIdentity::NotPresent);
        // No read after a rejected command
        assert_eq!(transport.written(s.adapter().id).len(), 1);
    }

    #[tokio::test]
    async fn test_identify_checksum_error() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);
        let id = s.adapter().id;
        let mut data = word_with_crc(SHTC1_ID);
        data[2] ^= 0x01;
        transport.push_command_ack(id);
        transport.push_read_data(id, &data);

        assert!(matches!(
            s.identify(&mut transport).await,
            Err(SessionError::Checksum(ChecksumError::Identity))
        ));
    }

    #[tokio::test]
    async fn test_identify_is_idempotent() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);
        transport.push_identity(s.adapter().id, SHTC1_ID);
        transport.push_identity(s.adapter().id, SHTC1_ID);

        let first = s.identify(&mut transport).await.unwrap();
        let second = s.identify(&mut transport).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_identify_transport_failure() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);
        transport.push_read_error(s.adapter().id, io::ErrorKind::BrokenPipe);

        assert!(matches!(
            s.identify(&mut transport).await,
            Err(SessionError::Link(LinkError::Io(_)))
        ));
    }

    #[tokio::test]
    async fn test_measure_success() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);
        let id = s.adapter().id;
        transport.push_measurement(id, 0x6666, 0x8000);

        let m = s.measure(&mut transport).await.unwrap();

        assert_eq!(m.raw_temperature, 0x6666);
        assert_eq!(m.raw_humidity, 0x8000);
        assert!((m.temperature_c - 25.0).abs() < 0.01);
        assert_eq!(m.humidity_pct, 50.0);
        let dp = m.dew_point_c.unwrap();
        assert!((dp - 13.85).abs() < 0.1);

        assert_eq!(
            transport.written(id),
            vec![
                encode_write(CMD_MEASURE_T_RH_CLOCK_STRETCHING),
                encode_read(MEASUREMENT_READ_LEN)
            ]
        );
    }

    #[tokio::test]
    async fn test_measure_zero_humidity_has_no_dew_point() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);
        transport.push_measurement(s.adapter().id, 0x6666, 0x0000);

        let m = s.measure(&mut transport).await.unwrap();
        assert_eq!(m.humidity_pct, 0.0);
        assert_eq!(m.dew_point_c, None);
    }

    #[tokio::test]
    async fn test_measure_temperature_checksum_skips_humidity() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);
        let id = s.adapter().id;

        // Temperature CRC broken, humidity bytes garbage as well
        let mut data = word_with_crc(0x6666).to_vec();
        data[2] ^= 0x40;
        data.extend_from_slice(&[0xDE, 0xAD, 0x00]);
        transport.push_command_ack(id);
        transport.push_read_data(id, &data);

        match s.measure(&mut transport).await {
            Err(SessionError::Checksum(ChecksumError::Temperature)) => {}
            other => panic!("Expected temperature checksum error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_measure_humidity_checksum_keeps_temperature() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);
        let id = s.adapter().id;

        let mut data = word_with_crc(0x6666).to_vec();
        let mut rh = word_with_crc(0x8000);
        rh[0] ^= 0x01;
        data.extend_from_slice(&rh);
        transport.push_command_ack(id);
        transport.push_read_data(id, &data);

        match s.measure(&mut transport).await {
            Err(SessionError::Checksum(ChecksumError::Humidity { temperature_c })) => {
                assert!((temperature_c - 25.0).abs() < 0.01);
            }
            other => panic!("Expected humidity checksum error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_measure_nack_on_command() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);
        transport.push_write_nack(s.adapter().id);

        assert!(matches!(
            s.measure(&mut transport).await,
            Err(SessionError::Link(LinkError::NotAcknowledged { .. }))
        ));
    }

    #[tokio::test]
    async fn test_measure_nack_on_read() {
        let mut transport = MockTransport::new();
        let s = session(&transport, 6873);
        let id = s.adapter().id;
        transport.push_command_ack(id);
        transport.push_reply(id, Report::with_payload(REPORT_ID_I2C_READ, &[0x80]));

        assert!(matches!(
            s.measure(&mut transport).await,
            Err(SessionError::Link(LinkError::NotAcknowledged { .. }))
        ));
    }

    #[tokio::test]
    async fn test_measure_polling_mode_uses_polling_command() {
        let mut transport = MockTransport::new();
        let id = transport.add_adapter(6181);
        let s = SensorSession::new(
            AdapterHandle { id, serial_number: 6181 },
            MeasureMode::Polling,
        );
        transport.push_measurement(id, 0x6666, 0x8000);

        assert!(s.measure(&mut transport).await.is_ok());
        assert_eq!(transport.written(id)[0], encode_write(CMD_MEASURE_T_RH_POLLING));
    }

    #[test]
    fn test_adapter_accessor() {
        let handle = AdapterHandle { id: AdapterId(3), serial_number: 6367 };
        let s = SensorSession::new(handle, MeasureMode::default());
        assert_eq!(s.adapter(), handle);
    }
}
