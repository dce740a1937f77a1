//! # SHTW1 Bridge Library
//!
//! Read Sensirion SHTW1/SHTC1 temperature and humidity sensors through
//! IO-Warrior USB-HID to I2C bridges.
//!
//! This library provides the I2C-over-HID transaction codec, CRC validation,
//! unit conversion, adapter-to-sensor binding and the polling loop that turns
//! it all into a stream of measurement records.

pub mod config;
pub mod error;
pub mod hid;
pub mod i2c;
pub mod poller;
pub mod registry;
pub mod sensor;
pub mod telemetry;
