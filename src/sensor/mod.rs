//! # Sensor Module
//!
//! SHTW1/SHTC1 temperature and humidity sensor handling.
//!
//! This module handles:
//! - Converting raw sensor words to °C and %RH
//! - Deriving the dew point
//! - Per-adapter sessions: soft reset, identification, measurement

pub mod convert;
pub mod session;

pub use session::{Measurement, SensorIdentity, SensorSession};
