//! # HID Transport Module
//!
//! Moves fixed-size special-mode reports between the host and IO-Warrior
//! USB-HID to I2C bridges.
//!
//! This module handles:
//! - The [`transport::Transport`] capability consumed by the sensor core
//! - Adapter identifiers and serial number parsing
//! - Discovery and report I/O over Linux hidraw nodes

pub mod transport;
pub mod hidraw;

pub use hidraw::HidrawTransport;
pub use transport::{AdapterHandle, AdapterId, Transport};
