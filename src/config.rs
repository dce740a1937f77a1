//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! The sensor binding table (which logical sensor sits behind which bridge)
//! lives in its own text file, see [`crate::registry::binding`].

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::i2c::protocol::MeasureMode;

/// Hardware-mandated minimum pause between measurement cycles
pub const MIN_SETTLE_MS: u64 = 200;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub records: RecordsConfig,
    #[serde(default)]
    pub plot: PlotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bridge discovery configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,

    #[serde(default = "default_product_ids")]
    pub product_ids: Vec<u16>,

    #[serde(default = "default_special_interface")]
    pub special_interface: u8,

    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: String,

    #[serde(default = "default_dev_root")]
    pub dev_root: String,
}

/// Sensor binding table location
#[derive(Debug, Deserialize, Clone)]
pub struct SensorsConfig {
    #[serde(default = "default_bindings_path")]
    pub bindings_path: String,
}

/// Measurement command variant as written in the config file
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MeasureModeSetting {
    #[default]
    ClockStretching,
    Polling,
}

impl From<MeasureModeSetting> for MeasureMode {
    fn from(setting: MeasureModeSetting) -> Self {
        match setting {
            MeasureModeSetting::ClockStretching => MeasureMode::ClockStretching,
            MeasureModeSetting::Polling => MeasureMode::Polling,
        }
    }
}

/// Polling loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    #[serde(default)]
    pub measure_mode: MeasureModeSetting,
}

/// Output format of the measurement records
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// `time temperature humidity dew_point` columns
    #[default]
    Text,
    /// One JSON object per sensor per cycle
    Jsonl,
}

/// Measurement record configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RecordsConfig {
    #[serde(default = "default_records_enabled")]
    pub enabled: bool,

    #[serde(default = "default_records_dir")]
    pub dir: String,

    #[serde(default)]
    pub format: RecordFormat,
}

/// Live plot configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PlotConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_update_every_cycles")]
    pub update_every_cycles: u32,

    #[serde(default = "default_plot_points")]
    pub points: usize,

    #[serde(default = "default_summary_on_exit")]
    pub summary_on_exit: bool,
}

/// Diagnostic log configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for a daily-rolling copy of the log; empty means console only
    #[serde(default)]
    pub dir: String,
}

// Default value functions
fn default_vendor_id() -> u16 { 0x07C0 }
fn default_product_ids() -> Vec<u16> { vec![0x1501, 0x1500] }
fn default_special_interface() -> u8 { 1 }
fn default_sysfs_root() -> String { "/sys/class/hidraw".to_string() }
fn default_dev_root() -> String { "/dev".to_string() }

fn default_bindings_path() -> String { "configuration".to_string() }

fn default_settle_ms() -> u64 { MIN_SETTLE_MS }
fn default_delay_ms() -> u64 { 250 }
fn default_retry_limit() -> u32 { 5 }

fn default_records_enabled() -> bool { true }
fn default_records_dir() -> String { "records".to_string() }

fn default_update_every_cycles() -> u32 { 4 }
fn default_plot_points() -> usize { 100 }
fn default_summary_on_exit() -> bool { true }

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            vendor_id: default_vendor_id(),
            product_ids: default_product_ids(),
            special_interface: default_special_interface(),
            sysfs_root: default_sysfs_root(),
            dev_root: default_dev_root(),
        }
    }
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self { bindings_path: default_bindings_path() }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            delay_ms: default_delay_ms(),
            retry_limit: default_retry_limit(),
            measure_mode: MeasureModeSetting::default(),
        }
    }
}

impl PollingConfig {
    /// Pause between two cycles: settle time plus the configured delay
    #[must_use]
    pub fn cycle_pause(&self) -> Duration {
        Duration::from_millis(self.settle_ms + self.delay_ms)
    }
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            enabled: default_records_enabled(),
            dir: default_records_dir(),
            format: RecordFormat::default(),
        }
    }
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            update_every_cycles: default_update_every_cycles(),
            points: default_plot_points(),
            summary_on_exit: default_summary_on_exit(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> BridgeError {
    BridgeError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use shtw1_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.transport.product_ids.is_empty() {
            return Err(invalid("transport product_ids cannot be empty"));
        }

        if self.transport.sysfs_root.is_empty() || self.transport.dev_root.is_empty() {
            return Err(invalid("transport sysfs_root and dev_root cannot be empty"));
        }

        if self.sensors.bindings_path.is_empty() {
            return Err(invalid("sensors bindings_path cannot be empty"));
        }

        if self.polling.settle_ms < MIN_SETTLE_MS || self.polling.settle_ms > 60000 {
            return Err(invalid(format!(
                "settle_ms must be between {} and 60000",
                MIN_SETTLE_MS
            )));
        }

        if self.polling.delay_ms > 60000 {
            return Err(invalid("delay_ms must be at most 60000"));
        }

        if self.polling.retry_limit == 0 || self.polling.retry_limit > 100 {
            return Err(invalid("retry_limit must be between 1 and 100"));
        }

        if self.records.enabled && self.records.dir.is_empty() {
            return Err(invalid("records dir cannot be empty when enabled"));
        }

        if self.plot.enabled {
            if !self.records.enabled || self.records.format != RecordFormat::Text {
                return Err(invalid("plot requires enabled records in 'text' format"));
            }

            if self.plot.update_every_cycles == 0 {
                return Err(invalid("update_every_cycles must be greater than 0"));
            }

            if self.plot.points < 2 {
                return Err(invalid("plot points must be at least 2"));
            }
        }

        Ok(())
    }
}
