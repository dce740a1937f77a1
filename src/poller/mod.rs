//! # Polling Module
//!
//! Drives every `Bound` sensor through repeated measurement cycles.
//!
//! ## Failure policy
//!
//! | Outcome | Report | Consecutive-failure counter |
//! |---------|--------|-----------------------------|
//! | Valid sample | `Sample` | reset to 0 |
//! | Humidity checksum error | `TemperatureOnly` | unchanged |
//! | Temperature checksum error | `NoValidSample` | unchanged |
//! | Link failure (NACK, I/O) | `LinkFailure` | +1 |
//! | Link failure reaching the retry limit | `Disconnected` | sensor leaves the loop |
//!
//! Checksum errors are treated as line noise, link failures as a dead
//! adapter. A disconnected sensor is never polled again during the run.
//!
//! ## Cancellation
//!
//! The shutdown signal is only looked at between cycles, so a transaction
//! is never cut in half.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::PollingConfig;
use crate::error::{ChecksumError, Result, SessionError};
use crate::hid::transport::Transport;
use crate::registry::SensorRegistry;
use crate::sensor::SensorSession;
use crate::telemetry::MeasurementSink;

/// Validated values from one sensor in one cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementSample {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub dew_point_c: Option<f32>,
    /// Time since the poller started
    pub sequence_time: Duration,
}

/// Outcome of one sensor in one cycle
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Sample(MeasurementSample),
    /// Humidity word was corrupted; temperature is valid
    TemperatureOnly {
        temperature_c: f32,
        sequence_time: Duration,
    },
    /// Temperature word was corrupted; nothing usable
    NoValidSample,
    /// Link failure below the retry limit
    LinkFailure {
        consecutive_failures: u32,
        error: String,
    },
    /// Link failure that reached the retry limit; last report for this sensor
    Disconnected { error: String },
}

impl Reading {
    /// Short machine-readable outcome name
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Reading::Sample(_) => "ok",
            Reading::TemperatureOnly { .. } => "temperature_only",
            Reading::NoValidSample => "no_valid_sample",
            Reading::LinkFailure { .. } => "link_failure",
            Reading::Disconnected { .. } => "disconnected",
        }
    }
}

/// One record for the measurement sink
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReport {
    pub cycle: u64,
    pub sensor: String,
    pub serial_number: u32,
    pub reading: Reading,
}

/// Poller timing and retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    /// Consecutive link failures after which a sensor is disconnected
    pub retry_limit: u32,
    /// Pause between the end of one cycle and the start of the next
    pub cycle_pause: Duration,
}

impl From<&PollingConfig> for PollerSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            retry_limit: config.retry_limit,
            cycle_pause: config.cycle_pause(),
        }
    }
}

/// Round-robin polling coordinator
///
/// Owns the transport, so every adapter exchange goes through this single
/// task and no two requests to one adapter can overlap.
pub struct Poller<T: Transport> {
    transport: T,
    registry: SensorRegistry,
    settings: PollerSettings,
    failures: HashMap<String, u32>,
    cycle: u64,
    started: Instant,
}

impl<T: Transport> Poller<T> {
    pub fn new(transport: T, registry: SensorRegistry, settings: PollerSettings) -> Self {
        Self {
            transport,
            registry,
            settings,
            failures: HashMap::new(),
            cycle: 0,
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    /// Number of cycles run so far
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    /// Consecutive link failures of a sensor
    #[must_use]
    pub fn consecutive_failures(&self, name: &str) -> u32 {
        self.failures.get(name).copied().unwrap_or(0)
    }

    /// Run one measurement on every `Bound` sensor
    ///
    /// Returns one report per sensor polled, in registry order.
    pub async fn run_cycle(&mut self) -> Vec<SensorReport> {
        self.cycle += 1;
        let cycle = self.cycle;

        let targets: Vec<(String, SensorSession)> = self
            .registry
            .iter()
            .filter(|s| s.is_bound())
            .filter_map(|s| {
                self.registry
                    .session(s.name())
                    .map(|session| (s.name().to_string(), session))
            })
            .collect();

        let mut reports = Vec::with_capacity(targets.len());

        for (name, session) in targets {
            let outcome = session.measure(&mut self.transport).await;
            let serial_number = session.adapter().serial_number;
            let reading = self.classify(cycle, &name, serial_number, outcome);

            reports.push(SensorReport {
                cycle,
                sensor: name,
                serial_number,
                reading,
            });
        }

        reports
    }

    fn classify(
        &mut self,
        cycle: u64,
        name: &str,
        serial_number: u32,
        outcome: std::result::Result<crate::sensor::Measurement, SessionError>,
    ) -> Reading {
        let sequence_time = self.started.elapsed();

        match outcome {
            Ok(m) => {
                self.failures.insert(name.to_string(), 0);
                info!(
                    "T: {:.2}[°C], RH: {:.2}[%], DewP: {}[°C] <--- {}",
                    m.temperature_c,
                    m.humidity_pct,
                    m.dew_point_c.map_or_else(|| "n/a".to_string(), |d| format!("{:.2}", d)),
                    name
                );
                Reading::Sample(MeasurementSample {
                    temperature_c: m.temperature_c,
                    humidity_pct: m.humidity_pct,
                    dew_point_c: m.dew_point_c,
                    sequence_time,
                })
            }
            Err(SessionError::Checksum(ChecksumError::Humidity { temperature_c })) => {
                warn!(
                    "Cycle {}: '{}' (S/N {}): checksum error only for humidity measurement",
                    cycle, name, serial_number
                );
                Reading::TemperatureOnly {
                    temperature_c,
                    sequence_time,
                }
            }
            Err(SessionError::Checksum(e)) => {
                warn!(
                    "Cycle {}: '{}' (S/N {}): {}, sample dropped",
                    cycle, name, serial_number, e
                );
                Reading::NoValidSample
            }
            Err(SessionError::Link(e)) => {
                let count = self.failures.entry(name.to_string()).or_insert(0);
                *count += 1;
                let consecutive_failures = *count;

                if consecutive_failures >= self.settings.retry_limit {
                    self.registry.mark_disconnected(name);
                    error!(
                        "Cycle {}: '{}' (S/N {}): disconnected after {} failed trials of I2C communication: {}",
                        cycle, name, serial_number, consecutive_failures, e
                    );
                    Reading::Disconnected {
                        error: e.to_string(),
                    }
                } else {
                    warn!(
                        "Cycle {}: '{}' (S/N {}): I2C operation error ({}/{}): {}",
                        cycle, name, serial_number, consecutive_failures, self.settings.retry_limit, e
                    );
                    Reading::LinkFailure {
                        consecutive_failures,
                        error: e.to_string(),
                    }
                }
            }
        }
    }

    /// Poll until `shutdown` turns true or no sensor is left
    ///
    /// Each cycle's reports go to `sink`, followed by `end_cycle`. The
    /// current cycle always completes before shutdown is honoured; the sink
    /// is finished before returning.
    ///
    /// # Returns
    ///
    /// Number of cycles run.
    pub async fn run<S: MeasurementSink>(
        &mut self,
        sink: &mut S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<u64> {
        info!(
            "Polling {} sensors every {} ms",
            self.registry.bound_count(),
            self.settings.cycle_pause.as_millis()
        );

        loop {
            let reports = self.run_cycle().await;

            for report in &reports {
                if let Err(e) = sink.record(report) {
                    warn!("Cycle {}: failed to record '{}': {}", report.cycle, report.sensor, e);
                }
            }
            if let Err(e) = sink.end_cycle(self.cycle) {
                warn!("Cycle {}: failed to flush records: {}", self.cycle, e);
            }

            if self.registry.bound_count() == 0 {
                warn!("No sensor left to poll, stopping");
                break;
            }

            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.cycle_pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped, stopping");
                        break;
                    }
                }
            }

            if *shutdown.borrow() {
                break;
            }
        }

        info!("Stopped after {} cycles", self.cycle);
        sink.finish()?;
        Ok(self.cycle)
    }

    /// Switch I2C mode off on every adapter seen at startup
    pub async fn shutdown(&mut self) {
        let mode = self.registry.measure_mode();
        for &adapter in self.registry.adapters() {
            let session = SensorSession::new(adapter, mode);
            if let Err(e) = session.disable_i2c(&mut self.transport).await {
                warn!("S/N {}: disabling I2C failed: {}", adapter.serial_number, e);
            }
        }
    }
}
