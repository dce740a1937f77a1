//! # Telemetry Module
//!
//! Destinations for the reports produced by the poller.
//!
//! This module handles:
//! - Writing per-sensor record files (text columns or JSON Lines)
//! - Refreshing an optional gnuplot window from those files
//! - Flushing after every cycle so records survive an abrupt stop

pub mod plot;
pub mod records;

use chrono::Local;
use std::path::PathBuf;
use tracing::warn;

use crate::config::Config;
use crate::error::Result;
use crate::poller::SensorReport;

use plot::LivePlot;
use records::RecordWriter;

/// Consumer of measurement reports
#[cfg_attr(test, mockall::automock)]
pub trait MeasurementSink {
    /// Accept one sensor's report
    fn record(&mut self, report: &SensorReport) -> Result<()>;

    /// Called once after every report of `cycle` was recorded
    fn end_cycle(&mut self, cycle: u64) -> Result<()>;

    /// Called once when polling stops
    fn finish(&mut self) -> Result<()>;
}

/// Record files plus optional live plot, as configured
pub struct Telemetry {
    records: Option<RecordWriter>,
    plot: Option<LivePlot>,
}

impl Telemetry {
    /// Open the configured outputs for the given `(name, serial number)` sensors
    ///
    /// A plot that cannot be started is logged and skipped.
    pub fn new(config: &Config, sensors: &[(&str, u32)]) -> Result<Self> {
        let started = Local::now();

        let records = if config.records.enabled {
            Some(RecordWriter::create(
                &config.records.dir,
                config.records.format,
                &started,
                sensors,
            )?)
        } else {
            None
        };

        let plot = match (&records, config.plot.enabled) {
            (Some(writer), true) => {
                let sources: Vec<(String, PathBuf)> = sensors
                    .iter()
                    .filter_map(|&(name, _)| {
                        writer
                            .path(name)
                            .map(|path| (name.to_string(), path.to_path_buf()))
                    })
                    .collect();
                match LivePlot::spawn(&config.plot, sources) {
                    Ok(plot) => Some(plot),
                    Err(e) => {
                        warn!("Live plot disabled: {}", e);
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(Self { records, plot })
    }

    /// Path of a sensor's record file, if records are enabled
    pub fn record_path(&self, sensor: &str) -> Option<PathBuf> {
        self.records
            .as_ref()
            .and_then(|r| r.path(sensor))
            .map(|p| p.to_path_buf())
    }
}

impl MeasurementSink for Telemetry {
    fn record(&mut self, report: &SensorReport) -> Result<()> {
        match self.records.as_mut() {
            Some(records) => records.write(report),
            None => Ok(()),
        }
    }

    fn end_cycle(&mut self, cycle: u64) -> Result<()> {
        if let Some(records) = self.records.as_mut() {
            records.flush()?;
        }

        if let Some(plot) = self.plot.as_mut() {
            if let Err(e) = plot.on_cycle(cycle) {
                warn!("Live plot stopped: {}", e);
                self.plot = None;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(records) = self.records.as_mut() {
            records.flush()?;
        }
        if let Some(mut plot) = self.plot.take() {
            plot.finish()?;
        }
        Ok(())
    }
}
