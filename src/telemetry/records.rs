//! Per-sensor measurement record files
//!
//! Every sensor gets one append-only file named after the start time of the
//! run and the sensor name, e.g. `2024_Mar_05_14_03_22_outer`.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::RecordFormat;
use crate::error::{BridgeError, Result};
use crate::poller::{Reading, SensorReport};

/// Header line of text record files
pub const TEXT_HEADER: &str = "time temperature humidity dew_point";

/// `strftime` pattern of the record file name prefix
pub const FILE_TIME_FORMAT: &str = "%Y_%b_%d_%H_%M_%S";

/// Record file name for a sensor
///
/// Characters that are awkward in file names are replaced with `_`.
///
/// # Examples
///
/// ```
/// use chrono::{Local, TimeZone};
/// use shtw1_bridge::telemetry::records::record_file_name;
///
/// let started = Local.with_ymd_and_hms(2024, 3, 5, 14, 3, 22).unwrap();
/// assert_eq!(record_file_name(&started, "outer wall"), "2024_Mar_05_14_03_22_outer_wall");
/// ```
pub fn record_file_name(started: &DateTime<Local>, sensor: &str) -> String {
    let safe: String = sensor
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", started.format(FILE_TIME_FORMAT), safe)
}

fn format_value(value: Option<f32>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.2}", v),
        _ => "NaN".to_string(),
    }
}

/// Text row for a report; `None` for outcomes without a valid temperature
pub fn text_row(report: &SensorReport) -> Option<String> {
    match &report.reading {
        Reading::Sample(s) => Some(format!(
            "{:.2} {} {} {}",
            s.sequence_time.as_secs_f64(),
            format_value(Some(s.temperature_c)),
            format_value(Some(s.humidity_pct)),
            format_value(s.dew_point_c)
        )),
        Reading::TemperatureOnly {
            temperature_c,
            sequence_time,
        } => Some(format!(
            "{:.2} {} NaN NaN",
            sequence_time.as_secs_f64(),
            format_value(Some(*temperature_c))
        )),
        _ => None,
    }
}

/// JSON form of one report
#[derive(Debug, Serialize)]
pub struct JsonRecord<'a> {
    pub timestamp: String,
    pub cycle: u64,
    pub sensor: &'a str,
    pub serial_number: u32,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dew_point_c: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consecutive_failures: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

impl<'a> JsonRecord<'a> {
    pub fn new(report: &'a SensorReport, timestamp: DateTime<Local>) -> Self {
        let mut record = Self {
            timestamp: timestamp.to_rfc3339(),
            cycle: report.cycle,
            sensor: &report.sensor,
            serial_number: report.serial_number,
            status: report.reading.status(),
            time_s: None,
            temperature_c: None,
            humidity_pct: None,
            dew_point_c: None,
            consecutive_failures: None,
            error: None,
        };

        match &report.reading {
            Reading::Sample(s) => {
                record.time_s = Some(s.sequence_time.as_secs_f64());
                record.temperature_c = Some(s.temperature_c);
                record.humidity_pct = Some(s.humidity_pct);
                record.dew_point_c = s.dew_point_c;
            }
            Reading::TemperatureOnly {
                temperature_c,
                sequence_time,
            } => {
                record.time_s = Some(sequence_time.as_secs_f64());
                record.temperature_c = Some(*temperature_c);
            }
            Reading::NoValidSample => {}
            Reading::LinkFailure {
                consecutive_failures,
                error,
            } => {
                record.consecutive_failures = Some(*consecutive_failures);
                record.error = Some(error);
            }
            Reading::Disconnected { error } => {
                record.error = Some(error);
            }
        }

        record
    }
}

struct RecordFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Writer for all sensors' record files
pub struct RecordWriter {
    format: RecordFormat,
    files: HashMap<String, RecordFile>,
}

impl RecordWriter {
    /// Open one append-only record file per `(name, serial number)` under `dir`
    ///
    /// The directory is created if missing. Existing files are appended to;
    /// text files get the header line only when they start out empty. Two
    /// names that sanitize to the same file name are told apart by the
    /// serial number.
    pub fn create<P: AsRef<Path>>(
        dir: P,
        format: RecordFormat,
        started: &DateTime<Local>,
        sensors: &[(&str, u32)],
    ) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            BridgeError::Records(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let mut files = HashMap::new();
        let mut taken = HashSet::new();
        for &(sensor, serial_number) in sensors {
            let mut name = record_file_name(started, sensor);
            if !taken.insert(name.clone()) {
                name = format!("{}_{}", name, serial_number);
                if !taken.insert(name.clone()) {
                    return Err(BridgeError::Records(format!(
                        "record file name {} is used by more than one sensor",
                        name
                    )));
                }
            }
            if format == RecordFormat::Jsonl {
                name.push_str(".jsonl");
            }

            let path = dir.join(name);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| {
                    BridgeError::Records(format!("cannot open {}: {}", path.display(), e))
                })?;
            let is_new = file.metadata()?.len() == 0;

            let mut writer = BufWriter::new(file);
            if format == RecordFormat::Text && is_new {
                writeln!(writer, "{}", TEXT_HEADER)?;
            }
            info!("Recording '{}' to {}", sensor, path.display());
            files.insert(sensor.to_string(), RecordFile { path, writer });
        }

        Ok(Self { format, files })
    }

    /// Path of a sensor's record file
    pub fn path(&self, sensor: &str) -> Option<&Path> {
        self.files.get(sensor).map(|f| f.path.as_path())
    }

    /// Append one report to its sensor's file
    pub fn write(&mut self, report: &SensorReport) -> Result<()> {
        let Some(file) = self.files.get_mut(&report.sensor) else {
            debug!("No record file for '{}'", report.sensor);
            return Ok(());
        };

        match self.format {
            RecordFormat::Text => {
                if let Some(row) = text_row(report) {
                    writeln!(file.writer, "{}", row)?;
                }
            }
            RecordFormat::Jsonl => {
                let record = JsonRecord::new(report, Local::now());
                let line = serde_json::to_string(&record)
                    .map_err(|e| BridgeError::Records(e.to_string()))?;
                writeln!(file.writer, "{}", line)?;
            }
        }
        Ok(())
    }

    /// Flush every file
    pub fn flush(&mut self) -> Result<()> {
        for file in self.files.values_mut() {
            file.writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::MeasurementSample;
    use chrono::TimeZone;
    use std::time::Duration;
    use tempfile::TempDir;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 14, 3, 22).unwrap()
    }

    fn report(sensor: &str, reading: Reading) -> SensorReport {
        SensorReport {
            cycle: 1,
            sensor: sensor.to_string(),
            serial_number: 6873,
            reading,
        }
    }

    fn sample() -> Reading {
        Reading::Sample(MeasurementSample {
            temperature_c: 25.0,
            humidity_pct: 50.0,
            dew_point_c: Some(13.85),
            sequence_time: Duration::from_millis(1500),
        })
    }

    #[test]
    fn test_file_name_sanitizes_sensor() {
        assert_eq!(record_file_name(&started(), "a/b c"), "2024_Mar_05_14_03_22_a_b_c");
    }

    #[test]
    fn test_text_rows() {
        assert_eq!(text_row(&report("outer", sample())).unwrap(), "1.50 25.00 50.00 13.85");

        let t_only = Reading::TemperatureOnly {
            temperature_c: 21.5,
            sequence_time: Duration::from_secs(3),
        };
        assert_eq!(text_row(&report("outer", t_only)).unwrap(), "3.00 21.50 NaN NaN");

        assert!(text_row(&report("outer", Reading::NoValidSample)).is_none());
    }

    #[test]
    fn test_missing_dew_point_written_as_nan() {
        let reading = Reading::Sample(MeasurementSample {
            temperature_c: 25.0,
            humidity_pct: 0.0,
            dew_point_c: None,
            sequence_time: Duration::from_secs(1),
        });
        assert!(text_row(&report("outer", reading)).unwrap().ends_with(" NaN"));
    }

    #[test]
    fn test_text_file_contents() {
        let dir = TempDir::new().unwrap();
        let mut writer =
            RecordWriter::create(dir.path(), RecordFormat::Text, &started(), &[("outer", 6873), ("inner", 6181)]).unwrap();

        writer.write(&report("outer", sample())).unwrap();
        writer
            .write(&report(
                "outer",
                Reading::LinkFailure {
                    consecutive_failures: 1,
                    error: "nack".to_string(),
                },
            ))
            .unwrap();
        writer.flush().unwrap();

        let outer = fs::read_to_string(writer.path("outer").unwrap()).unwrap();
        assert_eq!(outer, "time temperature humidity dew_point\n1.50 25.00 50.00 13.85\n");

        let inner = fs::read_to_string(writer.path("inner").unwrap()).unwrap();
        assert_eq!(inner, "time temperature humidity dew_point\n");
        assert!(writer.path("inner").unwrap().ends_with("2024_Mar_05_14_03_22_inner"));
    }

    #[test]
    fn test_jsonl_includes_failures() {
        let dir = TempDir::new().unwrap();
        let mut writer =
            RecordWriter::create(dir.path(), RecordFormat::Jsonl, &started(), &[("outer", 6873)]).unwrap();

        writer.write(&report("outer", sample())).unwrap();
        writer
            .write(&report(
                "outer",
                Reading::Disconnected {
                    error: "gone".to_string(),
                },
            ))
            .unwrap();
        writer.flush().unwrap();

        let contents = fs::read_to_string(writer.path("outer").unwrap()).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["status"], "ok");
        assert_eq!(lines[0]["serial_number"], 6873);
        assert!((lines[0]["temperature_c"].as_f64().unwrap() - 25.0).abs() < 1e-6);
        assert_eq!(lines[1]["status"], "disconnected");
        assert_eq!(lines[1]["error"], "gone");
        assert!(lines[1].get("temperature_c").is_none());
    }

    #[test]
    fn test_reopening_appends_without_second_header() {
        let dir = TempDir::new().unwrap();

        let mut first =
            RecordWriter::create(dir.path(), RecordFormat::Text, &started(), &[("outer", 6873)]).unwrap();
        for _ in 0..3 {
            first.write(&report("outer", sample())).unwrap();
        }
        first.flush().unwrap();
        let path = first.path("outer").unwrap().to_path_buf();
        drop(first);

        let mut second =
            RecordWriter::create(dir.path(), RecordFormat::Text, &started(), &[("outer", 6873)]).unwrap();
        second.write(&report("outer", sample())).unwrap();
        second.flush().unwrap();

        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 5);
        assert_eq!(contents.matches(TEXT_HEADER).count(), 1);
    }

    #[test]
    fn test_colliding_names_get_separate_files() {
        let dir = TempDir::new().unwrap();
        let mut writer = RecordWriter::create(
            dir.path(),
            RecordFormat::Text,
            &started(),
            &[("a b", 6873), ("a_b", 6181)],
        )
        .unwrap();

        let spaced = writer.path("a b").unwrap().to_path_buf();
        let underscored = writer.path("a_b").unwrap().to_path_buf();
        assert_ne!(spaced, underscored);
        assert!(underscored.ends_with("2024_Mar_05_14_03_22_a_b_6181"));

        writer.write(&report("a b", sample())).unwrap();
        writer.flush().unwrap();
        assert_eq!(fs::read_to_string(spaced).unwrap().lines().count(), 2);
        assert_eq!(fs::read_to_string(underscored).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_unknown_sensor_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut writer = RecordWriter::create(dir.path(), RecordFormat::Text, &started(), &[]).unwrap();
        assert!(writer.write(&report("ghost", sample())).is_ok());
    }
}
