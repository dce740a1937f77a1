//! # SHTW1 Bridge
//!
//! Read SHTW1/SHTC1 humidity sensors attached to IO-Warrior USB sticks.
//!
//! Every configured logical sensor is bound to a stick by serial number,
//! then all bound sensors are polled in turn until Ctrl+C.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging (console, plus a daily file when `logging.dir` is set)
//!    - Load configuration and the sensor binding table
//!    - Open every IO-Warrior special-mode interface
//!    - Probe each stick and bind sensors by serial number
//!
//! 2. **Main Loop**
//!    - Measure every bound sensor once per cycle
//!    - Write records, refresh the plot
//!    - Disconnect sensors that keep failing
//!
//! 3. **Graceful Shutdown**
//!    - Finish the running cycle
//!    - Flush records, draw the summary plot
//!    - Switch I2C mode off on every stick
//!
//! # Examples
//!
//! ```bash
//! shtw1-bridge config/default.toml
//! ```

use anyhow::{Context, Result};
use std::path::Path;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use shtw1_bridge::config::Config;
use shtw1_bridge::hid::HidrawTransport;
use shtw1_bridge::poller::{Poller, PollerSettings};
use shtw1_bridge::registry::binding::BindingTable;
use shtw1_bridge::registry::SensorRegistry;
use shtw1_bridge::telemetry::Telemetry;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix of the rolling diagnostic log
const LOG_FILE_PREFIX: &str = "shtw1-bridge.log";

/// Set up console logging and, if configured, a daily-rolling log file
///
/// The returned guard must live until exit or buffered file lines are lost.
fn init_logging(log_dir: &str) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = if log_dir.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Configuration from the first argument, the default file, or built-in defaults
fn load_config() -> Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path)),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("loading {}", DEFAULT_CONFIG_PATH)),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    let _log_guard = init_logging(&config.logging.dir);

    info!("SHTW1 Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let (bindings, issues) = BindingTable::load(&config.sensors.bindings_path)
        .with_context(|| format!("reading sensor bindings from {}", config.sensors.bindings_path))?;
    for issue in &issues {
        warn!("{}", issue);
    }
    info!("{} sensors configured", bindings.len());

    let mut transport = HidrawTransport::open(&config.transport)?;

    let registry =
        SensorRegistry::build(&mut transport, &bindings, config.polling.measure_mode.into()).await?;
    registry.log_summary();

    if registry.bound_count() == 0 {
        warn!("No sensor is bound, nothing to poll");
        return Ok(());
    }

    let sensors: Vec<(&str, u32)> = registry
        .iter()
        .filter(|s| s.is_bound())
        .map(|s| (s.name(), s.serial_number()))
        .collect();
    let mut telemetry = Telemetry::new(&config, &sensors)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, finishing current cycle...");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut poller = Poller::new(transport, registry, PollerSettings::from(&config.polling));
    info!("Press Ctrl+C to exit");

    let result = poller.run(&mut telemetry, shutdown_rx).await;
    poller.shutdown().await;

    let cycles = result?;
    info!("Total cycles: {}", cycles);
    Ok(())
}
