//! Live gnuplot view of the record files
//!
//! Commands are written to a gnuplot process over its stdin. Rendering is
//! kept separate from the process so the command text can be checked
//! without gnuplot installed.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tracing::{info, warn};

use crate::config::PlotConfig;
use crate::error::{BridgeError, Result};

/// One plotted quantity: title, axis label, record column, y range
struct Panel {
    title: &'static str,
    ylabel: &'static str,
    column: u8,
    yrange: &'static str,
}

const PANELS: [Panel; 3] = [
    Panel {
        title: "Temperature",
        ylabel: "Temperature [°C]",
        column: 2,
        yrange: "[-40:100]",
    },
    Panel {
        title: "Relative Humidity",
        ylabel: "RH [%]",
        column: 3,
        yrange: "[0:100]",
    },
    Panel {
        title: "Dew Point",
        ylabel: "Dew point [°C]",
        column: 4,
        yrange: "[-40:100]",
    },
];

/// Quote text for a single-quoted gnuplot string, where `'` is written `''`
fn quoted(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Render a 3-row multiplot of every sensor's record file
///
/// `tail` limits each series to its last rows; `None` plots the full file.
pub fn render_multiplot(sources: &[(String, PathBuf)], tail: Option<usize>) -> String {
    let mut out = String::new();
    out.push_str("set multiplot layout 3,1 rowsfirst\n");

    for panel in &PANELS {
        out.push_str(&format!("set title '{}'\n", panel.title));
        out.push_str("set xlabel 'Time [s]'\n");
        out.push_str(&format!("set ylabel '{}'\n", panel.ylabel));
        out.push_str(&format!("set yrange {}\n", panel.yrange));

        let series: Vec<String> = sources
            .iter()
            .map(|(name, path)| {
                let source = match tail {
                    Some(n) => format!("< tail -n {} \"{}\"", n, path.display()),
                    None => path.display().to_string(),
                };
                format!(
                    "{} using 1:{} title {} with lines",
                    quoted(&source),
                    panel.column,
                    quoted(name)
                )
            })
            .collect();
        out.push_str(&format!("plot {}\n", series.join(", ")));
    }

    out.push_str("unset multiplot\n");
    out
}

/// Periodically refreshed plot window
pub struct LivePlot {
    sink: Box<dyn Write + Send>,
    child: Option<Child>,
    sources: Vec<(String, PathBuf)>,
    update_every_cycles: u64,
    points: usize,
    summary_on_exit: bool,
}

impl LivePlot {
    /// Start a gnuplot process
    pub fn spawn(config: &PlotConfig, sources: Vec<(String, PathBuf)>) -> Result<Self> {
        let mut child = Command::new("gnuplot")
            .arg("-persist")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| BridgeError::Records(format!("cannot start gnuplot: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Records("gnuplot stdin unavailable".to_string()))?;

        info!("Live plot started for {} sensors", sources.len());
        let mut plot = Self::with_writer(config, sources, Box::new(stdin));
        plot.child = Some(child);
        Ok(plot)
    }

    /// Plot into an arbitrary command sink
    pub fn with_writer(
        config: &PlotConfig,
        sources: Vec<(String, PathBuf)>,
        sink: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            sink,
            child: None,
            sources,
            update_every_cycles: u64::from(config.update_every_cycles.max(1)),
            points: config.points,
            summary_on_exit: config.summary_on_exit,
        }
    }

    /// Redraw if `cycle` is a refresh cycle
    pub fn on_cycle(&mut self, cycle: u64) -> Result<()> {
        if cycle % self.update_every_cycles != 0 {
            return Ok(());
        }
        let commands = render_multiplot(&self.sources, Some(self.points));
        self.send(&commands)
    }

    /// Draw the full-history summary (if enabled) and close gnuplot
    pub fn finish(&mut self) -> Result<()> {
        if self.summary_on_exit {
            let mut commands = String::from("set title 'All measured points'\n");
            commands.push_str(&render_multiplot(&self.sources, None));
            self.send(&commands)?;
        }

        if let Some(mut child) = self.child.take() {
            // Dropping stdin ends gnuplot; `-persist` keeps the last window open
            self.sink = Box::new(std::io::sink());
            if let Err(e) = child.wait() {
                warn!("gnuplot did not exit cleanly: {}", e);
            }
        }
        Ok(())
    }

    fn send(&mut self, commands: &str) -> Result<()> {
        self.sink.write_all(commands.as_bytes())?;
        self.sink.flush()?;
        Ok(())
    }
}
