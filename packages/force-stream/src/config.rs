// Experiment configuration
//
// Stored as JSON. Every field has a default, so a config file only needs the
// values that differ (typically the port and the run time).

use crate::buffer::RetentionPolicy;
use crate::sink::DisplayConfig;
use crate::source::SourceConfig;
use crate::types::{StreamError, StreamResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SAMPLING_INTERVAL_MS: u64 = 100;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1;
pub const DEFAULT_MAX_LINES_PER_TICK: usize = 1024;
pub const DEFAULT_OUTPUT_DIR: &str = "pressure-ms";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Stop automatically after this many seconds; `None` runs until stopped
    pub run_time_seconds: Option<f64>,

    /// Tick cadence of the acquisition loop
    pub sampling_interval_ms: u64,

    /// Retain only the most recent N samples; `None` keeps everything until flush
    pub window_size: Option<usize>,

    pub source: SourceConfig,

    /// Longest a single read may wait for a line
    pub read_timeout_ms: u64,

    /// Upper bound on lines drained in one tick
    pub max_lines_per_tick: usize,

    /// Directory for CSV and graph exports
    pub output_dir: PathBuf,

    /// SQLite file for per-sample rows; `None` disables the relational sink
    pub database_path: Option<PathBuf>,

    pub display: DisplayConfig,

    pub export_csv: bool,

    pub export_snapshot: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            run_time_seconds: None,
            sampling_interval_ms: DEFAULT_SAMPLING_INTERVAL_MS,
            window_size: None,
            source: SourceConfig::default(),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            max_lines_per_tick: DEFAULT_MAX_LINES_PER_TICK,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            database_path: None,
            display: DisplayConfig::default(),
            export_csv: true,
            export_snapshot: true,
        }
    }
}

impl ExperimentConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ExperimentConfig = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn validate(&self) -> StreamResult<()> {
        if self.sampling_interval_ms == 0 {
            return Err(StreamError::InvalidConfig(
                "sampling_interval_ms must be greater than zero".to_string(),
            ));
        }

        if let Some(seconds) = self.run_time_seconds {
            if !seconds.is_finite()
                || seconds <= 0.0
                || Duration::try_from_secs_f64(seconds).is_err()
            {
                return Err(StreamError::InvalidConfig(format!(
                    "run_time_seconds must be a positive number of seconds, got {}",
                    seconds
                )));
            }
        }

        if self.window_size == Some(0) {
            return Err(StreamError::InvalidConfig(
                "window_size must be at least 1 (omit it to keep every sample)".to_string(),
            ));
        }

        if self.max_lines_per_tick == 0 {
            return Err(StreamError::InvalidConfig(
                "max_lines_per_tick must be greater than zero".to_string(),
            ));
        }

        if let Some(trailing) = self.display.trailing_seconds {
            if !trailing.is_finite() || trailing <= 0.0 {
                return Err(StreamError::InvalidConfig(format!(
                    "display.trailing_seconds must be positive, got {}",
                    trailing
                )));
            }
        }

        match &self.source {
            SourceConfig::SerialPort {
                port, baud_rate, ..
            } => {
                if port.trim().is_empty() {
                    return Err(StreamError::InvalidConfig(
                        "serial port name is empty".to_string(),
                    ));
                }
                if *baud_rate == 0 {
                    return Err(StreamError::InvalidConfig(
                        "baud_rate must be greater than zero".to_string(),
                    ));
                }
            }
            SourceConfig::TcpSocket { address } => {
                if address.trim().is_empty() {
                    return Err(StreamError::InvalidConfig(
                        "tcp address is empty".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.run_time_seconds
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::from_window_size(self.window_size)
    }
}
