// Common types for the acquisition pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for pipeline operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur while acquiring samples
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sample buffer is closed; the experiment has already stopped")]
    BufferClosed,

    #[error("Experiment already running")]
    AlreadyRunning,

    #[error("Experiment already stopped")]
    AlreadyStopped,

    #[error("Experiment has not been started")]
    NotRunning,

    #[error("Line source not open: {0}")]
    NotOpen(String),
}

impl StreamError {
    /// True for errors raised while opening the byte-stream endpoint.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            StreamError::Connection(_) | StreamError::Serial(_) | StreamError::Io(_)
        )
    }
}

/// Why a raw line did not yield a sample. Both kinds are skipped, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,

    #[error("malformed reading: {0:?}")]
    Malformed(String),
}

/// One timestamped force reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the experiment epoch
    pub elapsed_seconds: f64,

    /// Sensor value in sensor units (N for the FSR406 rig)
    pub value: f64,
}

impl Sample {
    pub fn new(elapsed_seconds: f64, value: f64) -> Self {
        Self {
            elapsed_seconds,
            value,
        }
    }
}

/// What ended a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Configured run time elapsed
    Deadline,

    /// External close signal (display closed, Ctrl+C, stop handle)
    Manual,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Deadline => write!(f, "run time elapsed"),
            StopReason::Manual => write!(f, "stopped manually"),
        }
    }
}

/// Current state of an experiment run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum RunState {
    /// Created, source not opened yet
    #[default]
    Idle,

    /// Epoch recorded, sampling
    Running { started_at: String },

    /// Terminal; reached exactly once
    Stopped { reason: StopReason },
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running { .. })
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, RunState::Stopped { .. })
    }
}

/// Counters collected over one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub ticks: u64,
    pub lines_read: u64,
    pub samples_accepted: u64,
    pub empty_lines: u64,
    pub malformed_lines: u64,
    pub rejected_after_stop: u64,
    pub sink_write_failures: u64,
    pub source_errors: u64,
}
