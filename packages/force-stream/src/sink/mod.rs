// Sample sinks
//
// Every downstream consumer of samples implements `SampleSink` and is
// registered once, at startup, with the `SinkRouter`. Sinks that could not be
// set up (e.g., an unreachable store) are simply never registered.
//
// Data pipeline:
// Sample → SinkRouter → { LiveDisplaySink, CsvExportSink, SnapshotSink, SqliteSink }

use crate::types::Sample;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub mod csv_export;
pub mod display;
pub mod router;
pub mod snapshot;
pub mod sqlite;

pub use csv_export::CsvExportSink;
pub use display::{DisplayConfig, LiveDisplaySink, LiveView, ViewFrame};
pub use router::{SinkOutcome, SinkRouter};
pub use snapshot::SnapshotSink;
pub use sqlite::SqliteSink;

/// Result type alias for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors raised by individual sinks. Never fatal to the run.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Render error: {0}")]
    Render(#[from] std::fmt::Error),

    #[error("Sink {0} is closed")]
    Closed(String),

    #[error("Sink {0} was already flushed")]
    AlreadyFlushed(String),

    #[error("{0}")]
    Other(String),
}

/// Role of a sink in the pipeline; drives flush and shutdown ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Real-time view; excluded from the historical flush
    Display,

    /// File exports written from the full retained window at shutdown
    Durable,

    /// Row-per-sample relational store
    Relational,
}

/// Trait that all sinks must implement
///
/// Sinks only ever see copies of samples. They must not assume any ordering
/// relative to other sinks.
pub trait SampleSink: Send {
    /// Unique name used in logs and outcome reports
    fn name(&self) -> &str;

    fn kind(&self) -> SinkKind;

    /// Deliver one accepted sample
    fn write(&mut self, sample: &Sample) -> SinkResult<()>;

    /// Deliver the complete retained window, once, at shutdown
    fn flush(&mut self, samples: &[Sample]) -> SinkResult<()>;

    /// Release the sink's resources
    fn close(&mut self) -> SinkResult<()>;

    /// Files this sink has produced
    fn artifacts(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Wall-clock stamp shared by every artifact of one run, e.g. `2026-10-17_14-03-59`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStamp(String);

impl RunStamp {
    pub fn now() -> Self {
        Self(chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string())
    }

    pub fn from_string(stamp: impl Into<String>) -> Self {
        Self(stamp.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<prefix>_<stamp>.<extension>`
    pub fn file_name(&self, prefix: &str, extension: &str) -> String {
        format!("{}_{}.{}", prefix, self.0, extension)
    }
}

impl std::fmt::Display for RunStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_stamp_file_names() {
        let stamp = RunStamp::from_string("2026-01-02_03-04-05");
        assert_eq!(
            stamp.file_name("force_data", "csv"),
            "force_data_2026-01-02_03-04-05.csv"
        );
        assert_eq!(stamp.to_string(), "2026-01-02_03-04-05");
    }

    #[test]
    fn test_run_stamp_now_format() {
        let stamp = RunStamp::now();
        assert_eq!(stamp.as_str().len(), "YYYY-MM-DD_HH-MM-SS".len());
        assert!(!stamp.as_str().contains(':'));
    }
}
