// Pluggable line sources for the acquisition loop
//
// A line source wraps a byte-stream endpoint and yields complete text lines.
// Reads never block past the caller's timeout, so a silent or slow device
// cannot stall the sampling cadence.
//
// Current implementations:
// - Serial: serial port connections (Arduino / ESP32 force sensor rigs)
// - TCP: raw TCP streams carrying the same line format (serial bridges, test rigs)
// - Stream: any async reader, used for in-process devices and tests

mod reader;
mod serial;
mod stream;
mod tcp;

use crate::types::StreamResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use reader::LineReader;
pub use serial::SerialLineSource;
pub use stream::StreamLineSource;
pub use tcp::TcpLineSource;

/// Default baud rate of the FSR firmware
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default wait after opening a serial port, giving the board time to reset
pub const DEFAULT_SETTLE_MS: u64 = 1_000;

/// Configuration for the supported byte-stream endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SourceConfig {
    /// Serial port connection (e.g., /dev/ttyUSB0 on Linux, COM8 on Windows)
    #[serde(rename = "serial")]
    SerialPort {
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        #[serde(default = "default_settle_ms")]
        settle_ms: u64,
    },

    /// TCP stream producing newline-delimited readings
    #[serde(rename = "tcp")]
    TcpSocket { address: String },
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE_MS
}

/// Platform default port name
pub fn default_port() -> String {
    if cfg!(windows) {
        "COM8".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::SerialPort {
            port: default_port(),
            baud_rate: DEFAULT_BAUD_RATE,
            settle_ms: DEFAULT_SETTLE_MS,
        }
    }
}

/// Trait for all line-oriented byte-stream endpoints
#[async_trait]
pub trait LineSource: Send {
    /// Open the endpoint. Failure here aborts the run before it starts.
    async fn open(&mut self) -> StreamResult<()>;

    /// Next complete line, or `None` if nothing arrives within `timeout`.
    ///
    /// Lines that fail to decode are dropped inside the source, so a garbled
    /// line shows up here as "no data" rather than an error.
    async fn next_line(&mut self, timeout: Duration) -> StreamResult<Option<String>>;

    /// Close the endpoint. Closing an already-closed source is a no-op.
    async fn close(&mut self) -> StreamResult<()>;

    fn is_open(&self) -> bool;

    /// Human-readable endpoint description for logs
    fn describe(&self) -> String;
}

/// Build a line source from configuration. The endpoint is not opened yet.
pub fn create_source(config: &SourceConfig) -> Box<dyn LineSource> {
    match config {
        SourceConfig::SerialPort {
            port,
            baud_rate,
            settle_ms,
        } => Box::new(SerialLineSource::new(
            port.clone(),
            *baud_rate,
            Duration::from_millis(*settle_ms),
        )),

        SourceConfig::TcpSocket { address } => Box::new(TcpLineSource::new(address.clone())),
    }
}
