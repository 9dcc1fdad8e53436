// Serial port line source
//
// Connects to a serial port (e.g., /dev/ttyUSB0, /dev/ttyACM0, COM8) and
// receives one newline-terminated force reading per line.
//
// Opening a port on most Arduino-compatible boards resets them, so the source
// waits `settle` after opening and then discards whatever the board printed
// while booting before the first read.

use super::reader::LineReader;
use super::LineSource;
use crate::types::{StreamError, StreamResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt};

pub struct SerialLineSource {
    port: String,
    baud_rate: u32,
    settle: Duration,
    reader: Option<LineReader>,
}

impl SerialLineSource {
    pub fn new(port: String, baud_rate: u32, settle: Duration) -> Self {
        Self {
            port,
            baud_rate,
            settle,
            reader: None,
        }
    }
}

#[async_trait]
impl LineSource for SerialLineSource {
    async fn open(&mut self) -> StreamResult<()> {
        if self.reader.is_some() {
            return Ok(());
        }

        log::info!(
            "Opening serial port: {} at {} baud",
            self.port,
            self.baud_rate
        );

        let stream = tokio_serial::new(&self.port, self.baud_rate)
            .open_native_async()
            .map_err(|e| StreamError::Serial(format!("Failed to open port {}: {}", self.port, e)))?;

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        if let Err(e) = stream.clear(ClearBuffer::Input) {
            log::warn!("Could not discard stale input on {}: {}", self.port, e);
        }

        self.reader = Some(LineReader::spawn(self.describe(), Box::new(stream)));
        log::info!("Serial port opened successfully");

        Ok(())
    }

    async fn next_line(&mut self, timeout: Duration) -> StreamResult<Option<String>> {
        match self.reader.as_mut() {
            Some(reader) => Ok(reader.next_line(timeout).await),
            None => Err(StreamError::NotOpen(self.port.clone())),
        }
    }

    async fn close(&mut self) -> StreamResult<()> {
        if let Some(mut reader) = self.reader.take() {
            log::info!("Closing serial port {}", self.port);
            reader.shutdown().await;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn describe(&self) -> String {
        format!("serial {} @ {} baud", self.port, self.baud_rate)
    }
}
