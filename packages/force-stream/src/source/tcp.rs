// TCP line source
//
// Reads newline-delimited readings from a TCP endpoint: serial-to-network
// bridges, networked sensor boards, or a simulated device on localhost.

use super::reader::LineReader;
use super::LineSource;
use crate::types::{StreamError, StreamResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TcpLineSource {
    address: String,
    reader: Option<LineReader>,
}

impl TcpLineSource {
    pub fn new(address: String) -> Self {
        Self {
            address,
            reader: None,
        }
    }
}

#[async_trait]
impl LineSource for TcpLineSource {
    async fn open(&mut self) -> StreamResult<()> {
        if self.reader.is_some() {
            return Ok(());
        }

        log::info!("Connecting to TCP line source at {}", self.address);

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.address))
            .await
            .map_err(|_| {
                StreamError::Connection(format!("Timed out connecting to {}", self.address))
            })?
            .map_err(|e| {
                StreamError::Connection(format!("Failed to connect to {}: {}", self.address, e))
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("TCP_NODELAY not set on {}: {}", self.address, e);
        }

        self.reader = Some(LineReader::spawn(self.describe(), Box::new(stream)));
        log::info!("Connected to {}", self.address);
        Ok(())
    }

    async fn next_line(&mut self, timeout: Duration) -> StreamResult<Option<String>> {
        match self.reader.as_mut() {
            Some(reader) => Ok(reader.next_line(timeout).await),
            None => Err(StreamError::NotOpen(self.address.clone())),
        }
    }

    async fn close(&mut self) -> StreamResult<()> {
        if let Some(mut reader) = self.reader.take() {
            reader.shutdown().await;
            log::info!("Disconnected from {}", self.address);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn describe(&self) -> String {
        format!("tcp {}", self.address)
    }
}
