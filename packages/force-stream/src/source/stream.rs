// Line source over an arbitrary async reader
//
// Useful for:
// - In-process simulated devices
// - Pipes and duplex streams in tests
// - Endpoints opened by the caller (e.g., a pre-configured serial handle)

use super::reader::{BoxedReader, LineReader};
use super::LineSource;
use crate::types::{StreamError, StreamResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncRead;

pub struct StreamLineSource {
    label: String,
    pending: Option<BoxedReader>,
    reader: Option<LineReader>,
}

impl StreamLineSource {
    pub fn new<R>(label: impl Into<String>, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            label: label.into(),
            pending: Some(Box::new(reader)),
            reader: None,
        }
    }
}

#[async_trait]
impl LineSource for StreamLineSource {
    async fn open(&mut self) -> StreamResult<()> {
        if self.reader.is_some() {
            return Ok(());
        }

        let stream = self.pending.take().ok_or_else(|| {
            StreamError::Connection(format!("{}: stream already consumed", self.label))
        })?;

        self.reader = Some(LineReader::spawn(self.label.clone(), stream));
        log::info!("Line stream {} opened", self.label);
        Ok(())
    }

    async fn next_line(&mut self, timeout: Duration) -> StreamResult<Option<String>> {
        match self.reader.as_mut() {
            Some(reader) => Ok(reader.next_line(timeout).await),
            None => Err(StreamError::NotOpen(self.label.clone())),
        }
    }

    async fn close(&mut self) -> StreamResult<()> {
        if let Some(mut reader) = self.reader.take() {
            reader.shutdown().await;
            log::info!("Line stream {} closed", self.label);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn describe(&self) -> String {
        format!("stream {}", self.label)
    }
}
