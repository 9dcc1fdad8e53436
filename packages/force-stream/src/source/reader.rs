// Background line reader shared by every line source
//
// A spawned task splits the byte stream on '\n' and forwards decoded lines
// over a bounded channel. The acquisition loop only ever waits on the channel,
// with a timeout, so it never blocks on the device itself.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

const LINE_CHANNEL_CAPACITY: usize = 1024;
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Longest line kept, terminator included. Anything longer is noise
/// (wrong baud rate, framing errors) and is dropped up to the next '\n'.
const MAX_LINE_BYTES: usize = 4096;

/// Boxed async byte reader
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Handle to a running reader task
pub struct LineReader {
    label: String,
    lines: mpsc::Receiver<String>,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
    ended: bool,
}

impl LineReader {
    /// Spawn the reader task. Must be called from within a tokio runtime.
    pub fn spawn(label: impl Into<String>, reader: BoxedReader) -> Self {
        let label = label.into();
        let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let cancel_token = CancellationToken::new();

        let task = tokio::spawn(read_lines(
            label.clone(),
            reader,
            tx,
            cancel_token.clone(),
        ));

        Self {
            label,
            lines: rx,
            cancel_token,
            task: Some(task),
            ended: false,
        }
    }

    /// Next decoded line, waiting at most `wait`.
    ///
    /// Lines already queued are returned without waiting. Once the underlying
    /// stream has ended this keeps returning `None`.
    pub async fn next_line(&mut self, wait: Duration) -> Option<String> {
        match self.lines.try_recv() {
            Ok(line) => return Some(line),
            Err(TryRecvError::Disconnected) => {
                self.mark_ended();
                return None;
            }
            Err(TryRecvError::Empty) => {}
        }

        if self.ended {
            return None;
        }

        match timeout(wait, self.lines.recv()).await {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                self.mark_ended();
                None
            }
            Err(_) => None,
        }
    }

    /// True once the stream reached EOF or a read error
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Stop the reader task and release the endpoint it owns.
    pub async fn shutdown(&mut self) {
        self.lines.close();
        self.cancel_token.cancel();

        if let Some(task) = self.task.take() {
            let abort = task.abort_handle();
            match timeout(READER_JOIN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => log::warn!("{}: reader task failed: {}", self.label, e),
                Err(_) => {
                    log::warn!("{}: reader task did not stop in time, aborting", self.label);
                    abort.abort();
                }
            }
        }
    }

    fn mark_ended(&mut self) {
        if !self.ended {
            log::warn!("{}: line stream ended", self.label);
            self.ended = true;
        }
    }
}

impl Drop for LineReader {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn read_lines(
    label: String,
    reader: BoxedReader,
    tx: mpsc::Sender<String>,
    cancel_token: CancellationToken,
) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(64);
    let mut discarding = false;

    loop {
        buf.clear();

        let mut limited = (&mut reader).take(MAX_LINE_BYTES as u64);
        let read = tokio::select! {
            biased;

            _ = cancel_token.cancelled() => break,

            read = limited.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => {
                log::info!("{}: end of stream", label);
                break;
            }
            Ok(n) if n >= MAX_LINE_BYTES && buf.last() != Some(&b'\n') => {
                if !discarding {
                    log::debug!(
                        "{}: dropping oversized line (more than {} bytes)",
                        label,
                        MAX_LINE_BYTES
                    );
                }
                discarding = true;
            }
            // tail of an oversized line
            Ok(_) if discarding => discarding = false,
            Ok(_) => match decode_line(&buf) {
                Some(line) => {
                    if tx.send(line).await.is_err() {
                        log::debug!("{}: line receiver closed", label);
                        break;
                    }
                }
                None => {
                    log::debug!("{}: dropping undecodable line ({} bytes)", label, buf.len());
                }
            },
            Err(e) if is_transient(&e) => {
                log::debug!("{}: transient read error: {}", label, e);
            }
            Err(e) => {
                log::error!("{}: read failed: {}", label, e);
                break;
            }
        }
    }
}

/// Strip the line terminator and decode as UTF-8. `None` on decode failure.
fn decode_line(bytes: &[u8]) -> Option<String> {
    let mut end = bytes.len();
    while end > 0 && matches!(bytes[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    std::str::from_utf8(&bytes[..end]).ok().map(str::to_owned)
}

fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"3.5\r\n"), Some("3.5".to_string()));
        assert_eq!(decode_line(b"3.5"), Some("3.5".to_string()));
        assert_eq!(decode_line(b"\n"), Some(String::new()));
        assert_eq!(decode_line(&[0xff, 0xfe, b'\n']), None);
    }

    #[tokio::test]
    async fn test_reads_lines_and_skips_garbage() {
        let (mut device, host) = tokio::io::duplex(256);
        let mut reader = LineReader::spawn("test", Box::new(host));

        device.write_all(b"1.0\n").await.unwrap();
        device.write_all(&[0xc3, 0x28, b'\n']).await.unwrap();
        device.write_all(b"2.0\r\n").await.unwrap();

        let wait = Duration::from_millis(200);
        assert_eq!(reader.next_line(wait).await, Some("1.0".to_string()));
        assert_eq!(reader.next_line(wait).await, Some("2.0".to_string()));
        assert_eq!(reader.next_line(Duration::from_millis(10)).await, None);
        assert!(!reader.has_ended());

        reader.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_line_is_dropped() {
        let (mut device, host) = tokio::io::duplex(1024);
        let mut reader = LineReader::spawn("noisy", Box::new(host));

        let writer = tokio::spawn(async move {
            device.write_all(b"1.0\n").await.unwrap();
            device.write_all(&vec![b'7'; MAX_LINE_BYTES * 3]).await.unwrap();
            device.write_all(b"\n2.0\n").await.unwrap();
            device
        });

        let wait = Duration::from_millis(500);
        assert_eq!(reader.next_line(wait).await, Some("1.0".to_string()));
        assert_eq!(reader.next_line(wait).await, Some("2.0".to_string()));
        assert_eq!(reader.next_line(Duration::from_millis(10)).await, None);
        assert!(!reader.has_ended());

        let _device = writer.await.unwrap();
        reader.shutdown().await;
    }

    #[tokio::test]
    async fn test_end_of_stream_is_sticky() {
        let (mut device, host) = tokio::io::duplex(64);
        let mut reader = LineReader::spawn("test", Box::new(host));

        device.write_all(b"4.0").await.unwrap();
        drop(device);

        let wait = Duration::from_millis(200);
        assert_eq!(reader.next_line(wait).await, Some("4.0".to_string()));
        assert_eq!(reader.next_line(wait).await, None);
        assert!(reader.has_ended());
        assert_eq!(reader.next_line(wait).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_line_respects_timeout() {
        let (_device, host) = tokio::io::duplex(64);
        let mut reader = LineReader::spawn("silent", Box::new(host));

        let started = tokio::time::Instant::now();
        assert_eq!(reader.next_line(Duration::from_millis(5)).await, None);
        assert!(started.elapsed() <= Duration::from_millis(6));

        reader.shutdown().await;
    }
}
