// Experiment controller - drives one acquisition run
//
// The controller owns:
// - The line source (opened on start, closed by the shutdown coordinator)
// - The sample buffer (sole writer)
// - The sink router (per-sample fan-out)
// - The run state (Idle -> Running -> Stopped, exactly once)
//
// Each cadence tick checks the stop latch, then the deadline, then drains the
// lines that are already available. Deadline expiry and an external stop
// request both funnel into the same latch, so shutdown runs at most once.

use crate::buffer::{BufferMetrics, RetentionPolicy, SampleBuffer};
use crate::config::ExperimentConfig;
use crate::parser::SampleParser;
use crate::shutdown::{ShutdownCoordinator, ShutdownReport};
use crate::sink::SinkRouter;
use crate::source::LineSource;
use crate::types::{ParseError, RunState, RunStats, StopReason, StreamError, StreamResult};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub run_id: String,
    pub cadence: Duration,
    pub deadline: Option<Duration>,
    pub read_timeout: Duration,
    pub max_lines_per_tick: usize,
    pub retention: RetentionPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            cadence: Duration::from_millis(100),
            deadline: None,
            read_timeout: Duration::from_millis(1),
            max_lines_per_tick: 1024,
            retention: RetentionPolicy::UnboundedUntilFlush,
        }
    }
}

impl From<&ExperimentConfig> for ControllerConfig {
    fn from(config: &ExperimentConfig) -> Self {
        Self {
            cadence: config.cadence(),
            deadline: config.deadline(),
            read_timeout: config.read_timeout(),
            max_lines_per_tick: config.max_lines_per_tick,
            retention: config.retention(),
            ..Self::default()
        }
    }
}

/// Cloneable handle for stopping a run from outside the cadence loop
/// (Ctrl+C, a closed display window, another task).
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
    state: Arc<RwLock<RunState>>,
}

impl StopHandle {
    /// Request a manual stop. Repeated requests have no further effect.
    pub fn request_stop(&self) {
        if !self.token.is_cancelled() {
            log::info!("Stop requested");
        }
        self.token.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn state(&self) -> RunState {
        self.state.read().clone()
    }
}

/// Result of a single cadence tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stopped(StopReason),
}

/// Everything worth knowing once a run has ended
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub reason: StopReason,
    pub elapsed_seconds: f64,
    pub stats: RunStats,
    pub samples_retained: usize,
    pub buffer: BufferMetrics,
    pub shutdown: Option<ShutdownReport>,
    pub artifacts: Vec<PathBuf>,
    pub sink_failures: Vec<(String, u64)>,
}

pub struct ExperimentController {
    pub id: String,
    config: ControllerConfig,

    source: Box<dyn LineSource>,
    parser: SampleParser,
    buffer: SampleBuffer,
    router: SinkRouter,
    coordinator: ShutdownCoordinator,

    state: Arc<RwLock<RunState>>,
    stop_token: CancellationToken,
    stop_reason: Option<StopReason>,
    shutdown_report: Option<ShutdownReport>,

    epoch: Option<Instant>,
    last_elapsed: f64,
    stats: RunStats,
}

impl ExperimentController {
    pub fn new(config: ControllerConfig, source: Box<dyn LineSource>, router: SinkRouter) -> Self {
        Self {
            id: config.run_id.clone(),
            buffer: SampleBuffer::new(config.retention),
            config,
            source,
            parser: SampleParser::new(),
            router,
            coordinator: ShutdownCoordinator::new(),
            state: Arc::new(RwLock::new(RunState::Idle)),
            stop_token: CancellationToken::new(),
            stop_reason: None,
            shutdown_report: None,
            epoch: None,
            last_elapsed: 0.0,
            stats: RunStats::default(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.stop_token.clone(),
            state: Arc::clone(&self.state),
        }
    }

    pub fn state(&self) -> RunState {
        self.state.read().clone()
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn router(&self) -> &SinkRouter {
        &self.router
    }

    /// Open the source and record the epoch.
    ///
    /// A source that cannot be opened is the only fatal error of a run.
    pub async fn start(&mut self) -> StreamResult<()> {
        match &*self.state.read() {
            RunState::Running { .. } => return Err(StreamError::AlreadyRunning),
            RunState::Stopped { .. } => return Err(StreamError::AlreadyStopped),
            RunState::Idle => {}
        }

        log::info!("Starting experiment {} on {}", self.id, self.source.describe());

        if let Err(e) = self.source.open().await {
            log::error!("Failed to open {}: {}", self.source.describe(), e);
            return Err(e);
        }

        self.epoch = Some(Instant::now());
        self.last_elapsed = 0.0;
        *self.state.write() = RunState::Running {
            started_at: chrono::Utc::now().to_rfc3339(),
        };

        match self.config.deadline {
            Some(deadline) => log::info!(
                "Experiment running for {:.1}s at a {}ms cadence",
                deadline.as_secs_f64(),
                self.config.cadence.as_millis()
            ),
            None => log::info!(
                "Experiment running until stopped at a {}ms cadence",
                self.config.cadence.as_millis()
            ),
        }

        Ok(())
    }

    /// Seconds since the epoch, never smaller than a value already handed out.
    fn elapsed_seconds(&mut self) -> f64 {
        let elapsed = self
            .epoch
            .map(|epoch| epoch.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.last_elapsed = self.last_elapsed.max(elapsed);
        self.last_elapsed
    }

    fn deadline_reached(&self) -> bool {
        match (self.config.deadline, self.epoch) {
            (Some(deadline), Some(epoch)) => epoch.elapsed() >= deadline,
            _ => false,
        }
    }

    /// Run one cadence tick.
    pub async fn tick(&mut self) -> StreamResult<TickOutcome> {
        if let Some(reason) = self.stop_reason {
            return Ok(TickOutcome::Stopped(reason));
        }
        if self.epoch.is_none() {
            return Err(StreamError::NotRunning);
        }

        self.stats.ticks += 1;

        if self.stop_token.is_cancelled() {
            self.stop(StopReason::Manual).await;
            return Ok(TickOutcome::Stopped(StopReason::Manual));
        }

        if self.deadline_reached() {
            self.stop(StopReason::Deadline).await;
            return Ok(TickOutcome::Stopped(StopReason::Deadline));
        }

        self.drain_available().await;
        Ok(TickOutcome::Continue)
    }

    /// Consume the lines that are available right now, bounded per tick.
    async fn drain_available(&mut self) {
        for _ in 0..self.config.max_lines_per_tick {
            let line = match self.source.next_line(self.config.read_timeout).await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    self.stats.source_errors += 1;
                    log::warn!("Read from {} failed: {}", self.source.describe(), e);
                    break;
                }
            };

            self.stats.lines_read += 1;
            self.ingest(&line);
        }
    }

    fn ingest(&mut self, raw: &str) {
        let elapsed = self.elapsed_seconds();
        let sample = match self.parser.parse(raw, elapsed) {
            Ok(sample) => sample,
            Err(ParseError::Empty) => {
                self.stats.empty_lines += 1;
                return;
            }
            Err(ParseError::Malformed(text)) => {
                self.stats.malformed_lines += 1;
                log::debug!("Skipping malformed reading {:?}", text);
                return;
            }
        };

        if let Err(e) = self.buffer.append(sample) {
            self.stats.rejected_after_stop += 1;
            log::debug!("Dropping sample at {:.3}s: {}", sample.elapsed_seconds, e);
            return;
        }
        self.stats.samples_accepted += 1;

        let outcomes = self.router.dispatch(&sample);
        self.stats.sink_write_failures += outcomes.iter().filter(|o| !o.is_ok()).count() as u64;
    }

    /// Stop the run and tear everything down.
    ///
    /// Only the first call does anything; later calls return `None`.
    pub async fn stop(&mut self, reason: StopReason) -> Option<ShutdownReport> {
        if self.stop_reason.is_some() {
            return None;
        }

        self.stop_reason = Some(reason);
        self.stop_token.cancel();
        self.buffer.close();
        *self.state.write() = RunState::Stopped { reason };

        let elapsed = self.elapsed_seconds();
        log::info!(
            "Experiment {} stopped after {:.2}s: {} ({} samples)",
            self.id,
            elapsed,
            reason,
            self.buffer.len()
        );

        let report = self
            .coordinator
            .shutdown(reason, &self.buffer, &mut self.router, self.source.as_mut())
            .await;
        self.shutdown_report = report.clone();
        report
    }

    /// Start, tick at the configured cadence until the deadline or a stop
    /// request, shut down, and report.
    pub async fn run(mut self) -> StreamResult<RunSummary> {
        self.start().await?;

        let mut ticker = interval(self.config.cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let stop_token = self.stop_token.clone();

        loop {
            let stop_requested = tokio::select! {
                biased;
                _ = stop_token.cancelled() => true,
                _ = ticker.tick() => false,
            };

            if stop_requested {
                self.stop(StopReason::Manual).await;
                break;
            }

            if let TickOutcome::Stopped(_) = self.tick().await? {
                break;
            }
        }

        Ok(self.summarize())
    }

    fn summarize(&mut self) -> RunSummary {
        let summary = RunSummary {
            run_id: self.id.clone(),
            reason: self.stop_reason.unwrap_or(StopReason::Manual),
            elapsed_seconds: self.elapsed_seconds(),
            stats: self.stats.clone(),
            samples_retained: self.buffer.len(),
            buffer: self.buffer.metrics(),
            shutdown: self.shutdown_report.clone(),
            artifacts: self.router.artifacts(),
            sink_failures: self.router.failure_counts(),
        };

        // the durable exports already hold everything
        self.buffer.clear();
        summary
    }
}

impl Drop for ExperimentController {
    fn drop(&mut self) {
        self.stop_token.cancel();
    }
}
