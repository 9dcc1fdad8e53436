// Ordered, run-once teardown
//
// Steps, in order:
// 1. flush the retained window to every durable sink, then close them
// 2. close the relational sink's connection
// 3. close the byte-stream endpoint
// 4. release the live display
//
// Every step runs even if an earlier one failed; failures are collected into
// the report instead of aborting the sequence.

use crate::buffer::SampleBuffer;
use crate::sink::router::failures;
use crate::sink::{SinkKind, SinkRouter};
use crate::source::LineSource;
use crate::types::StopReason;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownStep {
    FlushDurable,
    CloseRelational,
    CloseSource,
    ReleaseDisplay,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: ShutdownStep,
    /// `sink: error` or source error messages; empty when the step succeeded
    pub failures: Vec<String>,
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What happened during shutdown
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    pub reason: StopReason,
    pub samples_flushed: usize,
    pub steps: Vec<StepOutcome>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(StepOutcome::is_ok)
    }
}

/// Runs the teardown sequence at most once
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    completed: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Tear everything down. Returns `None` if shutdown already ran.
    pub async fn shutdown(
        &self,
        reason: StopReason,
        buffer: &SampleBuffer,
        router: &mut SinkRouter,
        source: &mut dyn LineSource,
    ) -> Option<ShutdownReport> {
        if self.completed.swap(true, Ordering::SeqCst) {
            log::debug!("Shutdown already performed, ignoring repeated request");
            return None;
        }

        log::info!("Shutting down ({})", reason);
        let window = buffer.window().to_vec();
        let mut steps = Vec::with_capacity(4);

        // 1. durable exports see the full retained window exactly once
        let mut flush_failures = failures(&router.flush(&window));
        flush_failures.extend(failures(&router.close_kind(SinkKind::Durable)));
        steps.push(StepOutcome {
            step: ShutdownStep::FlushDurable,
            failures: flush_failures,
        });

        // 2.
        steps.push(StepOutcome {
            step: ShutdownStep::CloseRelational,
            failures: failures(&router.close_kind(SinkKind::Relational)),
        });

        // 3.
        let source_failures = match source.close().await {
            Ok(()) => Vec::new(),
            Err(e) => {
                log::error!("Failed to close {}: {}", source.describe(), e);
                vec![format!("{}: {}", source.describe(), e)]
            }
        };
        steps.push(StepOutcome {
            step: ShutdownStep::CloseSource,
            failures: source_failures,
        });

        // 4.
        steps.push(StepOutcome {
            step: ShutdownStep::ReleaseDisplay,
            failures: failures(&router.close_kind(SinkKind::Display)),
        });

        let report = ShutdownReport {
            reason,
            samples_flushed: window.len(),
            steps,
        };

        if report.is_clean() {
            log::info!("Shutdown complete, {} samples flushed", report.samples_flushed);
        } else {
            log::warn!("Shutdown completed with errors");
        }

        Some(report)
    }
}
