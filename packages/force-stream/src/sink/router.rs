// Sink router: per-sample fan-out with failure isolation
//
// Each registered sink is written independently. A failing sink is logged and
// skipped for that sample only; it stays registered for the next one.

use super::{SampleSink, SinkKind, SinkResult};
use crate::types::Sample;
use std::path::PathBuf;

/// Result of one sink operation
#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: String,
    pub kind: SinkKind,
    pub result: SinkResult<()>,
}

impl SinkOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

struct RegisteredSink {
    sink: Box<dyn SampleSink>,
    failures: u64,
    closed: bool,
}

/// Fan-out over every registered sink
#[derive(Default)]
pub struct SinkRouter {
    sinks: Vec<RegisteredSink>,
}

impl SinkRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sink: Box<dyn SampleSink>) {
        log::info!("Registered {:?} sink '{}'", sink.kind(), sink.name());
        self.sinks.push(RegisteredSink {
            sink,
            failures: 0,
            closed: false,
        });
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.sinks.iter().map(|s| s.sink.name().to_string()).collect()
    }

    /// Deliver one sample to every open sink, collecting each result.
    pub fn dispatch(&mut self, sample: &Sample) -> Vec<SinkOutcome> {
        let mut outcomes = Vec::with_capacity(self.sinks.len());

        for entry in self.sinks.iter_mut().filter(|s| !s.closed) {
            let result = entry.sink.write(sample);
            if let Err(e) = &result {
                entry.failures += 1;
                log::warn!(
                    "Sink '{}' failed to accept sample at {:.3}s: {}",
                    entry.sink.name(),
                    sample.elapsed_seconds,
                    e
                );
            }
            outcomes.push(SinkOutcome {
                sink: entry.sink.name().to_string(),
                kind: entry.sink.kind(),
                result,
            });
        }

        outcomes
    }

    /// Hand the full retained window to every open non-display sink.
    pub fn flush(&mut self, samples: &[Sample]) -> Vec<SinkOutcome> {
        let mut outcomes = Vec::new();

        for entry in self
            .sinks
            .iter_mut()
            .filter(|s| !s.closed && s.sink.kind() != SinkKind::Display)
        {
            let result = entry.sink.flush(samples);
            if let Err(e) = &result {
                entry.failures += 1;
                log::error!("Sink '{}' failed to flush: {}", entry.sink.name(), e);
            }
            outcomes.push(SinkOutcome {
                sink: entry.sink.name().to_string(),
                kind: entry.sink.kind(),
                result,
            });
        }

        outcomes
    }

    /// Close every open sink of `kind`. A sink is marked closed even if its
    /// close fails, so it is never closed twice.
    pub fn close_kind(&mut self, kind: SinkKind) -> Vec<SinkOutcome> {
        let mut outcomes = Vec::new();

        for entry in self
            .sinks
            .iter_mut()
            .filter(|s| !s.closed && s.sink.kind() == kind)
        {
            entry.closed = true;
            let result = entry.sink.close();
            if let Err(e) = &result {
                log::error!("Sink '{}' failed to close: {}", entry.sink.name(), e);
            }
            outcomes.push(SinkOutcome {
                sink: entry.sink.name().to_string(),
                kind,
                result,
            });
        }

        outcomes
    }

    /// Per-sink failure counters, in registration order
    pub fn failure_counts(&self) -> Vec<(String, u64)> {
        self.sinks
            .iter()
            .map(|s| (s.sink.name().to_string(), s.failures))
            .collect()
    }

    /// Files produced by all sinks
    pub fn artifacts(&self) -> Vec<PathBuf> {
        self.sinks.iter().flat_map(|s| s.sink.artifacts()).collect()
    }
}

impl std::fmt::Debug for SinkRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRouter")
            .field("sinks", &self.names())
            .finish()
    }
}

/// Render outcome failures as `sink: error` strings
pub fn failures(outcomes: &[SinkOutcome]) -> Vec<String> {
    outcomes
        .iter()
        .filter_map(|o| match &o.result {
            Ok(()) => None,
            Err(e) => Some(format!("{}: {}", o.sink, e)),
        })
        .collect()
}
