// Live display sink
//
// Keeps a shared, read-only view of recent samples for whatever renders the
// live chart (terminal status line, GUI, web socket). Renderers poll
// `LiveView::frame()` on their own tick and never touch the sample buffer.

use super::{SampleSink, SinkError, SinkKind, SinkResult};
use crate::types::Sample;
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Axis policy and decimation for the live view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show only the trailing N seconds; `None` shows the full history
    pub trailing_seconds: Option<f64>,

    /// Maximum number of points handed to a renderer per frame
    pub max_points: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            trailing_seconds: Some(10.0),
            max_points: 2000,
        }
    }
}

/// One renderable frame
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ViewFrame {
    pub points: Vec<Sample>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub latest: Option<Sample>,
    pub total_samples: u64,
    pub closed: bool,
}

#[derive(Debug)]
struct ViewState {
    samples: VecDeque<Sample>,
    total_samples: u64,
    closed: bool,
}

/// Shared live view; cheap to clone, readers never mutate it
#[derive(Debug, Clone)]
pub struct LiveView {
    state: Arc<RwLock<ViewState>>,
    config: DisplayConfig,
    max_samples: Option<usize>,
}

impl LiveView {
    /// `max_samples` mirrors a count-bounded retention window; the view never
    /// holds more samples than the run itself retains.
    pub fn new(config: DisplayConfig, max_samples: Option<usize>) -> Self {
        Self {
            state: Arc::new(RwLock::new(ViewState {
                samples: VecDeque::new(),
                total_samples: 0,
                closed: false,
            })),
            config,
            max_samples: max_samples.map(|n| n.max(1)),
        }
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    fn push(&self, sample: Sample) {
        let mut state = self.state.write();
        state.samples.push_back(sample);
        state.total_samples += 1;

        if let Some(trailing) = self.config.trailing_seconds {
            let cutoff = sample.elapsed_seconds - trailing;
            while let Some(front) = state.samples.front() {
                if front.elapsed_seconds < cutoff {
                    state.samples.pop_front();
                } else {
                    break;
                }
            }
        }

        if let Some(max) = self.max_samples {
            while state.samples.len() > max {
                state.samples.pop_front();
            }
        }
    }

    fn close(&self) {
        self.state.write().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    pub fn latest(&self) -> Option<Sample> {
        self.state.read().samples.back().copied()
    }

    pub fn total_samples(&self) -> u64 {
        self.state.read().total_samples
    }

    /// Snapshot the current view with axis limits and decimated points.
    pub fn frame(&self) -> ViewFrame {
        let (samples, total_samples, closed) = {
            let state = self.state.read();
            let samples: Vec<Sample> = state.samples.iter().copied().collect();
            (samples, state.total_samples, state.closed)
        };

        let latest = samples.last().copied();
        let (x_range, y_range) = axis_ranges(&samples, self.config.trailing_seconds);

        ViewFrame {
            points: decimate(&samples, self.config.max_points),
            x_range,
            y_range,
            latest,
            total_samples,
            closed,
        }
    }
}

/// Axis limits for a set of samples.
///
/// x: `[max(0, last - T), last + 1]` for a trailing window of `T` seconds, or
/// `[0, last + 1]` for the full history. y: `[min - 1, max + 3]`.
/// Before any data arrives the axes default to `[0, T or 10] x [0, 20]`.
pub fn axis_ranges(samples: &[Sample], trailing_seconds: Option<f64>) -> ((f64, f64), (f64, f64)) {
    let Some(last) = samples.last() else {
        return ((0.0, trailing_seconds.unwrap_or(10.0)), (0.0, 20.0));
    };

    let x_min = match trailing_seconds {
        Some(trailing) => (last.elapsed_seconds - trailing).max(0.0),
        None => 0.0,
    };

    let (y_min, y_max) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.value), hi.max(s.value))
        });

    ((x_min, last.elapsed_seconds + 1.0), (y_min - 1.0, y_max + 3.0))
}

/// Evenly spaced subset of at most `max_points`, always keeping both ends.
pub(crate) fn decimate(samples: &[Sample], max_points: usize) -> Vec<Sample> {
    if max_points == 0 || samples.len() <= max_points {
        return samples.to_vec();
    }
    if max_points == 1 {
        return vec![samples[samples.len() - 1]];
    }

    let last = samples.len() - 1;
    let step = last as f64 / (max_points - 1) as f64;
    (0..max_points)
        .into_par_iter()
        .map(|i| samples[((i as f64 * step).round() as usize).min(last)])
        .collect()
}

/// Display sink feeding a [`LiveView`]
pub struct LiveDisplaySink {
    name: String,
    view: LiveView,
}

impl LiveDisplaySink {
    pub fn new(view: LiveView) -> Self {
        Self {
            name: "live-display".to_string(),
            view,
        }
    }
}

impl SampleSink for LiveDisplaySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Display
    }

    fn write(&mut self, sample: &Sample) -> SinkResult<()> {
        if self.view.is_closed() {
            return Err(SinkError::Closed(self.name.clone()));
        }
        self.view.push(*sample);
        Ok(())
    }

    fn flush(&mut self, _samples: &[Sample]) -> SinkResult<()> {
        Ok(())
    }

    fn close(&mut self) -> SinkResult<()> {
        self.view.close();
        Ok(())
    }
}
