// Time-ordered sample buffer owned by the experiment controller
//
// Insertion order is time order. Two retention policies are supported:
// - count-bounded: keep only the most recent N samples (oldest dropped first)
// - unbounded-until-flush: keep every sample for the life of the run so the
//   full-range export at shutdown sees everything

use crate::types::{Sample, StreamError, StreamResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::iter::Chain;
use std::slice;

/// Retention policy for the sample buffer
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Sliding window over the last `capacity` samples
    CountBounded { capacity: usize },

    /// Keep everything until the run is torn down
    #[default]
    UnboundedUntilFlush,
}

impl RetentionPolicy {
    /// `Some(n)` selects a count-bounded window, `None` keeps everything.
    pub fn from_window_size(window_size: Option<usize>) -> Self {
        match window_size {
            Some(capacity) => RetentionPolicy::CountBounded { capacity },
            None => RetentionPolicy::UnboundedUntilFlush,
        }
    }

    fn capacity(&self) -> Option<usize> {
        match self {
            RetentionPolicy::CountBounded { capacity } => Some((*capacity).max(1)),
            RetentionPolicy::UnboundedUntilFlush => None,
        }
    }
}

/// Metrics for buffer monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BufferMetrics {
    pub total_appended: u64,
    pub total_evicted: u64,
    pub current_len: usize,
    pub peak_len: usize,
}

/// Ordered, bounded-or-unbounded store of accepted samples
#[derive(Debug)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    policy: RetentionPolicy,
    closed: bool,
    total_appended: u64,
    total_evicted: u64,
    peak_len: usize,
}

impl SampleBuffer {
    pub fn new(policy: RetentionPolicy) -> Self {
        let samples = match policy.capacity() {
            Some(capacity) => VecDeque::with_capacity(capacity + 1),
            None => VecDeque::new(),
        };

        Self {
            samples,
            policy,
            closed: false,
            total_appended: 0,
            total_evicted: 0,
            peak_len: 0,
        }
    }

    /// Append a sample, evicting from the front under the count-bounded policy.
    ///
    /// Fails with [`StreamError::BufferClosed`] once the run has stopped.
    pub fn append(&mut self, sample: Sample) -> StreamResult<()> {
        if self.closed {
            return Err(StreamError::BufferClosed);
        }

        self.samples.push_back(sample);
        self.total_appended += 1;

        if let Some(capacity) = self.policy.capacity() {
            while self.samples.len() > capacity {
                self.samples.pop_front();
                self.total_evicted += 1;
            }
        }

        self.peak_len = self.peak_len.max(self.samples.len());
        Ok(())
    }

    /// Read-only view of the retained samples, oldest first.
    pub fn window(&self) -> SampleWindow<'_> {
        let (head, tail) = self.samples.as_slices();
        SampleWindow { head, tail }
    }

    /// Most recently appended sample still retained
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Reject all further appends. Idempotent.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drop every retained sample. Only used at teardown after the final flush.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn metrics(&self) -> BufferMetrics {
        BufferMetrics {
            total_appended: self.total_appended,
            total_evicted: self.total_evicted,
            current_len: self.samples.len(),
            peak_len: self.peak_len,
        }
    }
}

/// Borrowed view over the buffer contents.
///
/// Copyable and re-iterable: every call to [`SampleWindow::iter`] starts from
/// the oldest retained sample and has no side effects on the buffer.
#[derive(Debug, Clone, Copy)]
pub struct SampleWindow<'a> {
    head: &'a [Sample],
    tail: &'a [Sample],
}

impl<'a> SampleWindow<'a> {
    pub fn iter(&self) -> Chain<slice::Iter<'a, Sample>, slice::Iter<'a, Sample>> {
        self.head.iter().chain(self.tail.iter())
    }

    pub fn len(&self) -> usize {
        self.head.len() + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first(&self) -> Option<&'a Sample> {
        self.head.first().or_else(|| self.tail.first())
    }

    pub fn last(&self) -> Option<&'a Sample> {
        self.tail.last().or_else(|| self.head.last())
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.iter().copied().collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.iter().map(|s| s.value).collect()
    }
}

impl<'a> IntoIterator for SampleWindow<'a> {
    type Item = &'a Sample;
    type IntoIter = Chain<slice::Iter<'a, Sample>, slice::Iter<'a, Sample>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
