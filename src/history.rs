//! Fixed-capacity rolling sample windows.
//!
//! Every window is pre-filled with the baseline so consumers always see
//! exactly `capacity` samples, index 0 being the oldest.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::constants::HISTORY_BASELINE;

/// Immutable copy of a history window, shared by snapshots.
pub type HistoryWindow = Arc<[f64]>;

/// Circular buffer of the most recent samples of one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Create a buffer of `capacity` samples, all set to the baseline.
    pub fn new(capacity: usize) -> Self {
        Self::filled(capacity, HISTORY_BASELINE)
    }

    /// Create a buffer of `capacity` samples, all set to `baseline`.
    /// A zero capacity is raised to one.
    pub fn filled(capacity: usize, baseline: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: std::iter::repeat(baseline).take(capacity).collect(),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn push(&mut self, value: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Samples in insertion order, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    /// Most recent sample.
    pub fn latest(&self) -> f64 {
        self.samples.back().copied().unwrap_or(HISTORY_BASELINE)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Freeze the current contents into a shareable window.
    pub fn freeze(&self) -> HistoryWindow {
        self.samples.iter().copied().collect()
    }
}
