// =============================================================================
// Rate of Change (ROC) — Average per-tick delta
// =============================================================================
//
// Book-derived series (LD, BPR ratio, alpha score) arrive at irregular
// intervals and live on very different scales, so their momentum is measured
// as the mean of consecutive deltas over the last `window` ticks:
//
//   ROC = ( sum_{i=n-window}^{n-1} (x_i - x_{i-1}) ) / window
//
// Positive ROC indicates the series is rising; negative indicates falling.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Average of the last `window` consecutive deltas of `values`.
///
/// Uses as many deltas as are available when the series is shorter than
/// `window + 1`; returns 0.0 with fewer than two values.
pub fn average_delta(values: &[f64], window: usize) -> f64 {
    if window == 0 || values.len() < 2 {
        return 0.0;
    }
    let take = window.min(values.len() - 1);
    let tail = &values[values.len() - take - 1..];
    let sum: f64 = tail.windows(2).map(|w| w[1] - w[0]).sum();
    sum / take as f64
}

/// Bounded history that reports the average-delta ROC on every push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocTracker {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RocTracker {
    /// `max_window` is the largest ROC window that will be requested.
    pub fn new(max_window: usize) -> Self {
        let capacity = max_window.max(1) + 1;
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `x` and return the ROC over the last `window` deltas.
    pub fn push(&mut self, x: f64, window: usize) -> f64 {
        if x.is_finite() {
            self.values.push_back(x);
            while self.values.len() > self.capacity {
                self.values.pop_front();
            }
        }
        self.roc(window)
    }

    /// ROC over the last `window` deltas without adding a value.
    pub fn roc(&self, window: usize) -> f64 {
        let n = self.values.len();
        if window == 0 || n < 2 {
            return 0.0;
        }
        // Consecutive deltas telescope to (last - first) over the window.
        let take = window.min(n - 1);
        (self.values[n - 1] - self.values[n - 1 - take]) / take as f64
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
