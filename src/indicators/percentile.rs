// =============================================================================
// Rolling Percentiles — Bounded sample window with IQR-fenced bounds
// =============================================================================
//
// Percentiles use linear interpolation between closest ranks:
//
//   rank = p * (n - 1)
//   P(p) = s[floor(rank)] + (rank - floor(rank)) * (s[ceil(rank)] - s[floor(rank)])
//
// Fenced bounds clamp the 5th/95th percentiles to `median ± 4 * IQR` so that a
// handful of extreme prints cannot stretch the normalisation span.
// =============================================================================

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default capacity of a sample window.
pub const WINDOW_CAPACITY: usize = 500;
/// Minimum sample count for percentile-derived bounds.
pub const MIN_CALIBRATION_SAMPLES: usize = 20;
/// Multiplier of the inter-quartile range used for the outlier fence.
pub const IQR_FENCE_MULT: f64 = 4.0;

/// Bounded FIFO of raw scalars (drop-oldest).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when full. Non-finite values are
    /// discarded.
    pub fn push(&mut self, x: f64) {
        if !x.is_finite() {
            return;
        }
        self.samples.push_back(x);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
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

    pub fn is_calibrated(&self) -> bool {
        self.samples.len() >= MIN_CALIBRATION_SAMPLES
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Sorted copy of the current samples.
    pub fn sorted(&self) -> Vec<f64> {
        let mut v: Vec<f64> = self.samples.iter().copied().collect();
        v.sort_by(|a, b| a.total_cmp(b));
        v
    }

    /// IQR-fenced 5th/95th percentile bounds, or `None` below the calibration
    /// threshold.
    pub fn fenced_bounds(&self) -> Option<PercentileBounds> {
        if !self.is_calibrated() {
            return None;
        }
        PercentileBounds::from_sorted(&self.sorted())
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(WINDOW_CAPACITY)
    }
}

/// Percentile-derived normalisation bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileBounds {
    /// Raw 5th percentile.
    pub p05: f64,
    /// Raw 95th percentile.
    pub p95: f64,
    pub median: f64,
    pub iqr: f64,
    /// Lower bound after the IQR fence.
    pub lower: f64,
    /// Upper bound after the IQR fence.
    pub upper: f64,
}

impl PercentileBounds {
    pub fn from_sorted(sorted: &[f64]) -> Option<Self> {
        let p05 = percentile(sorted, 0.05)?;
        let p95 = percentile(sorted, 0.95)?;
        let q1 = percentile(sorted, 0.25)?;
        let median = percentile(sorted, 0.50)?;
        let q3 = percentile(sorted, 0.75)?;
        let iqr = q3 - q1;

        let fence_lo = median - IQR_FENCE_MULT * iqr;
        let fence_hi = median + IQR_FENCE_MULT * iqr;

        Some(Self {
            p05,
            p95,
            median,
            iqr,
            lower: p05.max(fence_lo),
            upper: p95.min(fence_hi),
        })
    }

    /// Span between the fenced bounds.
    pub fn span(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Linear-interpolated percentile of an ascending slice, `p` in `[0, 1]`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !p.is_finite() {
        return None;
    }
    let p = p.clamp(0.0, 1.0);
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let s = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&s, 0.0), Some(0.0));
        assert_eq!(percentile(&s, 1.0), Some(40.0));
        assert!((percentile(&s, 0.5).unwrap() - 20.0).abs() < 1e-12);
        // rank = 0.1 * 4 = 0.4 => 4.0
        assert!((percentile(&s, 0.1).unwrap() - 4.0).abs() < 1e-12);
        assert!(percentile(&[], 0.5).is_none());
    }

    #[test]
    fn window_drops_oldest() {
        let mut w = SampleWindow::new(3);
        for x in [1.0, 2.0, 3.0, 4.0] {
            w.push(x);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.sorted(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn bounds_need_calibration() {
        let mut w = SampleWindow::default();
        for i in 0..19 {
            w.push(i as f64);
        }
        assert!(w.fenced_bounds().is_none());
        w.push(19.0);
        assert!(w.fenced_bounds().is_some());
    }

    #[test]
    fn bounds_converge_to_true_percentiles() {
        // Uniform grid over [0, 100] fed in a scrambled (coprime stride) order.
        let n = 500usize;
        let mut w = SampleWindow::default();
        for k in 0..n {
            let i = (k * 7) % n;
            w.push(i as f64 * 100.0 / (n - 1) as f64);
        }
        let b = w.fenced_bounds().unwrap();
        assert!((b.lower - 5.0).abs() < 0.25, "lower = {}", b.lower);
        assert!((b.upper - 95.0).abs() < 0.25, "upper = {}", b.upper);
    }

    #[test]
    fn bounds_converge_with_few_samples() {
        // 21 evenly spaced samples over [0, 20]: p05 = 1, p95 = 19.
        let mut w = SampleWindow::default();
        for i in (0..=20).rev() {
            w.push(i as f64);
        }
        let b = w.fenced_bounds().unwrap();
        assert!((b.lower - 1.0).abs() < 1e-9);
        assert!((b.upper - 19.0).abs() < 1e-9);
    }

    #[test]
    fn iqr_fence_clamps_outliers() {
        // Tight core with a fat tail: the 95th percentile is an outlier and
        // the fence (median + 4 * IQR) must pull it back.
        let mut sorted: Vec<f64> = (0..90).map(|i| 100.0 + (i % 10) as f64 * 0.1).collect();
        sorted.extend(std::iter::repeat(10_000.0).take(10));
        sorted.sort_by(|a, b| a.total_cmp(b));
        let b = PercentileBounds::from_sorted(&sorted).unwrap();
        assert!(b.p95 > 1_000.0);
        assert!(b.upper < 110.0, "upper = {}", b.upper);
        assert!((b.upper - (b.median + 4.0 * b.iqr)).abs() < 1e-9);
    }
}
