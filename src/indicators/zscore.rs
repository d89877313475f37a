// =============================================================================
// Running Z-Score — EMA mean / EMA variance
// =============================================================================
//
// Scale-free standardisation of a noisy stream. Each observation is scored
// against the statistics accumulated *before* it, then folded in:
//
//   z_t     = (x_t - mean_{t-1}) / sqrt(var_{t-1})
//   d       = x_t - mean_{t-1}
//   mean_t  = mean_{t-1} + alpha * d
//   var_t   = (1 - alpha) * (var_{t-1} + alpha * d^2)
//
// The variance starts at 1.0 and the mean at 0.0, so early z-values are only
// meaningful once `warmup_min` observations have been absorbed.
// =============================================================================

use serde::{Deserialize, Serialize};

/// Default EMA coefficient.
pub const DEFAULT_ALPHA: f64 = 0.1;
/// Observations required before a z-value is reported as calibrated.
pub const DEFAULT_WARMUP: u32 = 15;

const MIN_STD: f64 = 1e-12;

/// Running z-score accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZScoreState {
    pub alpha: f64,
    pub ema_mean: f64,
    pub ema_var: f64,
    pub warmup_count: u32,
    pub warmup_min: u32,
}

/// One scored observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZScore {
    pub z: f64,
    pub calibrated: bool,
}

impl ZScore {
    /// The z-value when calibrated, otherwise `None`.
    pub fn calibrated_value(&self) -> Option<f64> {
        self.calibrated.then_some(self.z)
    }
}

impl ZScoreState {
    pub fn new(alpha: f64, warmup_min: u32) -> Self {
        Self {
            alpha,
            ema_mean: 0.0,
            ema_var: 1.0,
            warmup_count: 0,
            warmup_min,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.warmup_count >= self.warmup_min
    }

    /// Score `x` against the current statistics, then absorb it.
    pub fn update(&mut self, x: f64) -> ZScore {
        if !x.is_finite() {
            return ZScore {
                z: 0.0,
                calibrated: self.is_calibrated(),
            };
        }

        let diff = x - self.ema_mean;
        let std = self.ema_var.max(0.0).sqrt();
        let z = if diff == 0.0 {
            0.0
        } else {
            diff / std.max(MIN_STD)
        };

        self.ema_mean += self.alpha * diff;
        self.ema_var = (1.0 - self.alpha) * (self.ema_var + self.alpha * diff * diff);
        self.warmup_count = self.warmup_count.saturating_add(1);

        ZScore {
            z,
            calibrated: self.is_calibrated(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.alpha, self.warmup_min);
    }
}

impl Default for ZScoreState {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA, DEFAULT_WARMUP)
    }
}
