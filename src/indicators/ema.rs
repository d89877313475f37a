// =============================================================================
// Exponential Moving Average (EMA) — Incremental state
// =============================================================================
//
// Streaming form of the EMA: one observation at a time, no look-back buffer.
//
// Formula:
//   EMA_t = EMA_{t-1} + alpha * (x_t - EMA_{t-1})
//
// The very first observation seeds the state directly, so a fresh EMA reports
// the first value it sees rather than a blend against zero.
// =============================================================================

use serde::{Deserialize, Serialize};

/// Incremental EMA with an unset initial value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmaState {
    value: Option<f64>,
    alpha: f64,
}

impl EmaState {
    /// Create an unset EMA. `alpha` is clamped into `(0, 1]`.
    pub fn new(alpha: f64) -> Self {
        Self {
            value: None,
            alpha: sanitize_alpha(alpha),
        }
    }

    /// Current value, or `None` before the first observation.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Change the coefficient without disturbing the current value.
    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = sanitize_alpha(alpha);
    }

    /// Feed one observation and return the updated value.
    ///
    /// Non-finite observations are ignored; the previous value (or the
    /// observation itself if unset and finite) is returned.
    pub fn update(&mut self, x: f64) -> Option<f64> {
        if !x.is_finite() {
            return self.value;
        }
        let next = match self.value {
            None => x,
            Some(prev) => prev + self.alpha * (x - prev),
        };
        self.value = Some(next);
        self.value
    }

    /// Feed one observation, limiting the per-tick move to `max_step`.
    pub fn update_clamped(&mut self, x: f64, max_step: f64) -> Option<f64> {
        if !x.is_finite() {
            return self.value;
        }
        let next = match self.value {
            None => x,
            Some(prev) => {
                let step = self.alpha * (x - prev);
                let limit = max_step.abs();
                prev + step.clamp(-limit, limit)
            }
        };
        self.value = Some(next);
        self.value
    }

    /// Return to the unset state.
    pub fn reset(&mut self) {
        self.value = None;
    }
}

fn sanitize_alpha(alpha: f64) -> f64 {
    if alpha.is_finite() && alpha > 0.0 {
        alpha.min(1.0)
    } else {
        1.0
    }
}
