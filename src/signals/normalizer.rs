// =============================================================================
// Adaptive Normalizer — Self-calibrating [0, 1] mapping for raw book signals
// =============================================================================
//
// BPR and LD magnitudes differ by orders of magnitude between assets, so the
// mapping onto [0, 1] is learned from each context's own recent history:
//
//   1. Append the raw value to a bounded window (500 samples, drop-oldest).
//   2. < 20 samples: linear map over a fixed legacy range.
//      >= 20 samples: linear map between the IQR-fenced 5th/95th percentiles,
//      then smoothstep  s(x) = x^2 * (3 - 2x).
//   3. EMA with a per-tick step clamp (mode-dependent alpha / step).
//   4. Once calibrated, floor the smoothed output at the mode minimum.
//
// Steps 3-4 are the `SignalSmoother`, shared with the IFV component of the
// alpha score.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::indicators::{EmaState, PercentileBounds, SampleWindow};
use crate::mode::ModeProfile;

/// Fixed linear range used before a window is calibrated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegacyRange {
    pub lo: f64,
    pub hi: f64,
}

impl LegacyRange {
    pub const BPR: Self = Self { lo: 0.0, hi: 2.0 };
    pub const LD: Self = Self {
        lo: -100.0,
        hi: 100.0,
    };

    pub fn map(&self, raw: f64) -> f64 {
        linear_unit(raw, self.lo, self.hi)
    }
}

/// Cubic smoothstep on [0, 1].
pub fn smoothstep(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

/// Map `raw` from `[lo, hi]` onto `[0, 1]`, clamped. A collapsed span maps to
/// the midpoint.
fn linear_unit(raw: f64, lo: f64, hi: f64) -> f64 {
    let span = hi - lo;
    if !raw.is_finite() || !span.is_finite() || span.abs() <= f64::EPSILON * lo.abs().max(1.0) {
        return 0.5;
    }
    ((raw - lo) / span).clamp(0.0, 1.0)
}

// =============================================================================
// SignalSmoother
// =============================================================================

/// EMA + step clamp + calibrated floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSmoother {
    ema: EmaState,
    step_max: f64,
    min_floor: f64,
}

impl SignalSmoother {
    pub fn new(alpha: f64, step_max: f64, min_floor: f64) -> Self {
        Self {
            ema: EmaState::new(alpha),
            step_max,
            min_floor,
        }
    }

    pub fn from_profile(profile: &ModeProfile) -> Self {
        Self::new(profile.norm_alpha, profile.norm_step_max, profile.norm_min_floor)
    }

    /// Adopt a profile's smoothing constants, keeping the current value.
    pub fn apply_profile(&mut self, profile: &ModeProfile) {
        self.ema.set_alpha(profile.norm_alpha);
        self.step_max = profile.norm_step_max;
        self.min_floor = profile.norm_min_floor;
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.ema.set_alpha(alpha);
    }

    /// Smooth `target` and return the (possibly floored) output.
    pub fn smooth(&mut self, target: f64, calibrated: bool) -> f64 {
        let value = self
            .ema
            .update_clamped(target, self.step_max)
            .unwrap_or(0.5);
        if calibrated {
            value.max(self.min_floor)
        } else {
            value
        }
    }

    /// Last smoothed value before flooring.
    pub fn value(&self) -> Option<f64> {
        self.ema.value()
    }

    pub fn reset(&mut self) {
        self.ema.reset();
    }
}

// =============================================================================
// AdaptiveNormalizer
// =============================================================================

/// One normalised observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSignal {
    /// Smoothed output in [0, 1].
    pub value: f64,
    /// Pre-smoothing mapped value in [0, 1].
    pub mapped: f64,
    pub calibrated: bool,
    pub samples: usize,
    pub bounds: Option<PercentileBounds>,
}

impl NormalizedSignal {
    /// Norm pinned against either end of the range.
    pub fn is_saturated(&self) -> bool {
        self.value < 0.05 || self.value > 0.95
    }
}

/// Rolling-percentile normaliser for one raw signal of one context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveNormalizer {
    window: SampleWindow,
    smoother: SignalSmoother,
    fallback: LegacyRange,
}

impl AdaptiveNormalizer {
    pub fn new(fallback: LegacyRange, profile: &ModeProfile) -> Self {
        Self {
            window: SampleWindow::default(),
            smoother: SignalSmoother::from_profile(profile),
            fallback,
        }
    }

    pub fn for_bpr(profile: &ModeProfile) -> Self {
        Self::new(LegacyRange::BPR, profile)
    }

    pub fn for_ld(profile: &ModeProfile) -> Self {
        Self::new(LegacyRange::LD, profile)
    }

    /// Absorb `raw` and return its normalised, smoothed value.
    pub fn normalize(&mut self, raw: f64, profile: &ModeProfile) -> NormalizedSignal {
        self.smoother.apply_profile(profile);
        self.window.push(raw);

        let bounds = self.window.fenced_bounds();
        let mapped = match &bounds {
            Some(b) => smoothstep(linear_unit(raw, b.lower, b.upper)),
            None => self.fallback.map(raw),
        };
        let calibrated = bounds.is_some();
        let value = self.smoother.smooth(mapped, calibrated);

        NormalizedSignal {
            value,
            mapped,
            calibrated,
            samples: self.window.len(),
            bounds,
        }
    }

    pub fn samples(&self) -> usize {
        self.window.len()
    }

    pub fn is_calibrated(&self) -> bool {
        self.window.is_calibrated()
    }

    /// Discard every sample and the smoothing state.
    pub fn reset(&mut self) {
        self.window.clear();
        self.smoother.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{INVESTOR, MARKET_MAKER, SWING_TRADER};
    use proptest::prelude::*;

    #[test]
    fn smoothstep_endpoints_and_midpoint() {
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(1.0), 1.0);
        assert!((smoothstep(0.5) - 0.5).abs() < 1e-12);
        assert!((smoothstep(0.25) - 0.15625).abs() < 1e-12);
        assert_eq!(smoothstep(-3.0), 0.0);
    }

    #[test]
    fn uses_legacy_range_before_calibration() {
        let mut n = AdaptiveNormalizer::for_bpr(&MARKET_MAKER);
        let s = n.normalize(1.5, &MARKET_MAKER);
        assert!(!s.calibrated);
        assert!(s.bounds.is_none());
        assert!((s.mapped - 0.75).abs() < 1e-12);
        // First observation seeds the EMA.
        assert!((s.value - 0.75).abs() < 1e-12);
    }

    #[test]
    fn calibrates_at_twenty_samples() {
        let mut n = AdaptiveNormalizer::for_ld(&SWING_TRADER);
        for i in 0..19 {
            assert!(!n.normalize(i as f64, &SWING_TRADER).calibrated);
        }
        let s = n.normalize(19.0, &SWING_TRADER);
        assert!(s.calibrated);
        assert_eq!(s.samples, 20);
    }

    #[test]
    fn step_is_clamped_per_tick() {
        let mut n = AdaptiveNormalizer::for_bpr(&INVESTOR);
        n.normalize(0.0, &INVESTOR);
        let s = n.normalize(2.0, &INVESTOR);
        // mapped jumps 0 -> 1 but the smoothed value moves at most one step.
        assert!((s.mapped - 1.0).abs() < 1e-12);
        assert!(s.value <= INVESTOR.norm_step_max + 1e-12);
    }

    #[test]
    fn calibrated_output_is_floored() {
        let mut n = AdaptiveNormalizer::for_ld(&MARKET_MAKER);
        for i in 0..100 {
            n.normalize(i as f64, &MARKET_MAKER);
        }
        // Sit on the lower percentile bound so the mapped value is exactly 0.
        let mut last = n.normalize(-50.0, &MARKET_MAKER);
        for _ in 0..30 {
            last = n.normalize(-50.0, &MARKET_MAKER);
        }
        assert!(last.calibrated);
        assert_eq!(last.mapped, 0.0);
        assert!((last.value - MARKET_MAKER.norm_min_floor).abs() < 1e-9);
    }

    #[test]
    fn repeated_value_stops_drifting() {
        let mut n = AdaptiveNormalizer::for_bpr(&MARKET_MAKER);
        let mut prev = 0.0;
        let mut last = 0.0;
        for _ in 0..300 {
            prev = last;
            last = n.normalize(1.3, &MARKET_MAKER).value;
        }
        assert!((last - prev).abs() < 1e-9);
    }

    #[test]
    fn reset_returns_to_fallback() {
        let mut n = AdaptiveNormalizer::for_ld(&MARKET_MAKER);
        for i in 0..30 {
            n.normalize(i as f64, &MARKET_MAKER);
        }
        assert!(n.is_calibrated());
        n.reset();
        assert_eq!(n.samples(), 0);
        assert!(!n.normalize(5.0, &MARKET_MAKER).calibrated);
    }

    proptest! {
        #[test]
        fn output_stays_in_unit_interval(values in prop::collection::vec(-1e6f64..1e6, 1..120)) {
            let mut n = AdaptiveNormalizer::for_ld(&SWING_TRADER);
            for v in values {
                let s = n.normalize(v, &SWING_TRADER);
                prop_assert!(s.value >= 0.0 && s.value <= 1.0);
                prop_assert!(s.mapped >= 0.0 && s.mapped <= 1.0);
            }
        }
    }
}
