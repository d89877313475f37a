// =============================================================================
// Alpha Score — Weighted blend of normalised book signals into 0..100
// =============================================================================
//
// Components (all in [0, 1], 0.5 = neutral):
//   ld    adaptive-normalised Liquidity Delta
//   bpr   adaptive-normalised Book Pressure Ratio
//   ifv   price vs IFV over a ±10% band, EMA-smoothed (price-scale alpha)
//   vwmp  price vs VWMP over a ±5% band
//
// Weighting:
//   base {ld .40, bpr .25, ifv .25, vwmp .10}
//   ld x0.5 / bpr x0.6 when uncalibrated or saturated (<0.05 or >0.95)
//   every weight floored at 15% of the pre-floor total, then renormalised
//
//   score = round(100 * sum(w_i * norm_i)), clamped to [0, 100]
//   label: <= 30 Bearish, >= 70 Bullish, else Neutral
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::mode::ModeProfile;
use crate::signals::normalizer::{NormalizedSignal, SignalSmoother};

/// Half-width of the VWMP extension band.
pub const VWMP_BAND: f64 = 0.05;
/// Half-width of the IFV extension band.
pub const IFV_BAND: f64 = 0.10;
/// Each weight is floored at this share of the pre-floor total.
pub const WEIGHT_FLOOR_SHARE: f64 = 0.15;

const BASE_WEIGHTS: ComponentWeights = ComponentWeights {
    ld: 0.40,
    bpr: 0.25,
    ifv: 0.25,
    vwmp: 0.10,
};
const LD_DISCOUNT: f64 = 0.5;
const BPR_DISCOUNT: f64 = 0.6;

/// The four normalised components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentNorms {
    pub ld: f64,
    pub bpr: f64,
    pub ifv: f64,
    pub vwmp: f64,
}

impl ComponentNorms {
    pub fn uniform(v: f64) -> Self {
        Self {
            ld: v,
            bpr: v,
            ifv: v,
            vwmp: v,
        }
    }
}

/// Blend weights over the four components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentWeights {
    pub ld: f64,
    pub bpr: f64,
    pub ifv: f64,
    pub vwmp: f64,
}

impl ComponentWeights {
    pub fn sum(&self) -> f64 {
        self.ld + self.bpr + self.ifv + self.vwmp
    }

    fn dot(&self, norms: &ComponentNorms) -> f64 {
        self.ld * norms.ld + self.bpr * norms.bpr + self.ifv * norms.ifv + self.vwmp * norms.vwmp
    }
}

/// Directional reading of the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlphaLabel {
    Bearish,
    Neutral,
    Bullish,
    /// No usable book yet.
    Analyzing,
}

impl AlphaLabel {
    pub fn from_score(score: u8) -> Self {
        if score <= 30 {
            Self::Bearish
        } else if score >= 70 {
            Self::Bullish
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for AlphaLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearish => write!(f, "Bearish"),
            Self::Neutral => write!(f, "Neutral"),
            Self::Bullish => write!(f, "Bullish"),
            Self::Analyzing => write!(f, "Analyzing"),
        }
    }
}

/// Output of one alpha-score computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlphaScoreResult {
    pub score: Option<u8>,
    pub label: AlphaLabel,
    pub component_norms: ComponentNorms,
    pub weights: ComponentWeights,
    /// Whether the report gate let this value through to presentation.
    pub published: bool,
}

impl AlphaScoreResult {
    pub fn analyzing() -> Self {
        Self {
            score: None,
            label: AlphaLabel::Analyzing,
            component_norms: ComponentNorms::uniform(0.5),
            weights: BASE_WEIGHTS,
            published: false,
        }
    }

    /// Score as a float, 50 while analyzing.
    pub fn score_f64(&self) -> f64 {
        self.score.map(f64::from).unwrap_or(50.0)
    }
}

/// Everything the composer needs for one tick.
#[derive(Debug, Clone, Copy)]
pub struct AlphaInputs<'a> {
    pub ld: &'a NormalizedSignal,
    pub bpr: &'a NormalizedSignal,
    pub price: f64,
    pub vwmp: Option<f64>,
    pub ifv: Option<f64>,
}

// =============================================================================
// Pure helpers
// =============================================================================

/// Map price-vs-fair-value onto [0, 1]: at fair value 0.5, `band` below fair
/// value 1.0, `band` above 0.0. Unavailable fair value maps to 0.5.
pub fn fair_value_norm(price: f64, fair_value: Option<f64>, band: f64) -> f64 {
    let ext = crate::book::extension(price, fair_value);
    if band <= 0.0 {
        return 0.5;
    }
    (0.5 - ext / (2.0 * band)).clamp(0.0, 1.0)
}

/// EMA coefficient for the IFV component: dearer instruments see more
/// asynchronous book noise, so they are smoothed harder.
pub fn ifv_alpha_for_price(price: f64) -> f64 {
    if price >= 1_000.0 {
        0.2
    } else if price >= 1.0 {
        0.3
    } else {
        0.4
    }
}

/// Discount, floor and renormalise the base weights.
pub fn compose_weights(
    norms: &ComponentNorms,
    ld_calibrated: bool,
    bpr_calibrated: bool,
) -> ComponentWeights {
    let degraded = |calibrated: bool, v: f64| !calibrated || !(0.05..=0.95).contains(&v);

    let mut w = BASE_WEIGHTS;
    if degraded(ld_calibrated, norms.ld) {
        w.ld *= LD_DISCOUNT;
    }
    if degraded(bpr_calibrated, norms.bpr) {
        w.bpr *= BPR_DISCOUNT;
    }

    let floor = w.sum() * WEIGHT_FLOOR_SHARE;
    w.ld = w.ld.max(floor);
    w.bpr = w.bpr.max(floor);
    w.ifv = w.ifv.max(floor);
    w.vwmp = w.vwmp.max(floor);

    let total = w.sum();
    ComponentWeights {
        ld: w.ld / total,
        bpr: w.bpr / total,
        ifv: w.ifv / total,
        vwmp: w.vwmp / total,
    }
}

/// Weighted score on 0..100.
pub fn compose_score(norms: &ComponentNorms, weights: &ComponentWeights) -> u8 {
    let raw = (100.0 * weights.dot(norms)).round();
    if raw.is_finite() {
        raw.clamp(0.0, 100.0) as u8
    } else {
        50
    }
}

// =============================================================================
// AlphaScorer
// =============================================================================

/// Per-context composer; owns the IFV smoothing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaScorer {
    ifv_smoother: SignalSmoother,
}

impl AlphaScorer {
    pub fn new(profile: &ModeProfile) -> Self {
        Self {
            ifv_smoother: SignalSmoother::from_profile(profile),
        }
    }

    /// Run the full composition for one tick.
    pub fn score(&mut self, inputs: AlphaInputs<'_>, profile: &ModeProfile) -> AlphaScoreResult {
        let vwmp_norm = fair_value_norm(inputs.price, inputs.vwmp, VWMP_BAND);

        self.ifv_smoother.apply_profile(profile);
        self.ifv_smoother.set_alpha(ifv_alpha_for_price(inputs.price));
        let ifv_raw = fair_value_norm(inputs.price, inputs.ifv, IFV_BAND);
        let ifv_norm = self.ifv_smoother.smooth(ifv_raw, inputs.ifv.is_some());

        let norms = ComponentNorms {
            ld: inputs.ld.value,
            bpr: inputs.bpr.value,
            ifv: ifv_norm,
            vwmp: vwmp_norm,
        };
        let weights = compose_weights(&norms, inputs.ld.calibrated, inputs.bpr.calibrated);
        let score = compose_score(&norms, &weights);

        trace!(
            ld = format!("{:.3}", norms.ld),
            bpr = format!("{:.3}", norms.bpr),
            ifv = format!("{:.3}", norms.ifv),
            vwmp = format!("{:.3}", norms.vwmp),
            score,
            "alpha score composed"
        );

        AlphaScoreResult {
            score: Some(score),
            label: AlphaLabel::from_score(score),
            component_norms: norms,
            weights,
            published: false,
        }
    }

    pub fn reset(&mut self) {
        self.ifv_smoother.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::SWING_TRADER;
    use proptest::prelude::*;

    fn signal(value: f64, calibrated: bool) -> NormalizedSignal {
        NormalizedSignal {
            value,
            mapped: value,
            calibrated,
            samples: if calibrated { 20 } else { 1 },
            bounds: None,
        }
    }

    #[test]
    fn all_zero_scores_zero_all_one_scores_hundred() {
        for (ld_cal, bpr_cal) in [(true, true), (false, false), (true, false)] {
            let zero = ComponentNorms::uniform(0.0);
            let w = compose_weights(&zero, ld_cal, bpr_cal);
            assert_eq!(compose_score(&zero, &w), 0);

            let one = ComponentNorms::uniform(1.0);
            let w = compose_weights(&one, ld_cal, bpr_cal);
            assert_eq!(compose_score(&one, &w), 100);
        }
    }

    #[test]
    fn base_weights_when_healthy() {
        // vwmp lifted 0.10 -> 0.15 by the floor, total 1.05.
        let w = compose_weights(&ComponentNorms::uniform(0.5), true, true);
        assert!((w.ld - 0.40 / 1.05).abs() < 1e-12);
        assert!((w.bpr - 0.25 / 1.05).abs() < 1e-12);
        assert!((w.ifv - 0.25 / 1.05).abs() < 1e-12);
        assert!((w.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn uncalibrated_components_are_discounted() {
        let healthy = compose_weights(&ComponentNorms::uniform(0.5), true, true);
        let cold = compose_weights(&ComponentNorms::uniform(0.5), false, false);
        assert!(cold.ld < healthy.ld);
        assert!(cold.bpr < healthy.bpr);
        assert!(cold.ifv > healthy.ifv);
    }

    #[test]
    fn saturated_component_is_discounted() {
        let mut norms = ComponentNorms::uniform(0.5);
        norms.ld = 0.99;
        let w = compose_weights(&norms, true, true);
        let healthy = compose_weights(&ComponentNorms::uniform(0.5), true, true);
        assert!(w.ld < healthy.ld);
    }

    #[test]
    fn vwmp_weight_is_floored() {
        let w = compose_weights(&ComponentNorms::uniform(0.5), true, true);
        let expected = 0.15 / 1.05;
        assert!((w.vwmp - expected).abs() < 1e-12, "vwmp = {}", w.vwmp);
    }

    #[test]
    fn labels() {
        assert_eq!(AlphaLabel::from_score(30), AlphaLabel::Bearish);
        assert_eq!(AlphaLabel::from_score(31), AlphaLabel::Neutral);
        assert_eq!(AlphaLabel::from_score(69), AlphaLabel::Neutral);
        assert_eq!(AlphaLabel::from_score(70), AlphaLabel::Bullish);
    }

    #[test]
    fn fair_value_norm_bands() {
        assert!((fair_value_norm(100.0, Some(100.0), VWMP_BAND) - 0.5).abs() < 1e-12);
        assert!((fair_value_norm(95.0, Some(100.0), VWMP_BAND) - 1.0).abs() < 1e-12);
        assert!((fair_value_norm(105.0, Some(100.0), VWMP_BAND) - 0.0).abs() < 1e-12);
        assert!((fair_value_norm(95.0, Some(100.0), IFV_BAND) - 0.75).abs() < 1e-12);
        assert_eq!(fair_value_norm(95.0, None, IFV_BAND), 0.5);
    }

    #[test]
    fn ifv_alpha_scales_with_price() {
        assert!(ifv_alpha_for_price(60_000.0) < ifv_alpha_for_price(50.0));
        assert!(ifv_alpha_for_price(50.0) < ifv_alpha_for_price(0.05));
    }

    #[test]
    fn scorer_produces_bullish_reading() {
        let mut scorer = AlphaScorer::new(&SWING_TRADER);
        let ld = signal(0.9, true);
        let bpr = signal(0.85, true);
        let r = scorer.score(
            AlphaInputs {
                ld: &ld,
                bpr: &bpr,
                price: 96.0,
                vwmp: Some(100.0),
                ifv: Some(100.0),
            },
            &SWING_TRADER,
        );
        assert!(r.score.unwrap() >= 70, "score = {:?}", r.score);
        assert_eq!(r.label, AlphaLabel::Bullish);
        assert!((r.weights.sum() - 1.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn weights_always_sum_to_one(
            ld in 0.0f64..=1.0,
            bpr in 0.0f64..=1.0,
            ifv in 0.0f64..=1.0,
            vwmp in 0.0f64..=1.0,
            ld_cal: bool,
            bpr_cal: bool,
        ) {
            let norms = ComponentNorms { ld, bpr, ifv, vwmp };
            let w = compose_weights(&norms, ld_cal, bpr_cal);
            prop_assert!((w.sum() - 1.0).abs() < 1e-9);
            let s = compose_score(&norms, &w);
            prop_assert!(s <= 100);
        }
    }
}
