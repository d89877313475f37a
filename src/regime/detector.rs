// =============================================================================
// Microstructure Regime Detector
// =============================================================================
//
// Classifies the book into one of nine regimes from the pressure, fair-value,
// momentum and geometry signals of one tick. Thresholds marked (tm) scale with
// the mode's threshold multiplier.
//
// Detection hierarchy (evaluated top-to-bottom; first match wins):
//
//   1. VACUUM DOWN   — >= 3 support levels, support gap > 6%, support share < 40%
//   2. VACUUM UP     — mirror on the resistance side
//   3. EXPANSION     — |LD_ROC z| > 2.0 (calibrated) OR |bprRoc| > 0.10 (tm)
//                      OR |alphaRoc| > 3 (tm); direction of the trigger
//   4. COMPRESSION   — |vwmpExt|, both gaps < 0.02 (tm), |z| < 1.5,
//                      |bprRoc| < 0.05 (tm)
//   5. ACCUMULATION  — LD > 0, ldRoc > 0, price below VWMP and IFV, share > 55%
//   6. DISTRIBUTION  — LD < 0, ldRoc < 0, price above VWMP and IFV, share < 45%
//   7. TREND         — alpha > 65, ldRoc > 0, BPR > 1.1, ifvExt >= 0 (up)
//                      alpha < 35, ldRoc < 0, BPR < 0.9, ifvExt <= 0 (down)
//   8. MEAN REVERSION— 40 < alpha < 60 AND (|vwmpExt| > 3% OR |ifvExt| > 6%)
//
// If no rule fires, the regime is NEUTRAL.
//
// Hysteresis: a new (regime, direction) replaces the committed one only after
// `regime_min_ticks` consecutive agreeing ticks. A mode change clears the
// pending counter.

use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::book::{extension, BookGeometry};
use crate::mode::{Mode, ModeProfile};
use crate::types::Direction;

// =============================================================================
// Types
// =============================================================================

/// Discrete microstructure regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegimeType {
    /// Thin support far below price — downside air pocket.
    VacuumDown,
    /// Thin resistance far above price — upside air pocket.
    VacuumUp,
    /// Abnormal acceleration of flow or score.
    Expansion,
    /// Price pinned to fair value inside a tight book.
    Compression,
    /// Bids building while price trades below fair value.
    Accumulation,
    /// Asks building while price trades above fair value.
    Distribution,
    /// Score, flow and pressure aligned in one direction.
    Trend,
    /// Balanced score with price stretched from fair value.
    MeanReversion,
    Neutral,
}

impl std::fmt::Display for RegimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VacuumDown => write!(f, "VACUUM_DOWN"),
            Self::VacuumUp => write!(f, "VACUUM_UP"),
            Self::Expansion => write!(f, "EXPANSION"),
            Self::Compression => write!(f, "COMPRESSION"),
            Self::Accumulation => write!(f, "ACCUMULATION"),
            Self::Distribution => write!(f, "DISTRIBUTION"),
            Self::Trend => write!(f, "TREND"),
            Self::MeanReversion => write!(f, "MEAN_REVERSION"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// A regime together with its direction. Hysteresis runs on this pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    pub regime: RegimeType,
    pub direction: Direction,
}

impl Classification {
    pub const NEUTRAL: Self = Self {
        regime: RegimeType::Neutral,
        direction: Direction::Flat,
    };
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.direction {
            Direction::Flat => write!(f, "{}", self.regime),
            d => write!(f, "{}({})", self.regime, d),
        }
    }
}

/// Everything the rule matrix reads for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeInputs {
    pub price: f64,
    pub ld: f64,
    pub ld_roc: f64,
    /// Calibrated LD_ROC z-score, `None` during warm-up.
    pub ld_roc_z: Option<f64>,
    pub bpr_ratio: f64,
    pub bpr_roc: f64,
    pub alpha: f64,
    pub alpha_roc: f64,
    pub vwmp: Option<f64>,
    pub ifv: Option<f64>,
    pub geometry: BookGeometry,
}

impl RegimeInputs {
    pub fn vwmp_ext(&self) -> f64 {
        extension(self.price, self.vwmp)
    }

    pub fn ifv_ext(&self) -> f64 {
        extension(self.price, self.ifv)
    }

    fn z_or_zero(&self) -> f64 {
        self.ld_roc_z.unwrap_or(0.0)
    }
}

/// Effective thresholds for the active mode (reported as `thresholds_used`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    pub mode: Mode,
    pub threshold_mult: f64,
    pub min_ticks: u32,
    pub vacuum_min_levels: usize,
    pub vacuum_gap: f64,
    pub vacuum_share: f64,
    pub expansion_z: f64,
    pub expansion_bpr_roc: f64,
    pub expansion_alpha_roc: f64,
    pub compression_ext: f64,
    pub compression_z: f64,
    pub compression_bpr_roc: f64,
    pub accumulation_share: f64,
    pub distribution_share: f64,
    pub trend_alpha_high: f64,
    pub trend_alpha_low: f64,
    pub trend_bpr_high: f64,
    pub trend_bpr_low: f64,
    pub reversion_alpha_low: f64,
    pub reversion_alpha_high: f64,
    pub reversion_vwmp_ext: f64,
    pub reversion_ifv_ext: f64,
}

impl RegimeThresholds {
    pub fn for_profile(profile: &ModeProfile) -> Self {
        let tm = profile.threshold_mult;
        Self {
            mode: profile.mode,
            threshold_mult: tm,
            min_ticks: profile.regime_min_ticks,
            vacuum_min_levels: 3,
            vacuum_gap: 0.06,
            vacuum_share: 0.40,
            expansion_z: 2.0,
            expansion_bpr_roc: 0.10 * tm,
            expansion_alpha_roc: 3.0 * tm,
            compression_ext: 0.02 * tm,
            compression_z: 1.5,
            compression_bpr_roc: 0.05 * tm,
            accumulation_share: 0.55,
            distribution_share: 0.45,
            trend_alpha_high: 65.0,
            trend_alpha_low: 35.0,
            trend_bpr_high: 1.1,
            trend_bpr_low: 0.9,
            reversion_alpha_low: 40.0,
            reversion_alpha_high: 60.0,
            reversion_vwmp_ext: 0.03,
            reversion_ifv_ext: 0.06,
        }
    }
}

// =============================================================================
// Rule matrix
// =============================================================================

/// A rule returns the direction of the regime when it fires.
pub type RulePredicate = fn(&RegimeInputs, &RegimeThresholds) -> Option<Direction>;

/// Ordered rule matrix; the first rule that fires wins.
pub const RULES: [(RegimeType, RulePredicate); 8] = [
    (RegimeType::VacuumDown, vacuum_down),
    (RegimeType::VacuumUp, vacuum_up),
    (RegimeType::Expansion, expansion),
    (RegimeType::Compression, compression),
    (RegimeType::Accumulation, accumulation),
    (RegimeType::Distribution, distribution),
    (RegimeType::Trend, trend),
    (RegimeType::MeanReversion, mean_reversion),
];

fn vacuum_down(i: &RegimeInputs, t: &RegimeThresholds) -> Option<Direction> {
    let g = &i.geometry;
    (g.support_levels >= t.vacuum_min_levels
        && g.support_gap > t.vacuum_gap
        && g.support_share < t.vacuum_share)
        .then_some(Direction::Down)
}

fn vacuum_up(i: &RegimeInputs, t: &RegimeThresholds) -> Option<Direction> {
    let g = &i.geometry;
    (g.resist_levels >= t.vacuum_min_levels
        && g.resist_gap > t.vacuum_gap
        && (1.0 - g.support_share) < t.vacuum_share)
        .then_some(Direction::Up)
}

fn expansion(i: &RegimeInputs, t: &RegimeThresholds) -> Option<Direction> {
    if let Some(z) = i.ld_roc_z {
        if z.abs() > t.expansion_z {
            return Some(Direction::from_sign(z));
        }
    }
    if i.bpr_roc.abs() > t.expansion_bpr_roc {
        return Some(Direction::from_sign(i.bpr_roc));
    }
    if i.alpha_roc.abs() > t.expansion_alpha_roc {
        return Some(Direction::from_sign(i.alpha_roc));
    }
    None
}

fn compression(i: &RegimeInputs, t: &RegimeThresholds) -> Option<Direction> {
    let g = &i.geometry;
    (i.vwmp_ext().abs() < t.compression_ext
        && g.support_gap < t.compression_ext
        && g.resist_gap < t.compression_ext
        && i.z_or_zero().abs() < t.compression_z
        && i.bpr_roc.abs() < t.compression_bpr_roc)
        .then_some(Direction::Flat)
}

fn accumulation(i: &RegimeInputs, t: &RegimeThresholds) -> Option<Direction> {
    let below = |fv: Option<f64>| fv.is_some_and(|v| i.price < v);
    (i.ld > 0.0
        && i.ld_roc > 0.0
        && below(i.vwmp)
        && below(i.ifv)
        && i.geometry.support_share > t.accumulation_share)
        .then_some(Direction::Up)
}

fn distribution(i: &RegimeInputs, t: &RegimeThresholds) -> Option<Direction> {
    let above = |fv: Option<f64>| fv.is_some_and(|v| i.price > v);
    (i.ld < 0.0
        && i.ld_roc < 0.0
        && above(i.vwmp)
        && above(i.ifv)
        && i.geometry.support_share < t.distribution_share)
        .then_some(Direction::Down)
}

fn trend(i: &RegimeInputs, t: &RegimeThresholds) -> Option<Direction> {
    let ifv_ext = i.ifv_ext();
    if i.alpha > t.trend_alpha_high
        && i.ld_roc > 0.0
        && i.bpr_ratio > t.trend_bpr_high
        && ifv_ext >= 0.0
    {
        return Some(Direction::Up);
    }
    if i.alpha < t.trend_alpha_low
        && i.ld_roc < 0.0
        && i.bpr_ratio < t.trend_bpr_low
        && ifv_ext <= 0.0
    {
        return Some(Direction::Down);
    }
    None
}

fn mean_reversion(i: &RegimeInputs, t: &RegimeThresholds) -> Option<Direction> {
    if i.alpha <= t.reversion_alpha_low || i.alpha >= t.reversion_alpha_high {
        return None;
    }
    let vwmp_ext = i.vwmp_ext();
    let ifv_ext = i.ifv_ext();
    // Reverts toward whichever fair value is stretched.
    if vwmp_ext.abs() > t.reversion_vwmp_ext {
        Some(Direction::from_sign(-vwmp_ext))
    } else if ifv_ext.abs() > t.reversion_ifv_ext {
        Some(Direction::from_sign(-ifv_ext))
    } else {
        None
    }
}

/// Run the rule matrix (no hysteresis).
pub fn classify(inputs: &RegimeInputs, thresholds: &RegimeThresholds) -> Classification {
    for (regime, rule) in RULES.iter() {
        if let Some(direction) = rule(inputs, thresholds) {
            return Classification {
                regime: *regime,
                direction,
            };
        }
    }

    trace!(
        ld = format!("{:.3}", inputs.ld),
        ld_roc = format!("{:.3}", inputs.ld_roc),
        bpr = format!("{:.3}", inputs.bpr_ratio),
        alpha = format!("{:.1}", inputs.alpha),
        vwmp_ext = format!("{:.4}", inputs.vwmp_ext()),
        ifv_ext = format!("{:.4}", inputs.ifv_ext()),
        "Regime: no rule matched, defaulting to NEUTRAL"
    );
    Classification::NEUTRAL
}

// =============================================================================
// RegimeTracker (hysteresis)
// =============================================================================

/// Result reported for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeResult {
    /// Committed regime.
    pub regime: RegimeType,
    pub direction: Direction,
    /// Raw classification of this tick.
    pub detected: Classification,
    /// Classification accumulating agreement toward a commit.
    pub pending: Option<Classification>,
    pub pending_ticks: u32,
    pub thresholds_used: RegimeThresholds,
    /// No classification has been committed yet.
    pub analyzing: bool,
}

impl RegimeResult {
    pub fn committed(&self) -> Classification {
        Classification {
            regime: self.regime,
            direction: self.direction,
        }
    }
}

/// Committed / pending regime state for one context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeTracker {
    committed: Option<Classification>,
    pending: Option<Classification>,
    tick_count: u32,
    mode: Mode,
}

impl RegimeTracker {
    pub fn new(mode: Mode) -> Self {
        Self {
            committed: None,
            pending: None,
            tick_count: 0,
            mode,
        }
    }

    /// Classify `inputs` and apply hysteresis.
    pub fn update(&mut self, inputs: &RegimeInputs, profile: &ModeProfile) -> RegimeResult {
        let thresholds = RegimeThresholds::for_profile(profile);
        let detected = classify(inputs, &thresholds);
        self.observe(detected, profile);
        self.result(detected, thresholds)
    }

    /// Feed one raw classification through the hysteresis counter.
    pub fn observe(&mut self, detected: Classification, profile: &ModeProfile) {
        if profile.mode != self.mode {
            self.mode = profile.mode;
            self.clear_pending();
        }

        if self.committed == Some(detected) {
            self.clear_pending();
            return;
        }

        if self.pending == Some(detected) {
            self.tick_count = self.tick_count.saturating_add(1);
        } else {
            self.pending = Some(detected);
            self.tick_count = 1;
        }

        if self.tick_count >= profile.regime_min_ticks.max(1) {
            info!(
                from = %self.committed.unwrap_or(Classification::NEUTRAL),
                to = %detected,
                ticks = self.tick_count,
                mode = %self.mode,
                "Regime committed"
            );
            self.committed = Some(detected);
            self.clear_pending();
        }
    }

    /// Current state as a result, without a new observation.
    pub fn result(&self, detected: Classification, thresholds: RegimeThresholds) -> RegimeResult {
        let committed = self.committed.unwrap_or(Classification::NEUTRAL);
        RegimeResult {
            regime: committed.regime,
            direction: committed.direction,
            detected,
            pending: self.pending,
            pending_ticks: self.tick_count,
            thresholds_used: thresholds,
            analyzing: self.committed.is_none(),
        }
    }

    pub fn committed(&self) -> Option<Classification> {
        self.committed
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Adopt a new mode; agreement counted under old thresholds is dropped.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            self.mode = mode;
            self.clear_pending();
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.mode);
    }

    fn clear_pending(&mut self) {
        self.pending = None;
        self.tick_count = 0;
    }
}
