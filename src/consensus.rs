// =============================================================================
// Multi-Timeframe Consensus — MM / Swing / HTF bias blend
// =============================================================================
//
// Three independent biases on [-100, 100] read the same tick at different
// horizons:
//
//   MM     book microstructure: LD core (±60), BPR (±25), LD_ROC (±15),
//          cluster/velocity agreement (±15), pressure band (±10)
//   Swing  alpha deviation (±60), fair-value stretch (±25),
//          breakout/breakdown structure (±20)
//   HTF    regime baseline (±60), IFV stretch (±30), flow confirmation (±10)
//
// consensus  = sum(w_i * bias_i) under the selected weighting, clamped
// confidence = 100 * (1 - populationStd(biases) / 100), clamped to [0, 100]
// alignment  = Aligned / Split / Fractured over a ±10 neutral deadband

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::book::{extension, BookGeometry, VelocityType};
use crate::regime::{Classification, RegimeType};

const ALIGNMENT_DEADBAND: f64 = 10.0;

// =============================================================================
// Types
// =============================================================================

/// Blend profile across the three horizons (MM / Swing / HTF).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsensusWeighting {
    Aggressive,
    Conservative,
    Balanced,
}

impl Default for ConsensusWeighting {
    fn default() -> Self {
        Self::Balanced
    }
}

impl ConsensusWeighting {
    /// (mm, swing, htf) weights; each triple sums to 1.
    pub fn weights(self) -> (f64, f64, f64) {
        match self {
            Self::Aggressive => (0.55, 0.30, 0.15),
            Self::Conservative => (1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0),
            Self::Balanced => (0.40, 0.35, 0.25),
        }
    }
}

impl std::fmt::Display for ConsensusWeighting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aggressive => write!(f, "Aggressive"),
            Self::Conservative => write!(f, "Conservative"),
            Self::Balanced => write!(f, "Balanced"),
        }
    }
}

impl FromStr for ConsensusWeighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggressive" => Ok(Self::Aggressive),
            "conservative" => Ok(Self::Conservative),
            "balanced" => Ok(Self::Balanced),
            other => Err(format!("unknown consensus weighting: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alignment {
    /// All three biases in the same band.
    Aligned,
    /// Biases differ but none oppose each other.
    Split,
    /// A bullish and a bearish bias are both present.
    Fractured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidenceLabel {
    High,
    Med,
    Low,
}

impl ConfidenceLabel {
    pub fn from_confidence(c: f64) -> Self {
        if c >= 70.0 {
            Self::High
        } else if c >= 40.0 {
            Self::Med
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub mm_bias: f64,
    pub swing_bias: f64,
    pub htf_bias: f64,
    pub consensus: f64,
    pub confidence: f64,
    pub confidence_label: ConfidenceLabel,
    pub alignment: Alignment,
    pub weighting: ConsensusWeighting,
}

impl ConsensusResult {
    pub fn neutral(weighting: ConsensusWeighting) -> Self {
        compose(0.0, 0.0, 0.0, weighting)
    }
}

/// Every signal the three horizons read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusInputs {
    pub price: f64,
    pub ld: f64,
    pub ld_norm: f64,
    pub ld_roc: f64,
    /// Calibrated LD_ROC z-score.
    pub ld_roc_z: Option<f64>,
    pub bpr_ratio: f64,
    /// Sign of the cluster-weighted LD (+1 / -1 / 0).
    pub cluster_direction: f64,
    pub velocity: f64,
    pub velocity_type: VelocityType,
    pub alpha: f64,
    pub vwmp: Option<f64>,
    pub ifv: Option<f64>,
    pub geometry: BookGeometry,
    pub regime: Classification,
}

// =============================================================================
// Bias components
// =============================================================================

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Linearly remap `value` from `[in_lo, in_hi]` to `[out_lo, out_hi]`, clamped
/// to the output range.
fn remap(value: f64, in_lo: f64, in_hi: f64, out_lo: f64, out_hi: f64) -> f64 {
    let t = if (in_hi - in_lo).abs() < f64::EPSILON {
        0.5
    } else {
        (value - in_lo) / (in_hi - in_lo)
    };
    out_lo + t.clamp(0.0, 1.0) * (out_hi - out_lo)
}

fn ld_core(ld_norm: f64) -> f64 {
    let dev = ld_norm - 0.5;
    let mag = match dev.abs() {
        d if d >= 0.35 => 60.0,
        d if d >= 0.25 => 45.0,
        d if d >= 0.15 => 30.0,
        d if d >= 0.05 => 15.0,
        _ => 0.0,
    };
    sign(dev) * mag
}

fn bpr_tier(ratio: f64) -> f64 {
    match ratio {
        r if r >= 2.0 => 25.0,
        r if r >= 1.5 => 18.0,
        r if r >= 1.2 => 12.0,
        r if r >= 1.05 => 6.0,
        _ => 0.0,
    }
}

fn bpr_component(ratio: f64) -> f64 {
    if !ratio.is_finite() || ratio <= 0.0 {
        0.0
    } else if ratio >= 1.0 {
        bpr_tier(ratio)
    } else {
        -bpr_tier(1.0 / ratio)
    }
}

fn ld_roc_component(ld_roc: f64, z: Option<f64>) -> f64 {
    match z {
        Some(z) => (7.5 * z).clamp(-15.0, 15.0),
        None => 5.0 * sign(ld_roc),
    }
}

fn pressure_band(support_share: f64) -> f64 {
    if support_share > 0.60 {
        10.0
    } else if support_share > 0.55 {
        5.0
    } else if support_share < 0.40 {
        -10.0
    } else if support_share < 0.45 {
        -5.0
    } else {
        0.0
    }
}

/// Microstructure horizon.
pub fn mm_bias(i: &ConsensusInputs) -> f64 {
    let mut bias = ld_core(i.ld_norm)
        + bpr_component(i.bpr_ratio)
        + ld_roc_component(i.ld_roc, i.ld_roc_z)
        + pressure_band(i.geometry.support_share);

    // Far-band and sub-threshold velocity carry no directional vote.
    let flow = match i.velocity_type {
        VelocityType::AggressiveNear | VelocityType::Mixed => sign(i.velocity),
        VelocityType::SpoofFar | VelocityType::Neutral => 0.0,
    };
    let cluster = sign(i.cluster_direction);
    match (cluster, flow) {
        (c, f) if c != 0.0 && f != 0.0 && c == f => bias += 15.0 * c,
        (c, f) if c != 0.0 && f != 0.0 => {
            // Disagreement pulls toward zero without crossing it.
            let pull = bias.abs().min(10.0);
            bias -= sign(bias) * pull;
        }
        (c, f) => bias += 7.0 * (c + f),
    }

    bias.clamp(-100.0, 100.0)
}

fn structure_score(price: f64, g: &BookGeometry) -> f64 {
    let up_room = g.breakout_level.map(|p| ((p - price) / price).max(0.0));
    let down_room = g.breakdown_level.map(|p| ((price - p) / price).max(0.0));
    match (up_room, down_room) {
        (Some(up), Some(down)) if up + down > 0.0 => 20.0 * (up - down) / (up + down),
        (None, Some(_)) => 10.0,
        (Some(_), None) => -10.0,
        _ => 0.0,
    }
}

/// Swing horizon.
pub fn swing_bias(i: &ConsensusInputs) -> f64 {
    let alpha_dev = ((i.alpha - 50.0) * 1.2).clamp(-60.0, 60.0);

    let ifv_part = i
        .ifv
        .map(|_| remap(-extension(i.price, i.ifv), -0.05, 0.05, -20.0, 20.0))
        .unwrap_or(0.0);
    let vwmp_part = i
        .vwmp
        .map(|_| remap(-extension(i.price, i.vwmp), -0.03, 0.03, -5.0, 5.0))
        .unwrap_or(0.0);
    let stretch = (ifv_part + vwmp_part).clamp(-25.0, 25.0);

    (alpha_dev + stretch + structure_score(i.price, &i.geometry)).clamp(-100.0, 100.0)
}

fn regime_baseline(c: &Classification) -> f64 {
    let d = c.direction.sign();
    match c.regime {
        RegimeType::Trend => 60.0 * d,
        RegimeType::VacuumUp | RegimeType::VacuumDown => 50.0 * d,
        RegimeType::Expansion => 45.0 * d,
        RegimeType::Accumulation => 40.0,
        RegimeType::Distribution => -40.0,
        RegimeType::MeanReversion => 20.0 * d,
        RegimeType::Compression | RegimeType::Neutral => 0.0,
    }
}

/// Higher-timeframe horizon.
pub fn htf_bias(i: &ConsensusInputs) -> f64 {
    let baseline = regime_baseline(&i.regime);
    let stretch = i
        .ifv
        .map(|_| remap(-extension(i.price, i.ifv), -0.10, 0.10, -30.0, 30.0))
        .unwrap_or(0.0);

    let ld_sign = sign(i.ld);
    let base_sign = sign(baseline);
    let flow = if base_sign == 0.0 {
        5.0 * ld_sign
    } else if ld_sign == base_sign {
        10.0 * base_sign
    } else if ld_sign != 0.0 {
        -5.0 * base_sign
    } else {
        0.0
    };

    (baseline + stretch + flow).clamp(-100.0, 100.0)
}

// =============================================================================
// Composition
// =============================================================================

fn band(bias: f64) -> i8 {
    if bias > ALIGNMENT_DEADBAND {
        1
    } else if bias < -ALIGNMENT_DEADBAND {
        -1
    } else {
        0
    }
}

pub fn alignment(mm: f64, swing: f64, htf: f64) -> Alignment {
    let bands = [band(mm), band(swing), band(htf)];
    if bands.iter().all(|b| *b == bands[0]) {
        Alignment::Aligned
    } else if bands.contains(&1) && bands.contains(&-1) {
        Alignment::Fractured
    } else {
        Alignment::Split
    }
}

/// Population-std confidence of three biases.
pub fn confidence(mm: f64, swing: f64, htf: f64) -> f64 {
    let mean = (mm + swing + htf) / 3.0;
    let var = ((mm - mean).powi(2) + (swing - mean).powi(2) + (htf - mean).powi(2)) / 3.0;
    (100.0 * (1.0 - var.sqrt() / 100.0)).clamp(0.0, 100.0)
}

/// Blend three biases under `weighting`.
pub fn compose(mm: f64, swing: f64, htf: f64, weighting: ConsensusWeighting) -> ConsensusResult {
    let (wm, ws, wh) = weighting.weights();
    let consensus = (wm * mm + ws * swing + wh * htf).clamp(-100.0, 100.0);
    let confidence = confidence(mm, swing, htf);
    ConsensusResult {
        mm_bias: mm,
        swing_bias: swing,
        htf_bias: htf,
        consensus,
        confidence,
        confidence_label: ConfidenceLabel::from_confidence(confidence),
        alignment: alignment(mm, swing, htf),
        weighting,
    }
}

/// Compute all three biases and blend them.
pub fn analyze(inputs: &ConsensusInputs, weighting: ConsensusWeighting) -> ConsensusResult {
    let result = compose(mm_bias(inputs), swing_bias(inputs), htf_bias(inputs), weighting);

    debug!(
        mm = format!("{:.1}", result.mm_bias),
        swing = format!("{:.1}", result.swing_bias),
        htf = format!("{:.1}", result.htf_bias),
        consensus = format!("{:.1}", result.consensus),
        confidence = format!("{:.1}", result.confidence),
        alignment = ?result.alignment,
        "Consensus computed"
    );
    result
}
