// =============================================================================
// Trading Modes — Sensitivity profiles for the analytics pipeline
// =============================================================================
//
// Every threshold and smoothing constant that depends on the user's trading
// horizon lives in one immutable `ModeProfile`. Nothing downstream carries an
// inline per-mode literal; components receive the profile of the active mode.
//
//   field            MarketMaker  SwingTrader  Investor
//   roc_window             2            4          6
//   regime_min_ticks       1            3          5
//   threshold_mult       0.3          1.5        5.0
//   prob_min_delta       1.0          2.0        4.0
//   norm_alpha          0.35         0.20       0.10
//   norm_step_max       0.10         0.06       0.04
//   norm_min_floor      0.02         0.03       0.05
// =============================================================================

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Named sensitivity profile selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    MarketMaker,
    SwingTrader,
    Investor,
}

impl Default for Mode {
    fn default() -> Self {
        Self::SwingTrader
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MarketMaker => write!(f, "MarketMaker"),
            Self::SwingTrader => write!(f, "SwingTrader"),
            Self::Investor => write!(f, "Investor"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "").as_str() {
            "marketmaker" | "mm" => Ok(Self::MarketMaker),
            "swingtrader" | "swing" => Ok(Self::SwingTrader),
            "investor" | "htf" => Ok(Self::Investor),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

impl Mode {
    /// Parse a mode name, falling back to `Investor` (the least sensitive
    /// profile) when the name is not recognised.
    pub fn parse_or_fallback(s: &str) -> Self {
        s.parse().unwrap_or_else(|e: String| {
            warn!(error = %e, "mode misconfigured, falling back to Investor");
            Self::Investor
        })
    }

    pub fn profile(self) -> &'static ModeProfile {
        match self {
            Self::MarketMaker => &MARKET_MAKER,
            Self::SwingTrader => &SWING_TRADER,
            Self::Investor => &INVESTOR,
        }
    }
}

/// Immutable per-mode constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModeProfile {
    pub mode: Mode,
    /// Number of consecutive deltas averaged into a rate of change.
    pub roc_window: usize,
    /// Consecutive agreeing ticks needed before a new regime is committed.
    pub regime_min_ticks: u32,
    /// Scales the relative regime thresholds (`tm`).
    pub threshold_mult: f64,
    /// Minimum alpha-score change (points) worth re-publishing.
    pub prob_min_delta: f64,
    /// EMA coefficient of the normaliser smoothing stage.
    pub norm_alpha: f64,
    /// Largest move the smoothed norm may make in one tick.
    pub norm_step_max: f64,
    /// Floor applied to calibrated smoothed norms.
    pub norm_min_floor: f64,
}

pub const MARKET_MAKER: ModeProfile = ModeProfile {
    mode: Mode::MarketMaker,
    roc_window: 2,
    regime_min_ticks: 1,
    threshold_mult: 0.3,
    prob_min_delta: 1.0,
    norm_alpha: 0.35,
    norm_step_max: 0.10,
    norm_min_floor: 0.02,
};

pub const SWING_TRADER: ModeProfile = ModeProfile {
    mode: Mode::SwingTrader,
    roc_window: 4,
    regime_min_ticks: 3,
    threshold_mult: 1.5,
    prob_min_delta: 2.0,
    norm_alpha: 0.20,
    norm_step_max: 0.06,
    norm_min_floor: 0.03,
};

pub const INVESTOR: ModeProfile = ModeProfile {
    mode: Mode::Investor,
    roc_window: 6,
    regime_min_ticks: 5,
    threshold_mult: 5.0,
    prob_min_delta: 4.0,
    norm_alpha: 0.10,
    norm_step_max: 0.04,
    norm_min_floor: 0.05,
};

impl ModeProfile {
    /// All profiles, most sensitive first.
    pub fn all() -> [&'static ModeProfile; 3] {
        [&MARKET_MAKER, &SWING_TRADER, &INVESTOR]
    }
}
