// =============================================================================
// Regime Detection Module
// =============================================================================
//
// Microstructure regime classification from book signals:
// - Ordered rule matrix (vacuums, expansion, compression, accumulation,
//   distribution, trend, mean reversion)
// - Per-mode thresholds scaled by the threshold multiplier
// - Hysteresis on (regime, direction)

pub mod detector;

pub use detector::{
    classify, Classification, RegimeInputs, RegimeResult, RegimeThresholds, RegimeTracker,
    RegimeType, RULES,
};
