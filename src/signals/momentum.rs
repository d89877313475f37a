// =============================================================================
// Momentum Tracker — LD / BPR / alpha rate of change
// =============================================================================
//
// Every series uses the same average-delta ROC over the mode's window
// (MM 2, Swing 4, Investor 6 ticks). Raw LD_ROC is additionally scored by an
// EMA z-score so that "expansion" is judged relative to the asset's own LD
// scale rather than a fixed threshold.

use serde::{Deserialize, Serialize};

use crate::indicators::{RocTracker, ZScore, ZScoreState};
use crate::mode::ModeProfile;

/// Largest ROC window any mode asks for.
const MAX_ROC_WINDOW: usize = 6;

/// One tick of momentum readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumReading {
    pub ld_roc: f64,
    pub ld_roc_z: ZScore,
    /// ROC of the raw BPR ratio.
    pub bpr_roc: f64,
    /// ROC of the alpha score, in score points.
    pub alpha_roc: f64,
}

impl MomentumReading {
    /// The z-value, or 0 while still warming up.
    pub fn ld_roc_z_or_zero(&self) -> f64 {
        self.ld_roc_z.calibrated_value().unwrap_or(0.0)
    }
}

impl Default for MomentumReading {
    fn default() -> Self {
        Self {
            ld_roc: 0.0,
            ld_roc_z: ZScore {
                z: 0.0,
                calibrated: false,
            },
            bpr_roc: 0.0,
            alpha_roc: 0.0,
        }
    }
}

/// Per-context ROC state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumTracker {
    ld: RocTracker,
    ld_z: ZScoreState,
    bpr: RocTracker,
    alpha: RocTracker,
}

impl Default for MomentumTracker {
    fn default() -> Self {
        Self {
            ld: RocTracker::new(MAX_ROC_WINDOW),
            ld_z: ZScoreState::default(),
            bpr: RocTracker::new(MAX_ROC_WINDOW),
            alpha: RocTracker::new(MAX_ROC_WINDOW),
        }
    }
}

impl MomentumTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push the book-side series and return LD/BPR momentum. Alpha ROC is
    /// filled in by [`MomentumTracker::update_alpha`] once the score exists.
    pub fn update_book(
        &mut self,
        ld: f64,
        bpr_ratio: f64,
        profile: &ModeProfile,
    ) -> MomentumReading {
        let window = profile.roc_window;
        let ld_roc = self.ld.push(ld, window);
        let ld_roc_z = self.ld_z.update(ld_roc);
        let bpr_roc = self.bpr.push(bpr_ratio, window);
        MomentumReading {
            ld_roc,
            ld_roc_z,
            bpr_roc,
            alpha_roc: self.alpha.roc(window),
        }
    }

    /// Push an alpha score and return its ROC.
    pub fn update_alpha(&mut self, score: f64, profile: &ModeProfile) -> f64 {
        self.alpha.push(score, profile.roc_window)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{INVESTOR, MARKET_MAKER, SWING_TRADER};

    #[test]
    fn test_ld_roc_uses_mode_window() {
        let mut mm = MomentumTracker::new();
        let mut inv = MomentumTracker::new();
        let series = [0.0, 0.0, 0.0, 0.0, 10.0, 30.0, 60.0];
        let mut last_mm = MomentumReading::default();
        let mut last_inv = MomentumReading::default();
        for ld in series {
            last_mm = mm.update_book(ld, 1.0, &MARKET_MAKER);
            last_inv = inv.update_book(ld, 1.0, &INVESTOR);
        }
        // MM window 2: (60 - 10) / 2 = 25.
        assert!((last_mm.ld_roc - 25.0).abs() < 1e-12);
        // Investor window 6: (60 - 0) / 6 = 10.
        assert!((last_inv.ld_roc - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_repeated_input_has_zero_roc() {
        let mut t = MomentumTracker::new();
        let mut last = MomentumReading::default();
        for _ in 0..10 {
            last = t.update_book(42.0, 1.3, &SWING_TRADER);
            t.update_alpha(61.0, &SWING_TRADER);
        }
        assert_eq!(last.ld_roc, 0.0);
        assert_eq!(last.bpr_roc, 0.0);
        assert_eq!(t.update_alpha(61.0, &SWING_TRADER), 0.0);
    }

    #[test]
    fn test_z_warms_up() {
        let mut t = MomentumTracker::new();
        for i in 0..14 {
            let r = t.update_book(i as f64, 1.0, &MARKET_MAKER);
            assert!(!r.ld_roc_z.calibrated);
            assert_eq!(r.ld_roc_z_or_zero(), 0.0);
        }
        assert!(t.update_book(14.0, 1.0, &MARKET_MAKER).ld_roc_z.calibrated);
    }

    #[test]
    fn test_spike_scores_high_z() {
        let mut t = MomentumTracker::new();
        for i in 0..40 {
            // Small alternating wiggle.
            let ld = if i % 2 == 0 { 1.0 } else { -1.0 };
            t.update_book(ld, 1.0, &MARKET_MAKER);
        }
        let r = t.update_book(400.0, 1.0, &MARKET_MAKER);
        assert!(r.ld_roc_z.calibrated);
        assert!(r.ld_roc_z.z > 2.0, "z = {}", r.ld_roc_z.z);
    }
}
