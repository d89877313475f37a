// =============================================================================
// Report Gate — Presentation throttle for the published alpha score
// =============================================================================
//
// The pipeline recomputes every tick; only the externally reported value is
// held back. A new value is published when any of:
//   - nothing has been published yet
//   - |score - last published| >= mode.prob_min_delta
//   - the label changed
//   - report_min_interval_ms elapsed since the last publication

use serde::{Deserialize, Serialize};

use crate::mode::ModeProfile;
use crate::signals::alpha_score::AlphaLabel;

pub const DEFAULT_REPORT_MIN_INTERVAL_MS: i64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Published {
    score: Option<u8>,
    label: AlphaLabel,
    at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportGate {
    min_interval_ms: i64,
    last: Option<Published>,
}

impl Default for ReportGate {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_MIN_INTERVAL_MS)
    }
}

impl ReportGate {
    pub fn new(min_interval_ms: i64) -> Self {
        Self {
            min_interval_ms: min_interval_ms.max(0),
            last: None,
        }
    }

    /// Decide whether `score`/`label` observed at `now_ms` is published, and
    /// record it if so.
    pub fn offer(
        &mut self,
        score: Option<u8>,
        label: AlphaLabel,
        now_ms: i64,
        profile: &ModeProfile,
    ) -> bool {
        let publish = match &self.last {
            None => true,
            Some(prev) => {
                let moved = match (score, prev.score) {
                    (Some(a), Some(b)) => {
                        (f64::from(a) - f64::from(b)).abs() >= profile.prob_min_delta
                    }
                    (None, None) => false,
                    _ => true,
                };
                moved || label != prev.label || now_ms - prev.at_ms >= self.min_interval_ms
            }
        };
        if publish {
            self.last = Some(Published {
                score,
                label,
                at_ms: now_ms,
            });
        }
        publish
    }

    /// Last published score.
    pub fn last_score(&self) -> Option<u8> {
        self.last.and_then(|p| p.score)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
