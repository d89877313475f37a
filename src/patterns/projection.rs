// =============================================================================
// LD Projection — Three-step decayed extrapolation
// =============================================================================
//
//   roc      = mean of the last <= 5 LD deltas
//   step k   = step k-1 + roc * 0.7^k        (k = 1, 2, 3)
//
// The decay keeps the forecast from running away on a single burst.

use crate::indicators::average_delta;

pub const PROJECTION_ROC_WINDOW: usize = 5;
pub const PROJECTION_DECAY: f64 = 0.7;
pub const PROJECTION_STEPS: usize = 3;

/// Project LD three ticks ahead. All zeros on an empty series.
pub fn project_ld(lds: &[f64]) -> [f64; PROJECTION_STEPS] {
    let Some(&last) = lds.last() else {
        return [0.0; PROJECTION_STEPS];
    };
    let roc = average_delta(lds, PROJECTION_ROC_WINDOW);

    let mut out = [last; PROJECTION_STEPS];
    let mut level = last;
    let mut decay = 1.0;
    for slot in out.iter_mut() {
        decay *= PROJECTION_DECAY;
        level += roc * decay;
        *slot = level;
    }
    out
}
