// =============================================================================
// LD Divergence — Price extremes not confirmed by liquidity
// =============================================================================
//
// The last 3 entries are compared against the rest of the window (>= 3):
//
//   Bullish: price lower low  (recent min < prior min * (1 - 0.2%))
//            LD higher low    (recent min > prior min + 5)
//   Bearish: price higher high (recent max > prior max * (1 + 0.2%))
//            LD lower high     (recent max < prior max - 5)
//
// When the windowed test does not fire, a 3-sample check compares the last
// entry with the third-to-last.

use serde::{Deserialize, Serialize};

use crate::patterns::history::LdHistoryEntry;

const RECENT_LEN: usize = 3;
const MIN_PRIOR_LEN: usize = 3;
const PRICE_MARGIN: f64 = 0.002;
const LD_MARGIN: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Divergence {
    Bullish,
    Bearish,
    None,
}

#[derive(Debug, Clone, Copy)]
struct Extremes {
    price_low: f64,
    price_high: f64,
    ld_low: f64,
    ld_high: f64,
}

fn extremes(entries: &[LdHistoryEntry]) -> Extremes {
    entries.iter().fold(
        Extremes {
            price_low: f64::INFINITY,
            price_high: f64::NEG_INFINITY,
            ld_low: f64::INFINITY,
            ld_high: f64::NEG_INFINITY,
        },
        |acc, e| Extremes {
            price_low: acc.price_low.min(e.price),
            price_high: acc.price_high.max(e.price),
            ld_low: acc.ld_low.min(e.ld),
            ld_high: acc.ld_high.max(e.ld),
        },
    )
}

pub fn detect_divergence(entries: &[LdHistoryEntry]) -> Divergence {
    let n = entries.len();

    if n >= RECENT_LEN + MIN_PRIOR_LEN {
        let (prior, recent) = entries.split_at(n - RECENT_LEN);
        let p = extremes(prior);
        let r = extremes(recent);

        if r.price_low < p.price_low * (1.0 - PRICE_MARGIN) && r.ld_low > p.ld_low + LD_MARGIN {
            return Divergence::Bullish;
        }
        if r.price_high > p.price_high * (1.0 + PRICE_MARGIN) && r.ld_high < p.ld_high - LD_MARGIN {
            return Divergence::Bearish;
        }
    }

    if n >= 3 {
        let last = &entries[n - 1];
        let base = &entries[n - 3];
        if last.price < base.price && last.ld > base.ld {
            return Divergence::Bullish;
        }
        if last.price > base.price && last.ld < base.ld {
            return Divergence::Bearish;
        }
    }

    Divergence::None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(points: &[(f64, f64)]) -> Vec<LdHistoryEntry> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(price, ld))| LdHistoryEntry {
                time: i as i64,
                ld,
                price,
            })
            .collect()
    }

    #[test]
    fn windowed_bullish() {
        let e = series(&[
            (100.0, -50.0),
            (99.5, -60.0),
            (100.2, -20.0),
            (100.0, -10.0),
            (99.0, -30.0),
            (99.2, -25.0),
            (99.1, -28.0),
        ]);
        // Recent low 99.0 < 99.5 * 0.998, LD low -30 > -60 + 5.
        assert_eq!(detect_divergence(&e), Divergence::Bullish);
    }

    #[test]
    fn windowed_bearish() {
        let e = series(&[
            (100.0, 50.0),
            (101.0, 80.0),
            (100.5, 40.0),
            (102.0, 30.0),
            (101.9, 35.0),
            (102.1, 40.0),
        ]);
        assert_eq!(detect_divergence(&e), Divergence::Bearish);
    }

    #[test]
    fn three_sample_fallback() {
        let e = series(&[(100.0, 10.0), (99.9, 12.0), (99.8, 15.0)]);
        assert_eq!(detect_divergence(&e), Divergence::Bullish);
        let e = series(&[(100.0, 10.0), (100.1, 8.0), (100.2, 5.0)]);
        assert_eq!(detect_divergence(&e), Divergence::Bearish);
    }

    #[test]
    fn confirmed_move_is_not_divergent() {
        let e = series(&[(100.0, 10.0), (100.5, 20.0), (101.0, 30.0)]);
        assert_eq!(detect_divergence(&e), Divergence::None);
        assert_eq!(detect_divergence(&e[..2]), Divergence::None);
    }
}
