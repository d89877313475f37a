// =============================================================================
// Flow Footprint — Absorption / displacement and spoof heuristics
// =============================================================================
//
// Absorption vs displacement compares the last two history entries:
//
//   price move  : |dP / P| > 0.1%
//   LD move     : |dLD|    > 10 units
//
//   price & LD same way        -> displacement_up / displacement_down
//   LD down, price not down    -> absorption_sell
//   LD up, price not up        -> absorption_buy
//   price moves, LD flat       -> displacement in the price direction
//   both flat                  -> absorption_neutral
//
// Spoof suspicion: over the last 6 entries, >= 3 reversals of LD (each leg
// > 10 units) while price stays within 0.1%. Book liquidity that flips back
// and forth without trading is being placed and pulled.

use serde::{Deserialize, Serialize};

use crate::patterns::history::LdHistoryEntry;
use crate::types::Direction;

pub const PRICE_MOVE_PCT: f64 = 0.001;
pub const LD_MOVE_UNITS: f64 = 10.0;
pub const SPOOF_LOOKBACK: usize = 6;
pub const SPOOF_MIN_REVERSALS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowFootprint {
    DisplacementUp,
    DisplacementDown,
    AbsorptionSell,
    AbsorptionBuy,
    AbsorptionNeutral,
}

fn price_direction(prev: &LdHistoryEntry, last: &LdHistoryEntry) -> Direction {
    let change = (last.price - prev.price) / prev.price;
    if change > PRICE_MOVE_PCT {
        Direction::Up
    } else if change < -PRICE_MOVE_PCT {
        Direction::Down
    } else {
        Direction::Flat
    }
}

fn ld_direction(prev: &LdHistoryEntry, last: &LdHistoryEntry) -> Direction {
    let change = last.ld - prev.ld;
    if change > LD_MOVE_UNITS {
        Direction::Up
    } else if change < -LD_MOVE_UNITS {
        Direction::Down
    } else {
        Direction::Flat
    }
}

/// Classify the latest tick-over-tick move; `None` with fewer than 2 entries.
pub fn classify_footprint(entries: &[LdHistoryEntry]) -> Option<FlowFootprint> {
    let [.., prev, last] = entries else {
        return None;
    };
    let price = price_direction(prev, last);
    let ld = ld_direction(prev, last);

    let footprint = match (price, ld) {
        (Direction::Up, Direction::Up) => FlowFootprint::DisplacementUp,
        (Direction::Down, Direction::Down) => FlowFootprint::DisplacementDown,
        (_, Direction::Down) => FlowFootprint::AbsorptionSell,
        (_, Direction::Up) => FlowFootprint::AbsorptionBuy,
        (Direction::Up, Direction::Flat) => FlowFootprint::DisplacementUp,
        (Direction::Down, Direction::Flat) => FlowFootprint::DisplacementDown,
        (Direction::Flat, Direction::Flat) => FlowFootprint::AbsorptionNeutral,
    };
    Some(footprint)
}

/// LD flipping back and forth while price stands still.
pub fn spoof_pattern(entries: &[LdHistoryEntry]) -> bool {
    let skip = entries.len().saturating_sub(SPOOF_LOOKBACK);
    let tail = &entries[skip..];
    if tail.len() < SPOOF_MIN_REVERSALS + 1 {
        return false;
    }

    let (lo, hi) = tail.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), e| {
        (lo.min(e.price), hi.max(e.price))
    });
    if lo <= 0.0 || (hi - lo) / lo > PRICE_MOVE_PCT {
        return false;
    }

    let legs: Vec<f64> = tail.windows(2).map(|w| w[1].ld - w[0].ld).collect();
    let reversals = legs
        .windows(2)
        .filter(|w| {
            w[0].abs() > LD_MOVE_UNITS
                && w[1].abs() > LD_MOVE_UNITS
                && w[0].signum() != w[1].signum()
        })
        .count();
    reversals >= SPOOF_MIN_REVERSALS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(p0: f64, ld0: f64, p1: f64, ld1: f64) -> Vec<LdHistoryEntry> {
        vec![
            LdHistoryEntry {
                time: 0,
                ld: ld0,
                price: p0,
            },
            LdHistoryEntry {
                time: 1,
                ld: ld1,
                price: p1,
            },
        ]
    }

    #[test]
    fn footprint_mapping() {
        use FlowFootprint::*;
        assert_eq!(classify_footprint(&pair(100.0, 0.0, 100.5, 30.0)), Some(DisplacementUp));
        assert_eq!(classify_footprint(&pair(100.0, 0.0, 99.5, -30.0)), Some(DisplacementDown));
        assert_eq!(classify_footprint(&pair(100.0, 0.0, 100.0, -30.0)), Some(AbsorptionSell));
        assert_eq!(classify_footprint(&pair(100.0, 0.0, 100.5, -30.0)), Some(AbsorptionSell));
        assert_eq!(classify_footprint(&pair(100.0, 0.0, 100.0, 30.0)), Some(AbsorptionBuy));
        assert_eq!(classify_footprint(&pair(100.0, 0.0, 99.5, 30.0)), Some(AbsorptionBuy));
        assert_eq!(classify_footprint(&pair(100.0, 0.0, 100.5, 5.0)), Some(DisplacementUp));
        assert_eq!(classify_footprint(&pair(100.0, 0.0, 99.5, 5.0)), Some(DisplacementDown));
        assert_eq!(classify_footprint(&pair(100.0, 0.0, 100.05, 5.0)), Some(AbsorptionNeutral));
    }

    #[test]
    fn footprint_needs_two_entries() {
        assert_eq!(classify_footprint(&pair(100.0, 0.0, 100.0, 0.0)[..1]), None);
    }

    #[test]
    fn flickering_ld_on_flat_price_is_spoof() {
        let e: Vec<LdHistoryEntry> = [0.0, 40.0, -10.0, 35.0, -15.0, 30.0]
            .iter()
            .enumerate()
            .map(|(i, &ld)| LdHistoryEntry {
                time: i as i64,
                ld,
                price: 100.0 + (i % 2) as f64 * 0.02,
            })
            .collect();
        assert!(spoof_pattern(&e));
    }

    #[test]
    fn flickering_with_price_movement_is_not_spoof() {
        let e: Vec<LdHistoryEntry> = [0.0, 40.0, -10.0, 35.0, -15.0, 30.0]
            .iter()
            .enumerate()
            .map(|(i, &ld)| LdHistoryEntry {
                time: i as i64,
                ld,
                price: 100.0 + i as f64,
            })
            .collect();
        assert!(!spoof_pattern(&e));
    }
}
