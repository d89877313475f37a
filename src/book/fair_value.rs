// =============================================================================
// Fair Value Estimators — Mid, VWMP, IFV
// =============================================================================
//
//   Mid  = (best bid + best ask) / 2
//   VWMP = (VWAP_bid * V_bid + VWAP_ask * V_ask) / (V_bid + V_ask)
//          over levels within ±range of price; both sides required
//   IFV  = VWAP of the ten heaviest levels (either side) within ±range
//
// Every estimator returns `Option<f64>`: `None` means "not enough book to say",
// never zero. Callers must handle the unavailable case explicitly.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::{Level, Side, Snapshot};

/// Default half-width of the fair-value range filter, as a fraction of price.
pub const DEFAULT_RANGE: f64 = 0.15;
/// Number of heaviest levels that make up the IFV.
pub const IFV_TOP_LEVELS: usize = 10;
/// Minimum positive-volume levels required for an IFV.
const IFV_MIN_LEVELS: usize = 2;

/// All fair-value estimates for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FairValues {
    pub mid: Option<f64>,
    pub vwmp: Option<f64>,
    pub ifv: Option<f64>,
}

impl FairValues {
    /// Run every estimator with the given range filter.
    pub fn estimate(snapshot: &Snapshot, range: f64) -> Self {
        Self {
            mid: mid_price(snapshot),
            vwmp: vwmp(snapshot, range),
            ifv: ifv(snapshot, range),
        }
    }
}

/// Midpoint between the highest support and the lowest resistance.
pub fn mid_price(snapshot: &Snapshot) -> Option<f64> {
    let best_bid = snapshot
        .supports()
        .map(|l| l.price)
        .max_by(|a, b| a.total_cmp(b))?;
    let best_ask = snapshot
        .resistances()
        .map(|l| l.price)
        .min_by(|a, b| a.total_cmp(b))?;
    Some((best_bid + best_ask) / 2.0)
}

/// Volume-weighted mid price over the in-range book.
pub fn vwmp(snapshot: &Snapshot, range: f64) -> Option<f64> {
    let in_range = levels_in_range(snapshot, range)?;

    let (bid_vwap, bid_vol) = side_vwap(&in_range, Side::Support)?;
    let (ask_vwap, ask_vol) = side_vwap(&in_range, Side::Resistance)?;

    let total = bid_vol + ask_vol;
    if total <= 0.0 {
        return None;
    }
    Some((bid_vwap * bid_vol + ask_vwap * ask_vol) / total)
}

/// Implied fair value: VWAP of the heaviest in-range levels.
pub fn ifv(snapshot: &Snapshot, range: f64) -> Option<f64> {
    let mut in_range: Vec<Level> = levels_in_range(snapshot, range)?
        .into_iter()
        .filter(|l| l.volume > 0.0)
        .collect();
    if in_range.len() < IFV_MIN_LEVELS {
        return None;
    }

    in_range.sort_by(|a, b| b.volume.total_cmp(&a.volume));
    in_range.truncate(IFV_TOP_LEVELS);

    vwap(&in_range)
}

/// Signed extension of `price` over a fair value: `(price - fv) / fv`.
///
/// Returns 0.0 when the fair value is unavailable.
pub fn extension(price: f64, fair_value: Option<f64>) -> f64 {
    match fair_value {
        Some(fv) if fv > 0.0 && price.is_finite() => (price - fv) / fv,
        _ => 0.0,
    }
}

fn levels_in_range(snapshot: &Snapshot, range: f64) -> Option<Vec<Level>> {
    if !snapshot.has_valid_price() {
        return None;
    }
    let price = snapshot.current_price;
    let range = if range.is_finite() && range > 0.0 {
        range
    } else {
        DEFAULT_RANGE
    };
    let lo = price * (1.0 - range);
    let hi = price * (1.0 + range);

    let levels: Vec<Level> = snapshot
        .levels
        .iter()
        .filter(|l| l.is_usable() && l.price >= lo && l.price <= hi)
        .copied()
        .collect();

    if levels.is_empty() {
        None
    } else {
        Some(levels)
    }
}

fn side_vwap(levels: &[Level], side: Side) -> Option<(f64, f64)> {
    let side_levels: Vec<Level> = levels.iter().filter(|l| l.side == side).copied().collect();
    let volume: f64 = side_levels.iter().map(|l| l.volume).sum();
    let price = vwap(&side_levels)?;
    Some((price, volume))
}

fn vwap(levels: &[Level]) -> Option<f64> {
    let volume: f64 = levels.iter().map(|l| l.volume).sum();
    if volume <= 0.0 {
        return None;
    }
    let notional: f64 = levels.iter().map(|l| l.price * l.volume).sum();
    Some(notional / volume)
}
