// =============================================================================
// Book Pressure — BPR and distance-weighted Liquidity Delta
// =============================================================================
//
// BPR (Book Pressure Ratio):
//   ratio = sum(support volume) / sum(resistance volume)     (1.0 if denom = 0)
//
// LD (Liquidity Delta):
//   delta = sum_i side_i * volume_i / (1 + distance_pct_i)
//   side = +1 for support, -1 for resistance
//
// LD velocity view:
//   weight = exp(-distance_pct / 2), near band = within 1% of price,
//   far band contributions discounted x0.3.
//
// All functions are pure and total: empty or degenerate snapshots yield the
// neutral defaults (ratio 1, delta 0) rather than an error.
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::{Level, Side, Snapshot};

/// Distance (percent of price) separating the near and far velocity bands.
pub const NEAR_BAND_PCT: f64 = 1.0;
/// Discount applied to far-band velocity contributions.
pub const FAR_BAND_DISCOUNT: f64 = 0.3;
/// One band must exceed the other by this factor to dominate.
pub const DOMINANCE_RATIO: f64 = 1.5;
/// Minimum band magnitude for a non-neutral velocity classification.
pub const MIN_VELOCITY_MAGNITUDE: f64 = 10.0;

/// Book Pressure Ratio with its components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookPressure {
    pub ratio: f64,
    pub bid_volume: f64,
    pub ask_volume: f64,
}

impl Default for BookPressure {
    fn default() -> Self {
        Self {
            ratio: 1.0,
            bid_volume: 0.0,
            ask_volume: 0.0,
        }
    }
}

/// Where the directional book pressure is concentrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityType {
    /// Pressure sits close to price — likely to be executed.
    AggressiveNear,
    /// Pressure sits far from price — cheap to pull, possibly spoofed.
    SpoofFar,
    /// Both bands carry comparable pressure.
    Mixed,
    /// Too little pressure to classify.
    Neutral,
}

impl std::fmt::Display for VelocityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AggressiveNear => write!(f, "aggressive_near"),
            Self::SpoofFar => write!(f, "spoof_far"),
            Self::Mixed => write!(f, "mixed"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Exponential-decay view of the liquidity delta split into bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LdVelocity {
    pub near_delta: f64,
    /// Far-band delta, already discounted.
    pub far_delta: f64,
    pub velocity: f64,
    pub velocity_type: VelocityType,
}

impl Default for LdVelocity {
    fn default() -> Self {
        Self {
            near_delta: 0.0,
            far_delta: 0.0,
            velocity: 0.0,
            velocity_type: VelocityType::Neutral,
        }
    }
}

/// Distance-weighted liquidity delta plus its velocity view.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LiquidityDelta {
    pub delta: f64,
    pub velocity: LdVelocity,
}

/// Compute the Book Pressure Ratio over every usable level of the snapshot.
pub fn calc_bpr(snapshot: &Snapshot) -> BookPressure {
    let (bid_volume, ask_volume) = snapshot
        .levels
        .iter()
        .filter(|l| l.is_usable())
        .fold((0.0_f64, 0.0_f64), |(bid, ask), l| match l.side {
            Side::Support => (bid + l.volume, ask),
            Side::Resistance => (bid, ask + l.volume),
        });

    let ratio = if ask_volume > 0.0 {
        bid_volume / ask_volume
    } else {
        1.0
    };

    BookPressure {
        ratio,
        bid_volume,
        ask_volume,
    }
}

/// Compute the distance-weighted Liquidity Delta and its velocity view.
pub fn calc_ld(snapshot: &Snapshot) -> LiquidityDelta {
    if !snapshot.has_valid_price() {
        return LiquidityDelta::default();
    }
    let price = snapshot.current_price;

    let mut delta = 0.0_f64;
    let mut near = 0.0_f64;
    let mut far = 0.0_f64;

    for level in snapshot.levels.iter().filter(|l| l.is_usable()) {
        let dist = level.distance_pct(price);
        let signed = level.side.sign() * level.volume;

        delta += signed / (1.0 + dist);

        let decay = (-dist / 2.0).exp();
        if dist <= NEAR_BAND_PCT {
            near += signed * decay;
        } else {
            far += signed * decay * FAR_BAND_DISCOUNT;
        }
    }

    LiquidityDelta {
        delta,
        velocity: LdVelocity {
            near_delta: near,
            far_delta: far,
            velocity: near + far,
            velocity_type: classify_velocity(near, far),
        },
    }
}

/// Classify the band split using the dominance rule.
pub fn classify_velocity(near: f64, far: f64) -> VelocityType {
    let n = near.abs();
    let f = far.abs();
    if n < MIN_VELOCITY_MAGNITUDE && f < MIN_VELOCITY_MAGNITUDE {
        VelocityType::Neutral
    } else if n >= MIN_VELOCITY_MAGNITUDE && n >= DOMINANCE_RATIO * f {
        VelocityType::AggressiveNear
    } else if f >= MIN_VELOCITY_MAGNITUDE && f >= DOMINANCE_RATIO * n {
        VelocityType::SpoofFar
    } else {
        VelocityType::Mixed
    }
}

/// Sum of volume across `levels`.
pub fn total_volume<'a>(levels: impl IntoIterator<Item = &'a Level>) -> f64 {
    levels.into_iter().map(|l| l.volume).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Level;

    fn snap(levels: Vec<Level>, price: f64) -> Snapshot {
        Snapshot::new(levels, price, "TEST", "1m")
    }

    #[test]
    fn bpr_ratio_three() {
        let s = snap(
            vec![
                Level::support(99.0, 200.0),
                Level::support(98.0, 100.0),
                Level::resistance(101.0, 100.0),
            ],
            100.0,
        );
        let bpr = calc_bpr(&s);
        assert!((bpr.ratio - 3.0).abs() < 1e-12);
        assert!((bpr.bid_volume - 300.0).abs() < 1e-12);
        assert!((bpr.ask_volume - 100.0).abs() < 1e-12);
    }

    #[test]
    fn bpr_zero_resistance_defaults_to_one() {
        let s = snap(vec![Level::support(99.0, 500.0)], 100.0);
        assert_eq!(calc_bpr(&s).ratio, 1.0);
        let empty = snap(vec![], 100.0);
        assert_eq!(calc_bpr(&empty).ratio, 1.0);
    }

    #[test]
    fn bpr_ignores_non_positive_prices() {
        let mut s = snap(vec![Level::resistance(101.0, 10.0)], 100.0);
        // Bypass ingestion filtering to make sure the calculator re-checks.
        s.levels.push(Level::support(0.0, 1_000.0));
        s.levels.push(Level::support(99.0, 20.0));
        assert!((calc_bpr(&s).ratio - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ld_scenario_delta_twenty() {
        let s = snap(
            vec![Level::support(99.0, 50.0), Level::resistance(101.0, 10.0)],
            100.0,
        );
        let ld = calc_ld(&s);
        assert!((ld.delta - 20.0).abs() < 1e-9, "delta = {}", ld.delta);
    }

    #[test]
    fn ld_empty_is_neutral() {
        let ld = calc_ld(&snap(vec![], 100.0));
        assert_eq!(ld.delta, 0.0);
        assert_eq!(ld.velocity.velocity_type, VelocityType::Neutral);

        let bad_price = calc_ld(&snap(vec![Level::support(99.0, 50.0)], 0.0));
        assert_eq!(bad_price.delta, 0.0);
    }

    #[test]
    fn velocity_near_dominates() {
        let s = snap(
            vec![Level::support(99.5, 100.0), Level::resistance(105.0, 20.0)],
            100.0,
        );
        let ld = calc_ld(&s);
        assert!(ld.velocity.near_delta > 70.0);
        assert_eq!(ld.velocity.velocity_type, VelocityType::AggressiveNear);
    }

    #[test]
    fn velocity_far_wall_flags_spoof() {
        // A huge bid wall 3% away, almost nothing near price.
        let s = snap(
            vec![
                Level::support(97.0, 2_000.0),
                Level::resistance(100.2, 1.0),
            ],
            100.0,
        );
        let ld = calc_ld(&s);
        assert!(ld.velocity.far_delta > 100.0);
        assert_eq!(ld.velocity.velocity_type, VelocityType::SpoofFar);
    }

    #[test]
    fn classify_velocity_rules() {
        assert_eq!(classify_velocity(5.0, -9.0), VelocityType::Neutral);
        assert_eq!(classify_velocity(30.0, 10.0), VelocityType::AggressiveNear);
        assert_eq!(classify_velocity(-5.0, -40.0), VelocityType::SpoofFar);
        assert_eq!(classify_velocity(20.0, 18.0), VelocityType::Mixed);
    }
}
