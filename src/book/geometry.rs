// =============================================================================
// Book Geometry — Share, gaps and structural levels around price
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::book::clusters::{find_clusters, ClusterAnalysis};
use crate::book::pressure::total_volume;
use crate::types::{Side, Snapshot};

/// Shape of the book relative to the current price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookGeometry {
    /// Support volume / total volume, 0.5 on an empty book.
    pub support_share: f64,
    /// (price - nearest support) / price, 0 when no support exists.
    pub support_gap: f64,
    /// (nearest resistance - price) / price, 0 when no resistance exists.
    pub resist_gap: f64,
    pub support_levels: usize,
    pub resist_levels: usize,
    /// Nearest resistance wall at or above price: the closest resistance
    /// cluster centre, else the nearest resistance level.
    pub breakout_level: Option<f64>,
    /// Nearest support wall at or below price: the closest support cluster
    /// centre, else the nearest support level.
    pub breakdown_level: Option<f64>,
}

impl Default for BookGeometry {
    fn default() -> Self {
        Self {
            support_share: 0.5,
            support_gap: 0.0,
            resist_gap: 0.0,
            support_levels: 0,
            resist_levels: 0,
            breakout_level: None,
            breakdown_level: None,
        }
    }
}

impl BookGeometry {
    pub fn measure(snapshot: &Snapshot) -> Self {
        if !snapshot.has_valid_price() {
            return Self::default();
        }
        let price = snapshot.current_price;

        let support_vol = total_volume(snapshot.supports());
        let resist_vol = total_volume(snapshot.resistances());
        let total = support_vol + resist_vol;
        let support_share = if total > 0.0 { support_vol / total } else { 0.5 };

        let nearest_support = snapshot
            .supports()
            .map(|l| l.price)
            .max_by(|a, b| a.total_cmp(b));
        let nearest_resist = snapshot
            .resistances()
            .map(|l| l.price)
            .min_by(|a, b| a.total_cmp(b));

        let support_gap = nearest_support
            .map(|p| ((price - p) / price).max(0.0))
            .unwrap_or(0.0);
        let resist_gap = nearest_resist
            .map(|p| ((p - price) / price).max(0.0))
            .unwrap_or(0.0);

        let clusters = find_clusters(snapshot);
        let breakout_level = nearest_wall(&clusters, Side::Resistance, price)
            .or(nearest_resist.filter(|p| *p >= price));
        let breakdown_level = nearest_wall(&clusters, Side::Support, price)
            .or(nearest_support.filter(|p| *p <= price));

        Self {
            support_share,
            support_gap,
            resist_gap,
            support_levels: snapshot.supports().count(),
            resist_levels: snapshot.resistances().count(),
            breakout_level,
            breakdown_level,
        }
    }
}

/// Centre of the closest cluster of `side` lying on its own side of price.
fn nearest_wall(clusters: &ClusterAnalysis, side: Side, price: f64) -> Option<f64> {
    clusters
        .clusters
        .iter()
        .filter(|c| c.side == side)
        .filter(|c| match side {
            Side::Support => c.center <= price,
            Side::Resistance => c.center >= price,
        })
        .min_by(|a, b| a.distance_pct.total_cmp(&b.distance_pct))
        .map(|c| c.center)
}
