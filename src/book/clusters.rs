// =============================================================================
// Liquidity Clusters — Multi-order walls on one side of the book
// =============================================================================
//
// Levels on the same side are walked in price order and grouped while they
// stay within 0.5% of the cluster's anchor (its first price). Groups with
// fewer than three orders are discarded: scattered thin liquidity is not a
// wall.
//
// Cluster-weighted LD:
//   cld = sum_c side_c * volume_c * order_count_c / (1 + distance_pct_c)
//
// The order-count factor means one band backed by many orders outweighs the
// same total volume spread thinly across the book.

use serde::{Deserialize, Serialize};

use crate::types::{Level, Side, Snapshot};

/// Maximum relative spread of a cluster, measured from its anchor.
pub const CLUSTER_SPAN: f64 = 0.005;
/// Minimum number of orders (levels) forming a cluster.
pub const MIN_CLUSTER_ORDERS: usize = 3;

/// A band of same-side levels acting as one wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityCluster {
    pub side: Side,
    pub price_low: f64,
    pub price_high: f64,
    /// Volume-weighted centre price.
    pub center: f64,
    pub total_volume: f64,
    pub order_count: usize,
    /// Distance of the centre from the current price, in percent.
    pub distance_pct: f64,
}

impl LiquidityCluster {
    /// Signed contribution to the cluster-weighted LD.
    pub fn weighted_delta(&self) -> f64 {
        self.side.sign() * self.total_volume * self.order_count as f64
            / (1.0 + self.distance_pct)
    }
}

/// Clusters found in one snapshot plus their weighted delta.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterAnalysis {
    pub clusters: Vec<LiquidityCluster>,
    pub weighted_delta: f64,
}

impl ClusterAnalysis {
    /// +1 / -1 / 0 direction of the cluster-weighted LD.
    pub fn direction(&self) -> f64 {
        if self.weighted_delta > 0.0 {
            1.0
        } else if self.weighted_delta < 0.0 {
            -1.0
        } else {
            0.0
        }
    }

    /// True when clusters exist and push in the same direction as `ld`.
    pub fn backs(&self, ld: f64) -> bool {
        self.weighted_delta != 0.0 && ld != 0.0 && self.weighted_delta.signum() == ld.signum()
    }
}

/// Find clusters on both sides of the book.
pub fn find_clusters(snapshot: &Snapshot) -> ClusterAnalysis {
    if !snapshot.has_valid_price() {
        return ClusterAnalysis::default();
    }
    let price = snapshot.current_price;

    let mut clusters = cluster_side(snapshot.supports(), Side::Support, price);
    clusters.extend(cluster_side(snapshot.resistances(), Side::Resistance, price));

    let weighted_delta = clusters.iter().map(LiquidityCluster::weighted_delta).sum();

    ClusterAnalysis {
        clusters,
        weighted_delta,
    }
}

fn cluster_side<'a>(
    levels: impl Iterator<Item = &'a Level>,
    side: Side,
    current_price: f64,
) -> Vec<LiquidityCluster> {
    let mut sorted: Vec<&Level> = levels.filter(|l| l.volume > 0.0).collect();
    sorted.sort_by(|a, b| a.price.total_cmp(&b.price));

    let mut out = Vec::new();
    let mut group: Vec<&Level> = Vec::new();

    for level in sorted {
        let fits = group
            .first()
            .map(|anchor| (level.price - anchor.price).abs() / anchor.price <= CLUSTER_SPAN)
            .unwrap_or(true);
        if !fits {
            if let Some(c) = build_cluster(&group, side, current_price) {
                out.push(c);
            }
            group.clear();
        }
        group.push(level);
    }
    if let Some(c) = build_cluster(&group, side, current_price) {
        out.push(c);
    }
    out
}

fn build_cluster(group: &[&Level], side: Side, current_price: f64) -> Option<LiquidityCluster> {
    if group.len() < MIN_CLUSTER_ORDERS {
        return None;
    }
    let total_volume: f64 = group.iter().map(|l| l.volume).sum();
    if total_volume <= 0.0 {
        return None;
    }
    let center = group.iter().map(|l| l.price * l.volume).sum::<f64>() / total_volume;
    let price_low = group.iter().map(|l| l.price).fold(f64::INFINITY, f64::min);
    let price_high = group.iter().map(|l| l.price).fold(f64::NEG_INFINITY, f64::max);

    Some(LiquidityCluster {
        side,
        price_low,
        price_high,
        center,
        total_volume,
        order_count: group.len(),
        distance_pct: ((center - current_price).abs() / current_price) * 100.0,
    })
}
