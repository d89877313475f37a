// =============================================================================
// LD History Pattern Detector
// =============================================================================
//
// Pattern read-outs over the per-context LD history:
// - Price / LD divergence
// - Absorption vs displacement footprint
// - Three-step LD projection
// - Cluster backing and spoof suspicion

pub mod divergence;
pub mod footprint;
pub mod history;
pub mod projection;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::book::{ClusterAnalysis, LiquidityCluster, VelocityType};

pub use divergence::{detect_divergence, Divergence};
pub use footprint::{classify_footprint, spoof_pattern, FlowFootprint};
pub use history::{LdHistory, LdHistoryEntry};
pub use projection::project_ld;

/// Pattern read-out for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternResult {
    pub divergence: Divergence,
    pub absorption: Option<FlowFootprint>,
    pub projection: [f64; 3],
    pub cluster_backed: bool,
    pub cluster_weighted_ld: f64,
    pub velocity_type: VelocityType,
    pub spoof_suspect: bool,
    pub clusters: Vec<LiquidityCluster>,
}

impl Default for PatternResult {
    fn default() -> Self {
        Self {
            divergence: Divergence::None,
            absorption: None,
            projection: [0.0; 3],
            cluster_backed: false,
            cluster_weighted_ld: 0.0,
            velocity_type: VelocityType::Neutral,
            spoof_suspect: false,
            clusters: Vec::new(),
        }
    }
}

/// Per-context pattern state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternDetector {
    history: LdHistory,
}

impl PatternDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation and evaluate every pattern.
    pub fn update(
        &mut self,
        entry: LdHistoryEntry,
        velocity_type: VelocityType,
        clusters: ClusterAnalysis,
    ) -> PatternResult {
        self.history.push(entry);

        let recent = self.history.recent();
        let footprint = self.history.footprint_tail(footprint::SPOOF_LOOKBACK);

        let divergence = detect_divergence(&recent);
        let absorption = classify_footprint(&footprint);
        let projection = project_ld(&self.history.ld_values());
        let spoof_suspect = velocity_type == VelocityType::SpoofFar || spoof_pattern(&footprint);
        let cluster_backed = clusters.backs(entry.ld);

        if divergence != Divergence::None || spoof_suspect {
            debug!(
                divergence = ?divergence,
                absorption = ?absorption,
                spoof_suspect,
                ld = format!("{:.3}", entry.ld),
                "LD pattern flagged"
            );
        }

        PatternResult {
            divergence,
            absorption,
            projection,
            cluster_backed,
            cluster_weighted_ld: clusters.weighted_delta,
            velocity_type,
            spoof_suspect,
            clusters: clusters.clusters,
        }
    }

    pub fn history(&self) -> &LdHistory {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(t: i64, ld: f64, price: f64) -> LdHistoryEntry {
        LdHistoryEntry { time: t, ld, price }
    }

    #[test]
    fn spoof_far_velocity_flags_spoof() {
        let mut d = PatternDetector::new();
        let r = d.update(entry(0, 5.0, 100.0), VelocityType::SpoofFar, ClusterAnalysis::default());
        assert!(r.spoof_suspect);
        assert_eq!(r.absorption, None);
    }

    #[test]
    fn steady_build_reads_as_displacement() {
        let mut d = PatternDetector::new();
        let mut r = PatternResult::default();
        for i in 0..5 {
            r = d.update(
                entry(i, i as f64 * 20.0, 100.0 * (1.0 + 0.002 * i as f64)),
                VelocityType::AggressiveNear,
                ClusterAnalysis::default(),
            );
        }
        assert_eq!(r.absorption, Some(FlowFootprint::DisplacementUp));
        assert_eq!(r.divergence, Divergence::None);
        assert!(!r.spoof_suspect);
        assert!(r.projection[0] > 80.0);
        assert!(!r.cluster_backed);
    }

    #[test]
    fn reset_clears_history() {
        let mut d = PatternDetector::new();
        d.update(entry(0, 1.0, 100.0), VelocityType::Neutral, ClusterAnalysis::default());
        d.reset();
        assert!(d.history().is_empty());
    }
}
