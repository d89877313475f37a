// =============================================================================
// Order Book Calculators
// =============================================================================
//
// Pure, side-effect-free functions over one depth snapshot:
// - Book Pressure Ratio and distance-weighted Liquidity Delta (+ velocity)
// - Fair value estimates (Mid, VWMP, IFV)
// - Liquidity clusters and the cluster-weighted delta
// - Book geometry (share, gaps, structural levels)

pub mod clusters;
pub mod fair_value;
pub mod geometry;
pub mod pressure;

pub use clusters::{find_clusters, ClusterAnalysis, LiquidityCluster};
pub use fair_value::{extension, FairValues};
pub use geometry::BookGeometry;
pub use pressure::{calc_bpr, calc_ld, BookPressure, LdVelocity, LiquidityDelta, VelocityType};
