// =============================================================================
// microflow — order-book microstructure analytics
// =============================================================================
//
// Per-tick pipeline over a depth snapshot:
//   book pressure / liquidity delta → adaptive normalisation → alpha score
//   → momentum → regime classification → LD patterns → timeframe consensus.
//
// `engine::AnalyticsEngine` owns all per-context state and is the entry point.

pub mod book;
pub mod consensus;
pub mod engine;
pub mod indicators;
pub mod mode;
pub mod patterns;
pub mod regime;
pub mod runtime_config;
pub mod signals;
pub mod types;

pub use consensus::ConsensusWeighting;
pub use engine::{AnalyticsEngine, EngineConfig, SignalQuality, TickReport};
pub use mode::Mode;
pub use types::{ContextKey, Level, Snapshot};
