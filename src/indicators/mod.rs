// =============================================================================
// Streaming Indicator Primitives
// =============================================================================
//
// Small, allocation-light building blocks shared by the signal pipeline. Every
// type here is fed one observation at a time and tolerates non-finite input by
// ignoring it, so a single corrupt print can never poison downstream state.

pub mod ema;
pub mod percentile;
pub mod roc;
pub mod zscore;

pub use ema::EmaState;
pub use percentile::{percentile, PercentileBounds, SampleWindow};
pub use roc::{average_delta, RocTracker};
pub use zscore::{ZScore, ZScoreState};
