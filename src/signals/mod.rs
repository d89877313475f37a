// =============================================================================
// Signals Module
// =============================================================================
//
// Signal processing pipeline over the raw book calculators:
// - Adaptive normalisation (rolling percentiles + smoothed output)
// - Alpha score composition (weighted blend of LD / BPR / IFV / VWMP)
// - Momentum (LD / BPR / alpha ROC, LD_ROC z-score)
// - Report gate for the published score

pub mod alpha_score;
pub mod momentum;
pub mod normalizer;
pub mod report_gate;

pub use alpha_score::{
    AlphaInputs, AlphaLabel, AlphaScoreResult, AlphaScorer, ComponentNorms, ComponentWeights,
};
pub use momentum::{MomentumReading, MomentumTracker};
pub use normalizer::{AdaptiveNormalizer, LegacyRange, NormalizedSignal, SignalSmoother};
pub use report_gate::ReportGate;
