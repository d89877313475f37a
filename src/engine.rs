// =============================================================================
// Analytics Engine — Keyed state store and per-tick pipeline
// =============================================================================
//
// One `EngineState` per (symbol, timeframe). A change of context is a hard
// reset barrier: the previous context's normalisers, smoothers, ROC trackers,
// regime counters and LD history are dropped before the new observation is
// processed.
//
// Pipeline, once per snapshot:
//
//   filter -> barrier -> BPR / LD -> fair values -> normalisers -> momentum
//   -> alpha score -> geometry -> regime (+ hysteresis) -> patterns
//   -> consensus -> report gate
//
// The engine is synchronous and lock-free; hosts that share it across tasks
// wrap it in their own lock.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::book::{
    calc_bpr, calc_ld, find_clusters, BookGeometry, BookPressure, FairValues, LiquidityDelta,
};
use crate::consensus::{self, ConsensusInputs, ConsensusResult, ConsensusWeighting};
use crate::mode::{Mode, ModeProfile};
use crate::patterns::{LdHistoryEntry, PatternDetector, PatternResult};
use crate::regime::{Classification, RegimeInputs, RegimeResult, RegimeThresholds, RegimeTracker};
use crate::signals::report_gate::DEFAULT_REPORT_MIN_INTERVAL_MS;
use crate::signals::{
    AdaptiveNormalizer, AlphaInputs, AlphaScoreResult, AlphaScorer, MomentumReading,
    MomentumTracker, NormalizedSignal, ReportGate,
};
use crate::types::{ContextKey, Level, Snapshot};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// ±range around price (fraction) for the VWMP / IFV level filter.
    pub fair_value_range: f64,
    pub report_min_interval_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fair_value_range: crate::book::fair_value::DEFAULT_RANGE,
            report_min_interval_ms: DEFAULT_REPORT_MIN_INTERVAL_MS,
        }
    }
}

// =============================================================================
// Report
// =============================================================================

/// How much of the pipeline is running on learned rather than fallback scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalQuality {
    /// No usable book for this tick.
    Analyzing,
    /// At least one normaliser is still on its legacy range.
    Calibrating,
    Calibrated,
}

/// Every output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub context: ContextKey,
    pub timestamp: i64,
    pub mode: Mode,
    pub price: f64,
    pub quality: SignalQuality,
    pub pressure: BookPressure,
    pub liquidity: LiquidityDelta,
    pub fair_values: FairValues,
    pub ld_norm: Option<NormalizedSignal>,
    pub bpr_norm: Option<NormalizedSignal>,
    pub momentum: MomentumReading,
    pub geometry: BookGeometry,
    pub alpha: AlphaScoreResult,
    /// Last score let through the report gate.
    pub published_score: Option<u8>,
    pub regime: RegimeResult,
    pub patterns: PatternResult,
    pub consensus: ConsensusResult,
}

// =============================================================================
// Per-context state
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EngineState {
    ld_norm: AdaptiveNormalizer,
    bpr_norm: AdaptiveNormalizer,
    alpha: AlphaScorer,
    momentum: MomentumTracker,
    regime: RegimeTracker,
    patterns: PatternDetector,
    gate: ReportGate,
    ticks: u64,
    last_report: Option<TickReport>,
}

impl EngineState {
    fn new(mode: Mode, config: &EngineConfig) -> Self {
        let profile = mode.profile();
        Self {
            ld_norm: AdaptiveNormalizer::for_ld(profile),
            bpr_norm: AdaptiveNormalizer::for_bpr(profile),
            alpha: AlphaScorer::new(profile),
            momentum: MomentumTracker::new(),
            regime: RegimeTracker::new(mode),
            patterns: PatternDetector::new(),
            gate: ReportGate::new(config.report_min_interval_ms),
            ticks: 0,
            last_report: None,
        }
    }
}

// =============================================================================
// AnalyticsEngine
// =============================================================================

pub struct AnalyticsEngine {
    states: HashMap<ContextKey, EngineState>,
    active: Option<ContextKey>,
    mode: Mode,
    weighting: ConsensusWeighting,
    config: EngineConfig,
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self::new(Mode::default(), ConsensusWeighting::default(), EngineConfig::default())
    }
}

impl AnalyticsEngine {
    pub fn new(mode: Mode, weighting: ConsensusWeighting, config: EngineConfig) -> Self {
        Self {
            states: HashMap::new(),
            active: None,
            mode,
            weighting,
            config,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn profile(&self) -> &'static ModeProfile {
        self.mode.profile()
    }

    pub fn consensus_weighting(&self) -> ConsensusWeighting {
        self.weighting
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn active_context(&self) -> Option<&ContextKey> {
        self.active.as_ref()
    }

    /// Observations processed for the active context.
    pub fn ticks(&self) -> u64 {
        self.active_state().map(|s| s.ticks).unwrap_or(0)
    }

    /// Latest report of the active context.
    pub fn last_report(&self) -> Option<&TickReport> {
        self.active_state().and_then(|s| s.last_report.as_ref())
    }

    /// Convenience entry point mirroring a raw feed callback.
    pub fn update_levels(
        &mut self,
        levels: Vec<Level>,
        current_price: f64,
        symbol: &str,
        timeframe: &str,
    ) -> TickReport {
        self.update(Snapshot::new(levels, current_price, symbol, timeframe))
    }

    /// Run the full pipeline on one snapshot.
    pub fn update(&mut self, mut snapshot: Snapshot) -> TickReport {
        snapshot.levels.retain(Level::is_usable);

        let key = snapshot.key();
        self.enter_context(&key);

        let mode = self.mode;
        let profile = mode.profile();
        let weighting = self.weighting;
        let config = self.config;
        let state = self
            .states
            .entry(key.clone())
            .or_insert_with(|| EngineState::new(mode, &config));
        state.ticks = state.ticks.saturating_add(1);

        let report = if snapshot.has_valid_price() && !snapshot.levels.is_empty() {
            run_pipeline(state, &snapshot, profile, weighting, &config)
        } else {
            analyzing_report(state, &snapshot, profile, weighting)
        };

        debug!(
            context = %key,
            price = format!("{:.3}", report.price),
            bpr = format!("{:.3}", report.pressure.ratio),
            ld = format!("{:.3}", report.liquidity.delta),
            score = ?report.alpha.score,
            regime = %report.regime.committed(),
            consensus = format!("{:.1}", report.consensus.consensus),
            quality = ?report.quality,
            "tick processed"
        );

        state.last_report = Some(report.clone());
        report
    }

    /// Switch to a new symbol on the current timeframe. Resets all state.
    pub fn on_symbol_changed(&mut self, symbol: &str) {
        let timeframe = self
            .active
            .as_ref()
            .map(|k| k.timeframe.clone())
            .unwrap_or_default();
        self.switch_context(ContextKey::new(symbol, timeframe));
    }

    /// Switch to a new timeframe on the current symbol. Resets all state.
    pub fn on_timeframe_changed(&mut self, timeframe: &str) {
        let symbol = self
            .active
            .as_ref()
            .map(|k| k.symbol.clone())
            .unwrap_or_default();
        self.switch_context(ContextKey::new(symbol, timeframe));
    }

    /// Drop every context's state. The active key is kept.
    pub fn reset(&mut self) {
        self.states.clear();
        info!(context = ?self.active, "analytics state reset");
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if mode == self.mode {
            return;
        }
        info!(from = %self.mode, to = %mode, "mode changed");
        self.mode = mode;
        for state in self.states.values_mut() {
            state.regime.set_mode(mode);
        }
    }

    pub fn set_consensus_weighting(&mut self, weighting: ConsensusWeighting) {
        if weighting != self.weighting {
            info!(from = %self.weighting, to = %weighting, "consensus weighting changed");
            self.weighting = weighting;
        }
    }

    fn active_state(&self) -> Option<&EngineState> {
        self.active.as_ref().and_then(|k| self.states.get(k))
    }

    fn enter_context(&mut self, key: &ContextKey) {
        if self.active.as_ref() != Some(key) {
            self.switch_context(key.clone());
        }
    }

    fn switch_context(&mut self, key: ContextKey) {
        if self.active.as_ref() == Some(&key) {
            return;
        }
        if let Some(prev) = &self.active {
            info!(from = %prev, to = %key, "context switched, analytics state reset");
        }
        self.states.clear();
        self.active = Some(key);
    }
}

// =============================================================================
// Pipeline
// =============================================================================

fn run_pipeline(
    state: &mut EngineState,
    snapshot: &Snapshot,
    profile: &ModeProfile,
    weighting: ConsensusWeighting,
    config: &EngineConfig,
) -> TickReport {
    let price = snapshot.current_price;

    // --- Raw book signals ----------------------------------------------------
    let pressure = calc_bpr(snapshot);
    let liquidity = calc_ld(snapshot);
    let fair_values = FairValues::estimate(snapshot, config.fair_value_range);

    // --- Normalisation and momentum ------------------------------------------
    let ld_norm = state.ld_norm.normalize(liquidity.delta, profile);
    let bpr_norm = state.bpr_norm.normalize(pressure.ratio, profile);
    let mut momentum = state
        .momentum
        .update_book(liquidity.delta, pressure.ratio, profile);

    // --- Alpha score ---------------------------------------------------------
    let mut alpha = state.alpha.score(
        AlphaInputs {
            ld: &ld_norm,
            bpr: &bpr_norm,
            price,
            vwmp: fair_values.vwmp,
            ifv: fair_values.ifv,
        },
        profile,
    );
    momentum.alpha_roc = state.momentum.update_alpha(alpha.score_f64(), profile);

    // --- Regime --------------------------------------------------------------
    let geometry = BookGeometry::measure(snapshot);
    let regime = state.regime.update(
        &RegimeInputs {
            price,
            ld: liquidity.delta,
            ld_roc: momentum.ld_roc,
            ld_roc_z: momentum.ld_roc_z.calibrated_value(),
            bpr_ratio: pressure.ratio,
            bpr_roc: momentum.bpr_roc,
            alpha: alpha.score_f64(),
            alpha_roc: momentum.alpha_roc,
            vwmp: fair_values.vwmp,
            ifv: fair_values.ifv,
            geometry,
        },
        profile,
    );

    // --- Patterns ------------------------------------------------------------
    let clusters = find_clusters(snapshot);
    let cluster_direction = clusters.direction();
    let patterns = state.patterns.update(
        LdHistoryEntry {
            time: snapshot.timestamp,
            ld: liquidity.delta,
            price,
        },
        liquidity.velocity.velocity_type,
        clusters,
    );

    // --- Consensus -----------------------------------------------------------
    let consensus = consensus::analyze(
        &ConsensusInputs {
            price,
            ld: liquidity.delta,
            ld_norm: ld_norm.value,
            ld_roc: momentum.ld_roc,
            ld_roc_z: momentum.ld_roc_z.calibrated_value(),
            bpr_ratio: pressure.ratio,
            cluster_direction,
            velocity: liquidity.velocity.velocity,
            velocity_type: liquidity.velocity.velocity_type,
            alpha: alpha.score_f64(),
            vwmp: fair_values.vwmp,
            ifv: fair_values.ifv,
            geometry,
            regime: regime.committed(),
        },
        weighting,
    );

    // --- Report gate ---------------------------------------------------------
    alpha.published = state
        .gate
        .offer(alpha.score, alpha.label, snapshot.timestamp, profile);

    let quality = if ld_norm.calibrated && bpr_norm.calibrated {
        SignalQuality::Calibrated
    } else {
        SignalQuality::Calibrating
    };

    TickReport {
        context: snapshot.key(),
        timestamp: snapshot.timestamp,
        mode: profile.mode,
        price,
        quality,
        pressure,
        liquidity,
        fair_values,
        ld_norm: Some(ld_norm),
        bpr_norm: Some(bpr_norm),
        momentum,
        geometry,
        alpha,
        published_score: state.gate.last_score(),
        regime,
        patterns,
        consensus,
    }
}

/// Report for a snapshot with no usable book: nothing is learned from it.
fn analyzing_report(
    state: &mut EngineState,
    snapshot: &Snapshot,
    profile: &ModeProfile,
    weighting: ConsensusWeighting,
) -> TickReport {
    let mut alpha = AlphaScoreResult::analyzing();
    alpha.published = state
        .gate
        .offer(None, alpha.label, snapshot.timestamp, profile);

    let mut regime = state
        .regime
        .result(Classification::NEUTRAL, RegimeThresholds::for_profile(profile));
    regime.analyzing = true;

    TickReport {
        context: snapshot.key(),
        timestamp: snapshot.timestamp,
        mode: profile.mode,
        price: snapshot.current_price,
        quality: SignalQuality::Analyzing,
        pressure: BookPressure::default(),
        liquidity: LiquidityDelta::default(),
        fair_values: FairValues::default(),
        ld_norm: None,
        bpr_norm: None,
        momentum: MomentumReading::default(),
        geometry: BookGeometry::default(),
        alpha,
        published_score: state.gate.last_score(),
        regime,
        patterns: PatternResult::default(),
        consensus: ConsensusResult::neutral(weighting),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::AlphaLabel;

    fn book(price: f64, bid_vol: f64, ask_vol: f64) -> Vec<Level> {
        (1..=10)
            .flat_map(|i| {
                let step = price * 0.001 * i as f64;
                [
                    Level::support(price - step, bid_vol),
                    Level::resistance(price + step, ask_vol),
                ]
            })
            .collect()
    }

    #[test]
    fn test_empty_book_is_analyzing() {
        let mut e = AnalyticsEngine::default();
        let r = e.update_levels(vec![], 100.0, "BTCUSDT", "1m");
        assert_eq!(r.alpha.score, None);
        assert_eq!(r.alpha.label, AlphaLabel::Analyzing);
        assert_eq!(r.quality, SignalQuality::Analyzing);
        assert!(r.regime.analyzing);
        assert_eq!(e.ticks(), 1);
    }

    #[test]
    fn test_invalid_price_is_analyzing() {
        let mut e = AnalyticsEngine::default();
        let r = e.update_levels(book(100.0, 10.0, 10.0), f64::NAN, "BTCUSDT", "1m");
        assert_eq!(r.alpha.score, None);
    }

    #[test]
    fn test_first_tick_scores_and_publishes() {
        let mut e = AnalyticsEngine::default();
        let r = e.update_levels(book(100.0, 30.0, 10.0), 100.0, "BTCUSDT", "1m");
        assert!(r.alpha.score.is_some());
        assert!(r.alpha.published);
        assert_eq!(r.quality, SignalQuality::Calibrating);
        assert!((r.pressure.ratio - 3.0).abs() < 1e-12);
        assert!(r.liquidity.delta > 0.0);
        assert_eq!(r.published_score, r.alpha.score);
        assert_eq!(e.last_report(), Some(&r));
    }

    #[test]
    fn test_context_switch_resets_state() {
        let mut e = AnalyticsEngine::default();
        for _ in 0..25 {
            e.update_levels(book(100.0, 30.0, 10.0), 100.0, "BTCUSDT", "1m");
        }
        assert_eq!(e.ticks(), 25);
        let r = e.update_levels(book(50.0, 30.0, 10.0), 50.0, "ETHUSDT", "1m");
        assert_eq!(e.ticks(), 1);
        assert_eq!(r.ld_norm.map(|n| n.samples), Some(1));
        assert_eq!(e.active_context(), Some(&ContextKey::new("ETHUSDT", "1m")));
    }

    #[test]
    fn test_timeframe_change_resets_state() {
        let mut e = AnalyticsEngine::default();
        for _ in 0..5 {
            e.update_levels(book(100.0, 30.0, 10.0), 100.0, "BTCUSDT", "1m");
        }
        e.on_timeframe_changed("5m");
        assert_eq!(e.active_context(), Some(&ContextKey::new("BTCUSDT", "5m")));
        assert_eq!(e.ticks(), 0);
        assert!(e.last_report().is_none());
    }

    #[test]
    fn test_mode_and_weighting_are_applied() {
        let mut e = AnalyticsEngine::default();
        e.set_mode(Mode::MarketMaker);
        e.set_consensus_weighting(ConsensusWeighting::Aggressive);
        let r = e.update_levels(book(100.0, 10.0, 10.0), 100.0, "BTCUSDT", "1m");
        assert_eq!(r.mode, Mode::MarketMaker);
        assert_eq!(r.regime.thresholds_used.min_ticks, 1);
        assert_eq!(r.consensus.weighting, ConsensusWeighting::Aggressive);
    }
}
