// =============================================================================
// Central Application State — microflow host
// =============================================================================
//
// Ties the analytics engine to the host: the depth feed writes snapshots in,
// the REST API reads reports out and issues mode / weighting / context
// controls.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - One parking_lot::Mutex around the engine; the feed task and the control
//     handlers are its only writers.
//   - parking_lot::RwLock for the read-mostly collections.
//   - A tokio watch channel announces context changes to the feed task.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use microflow::consensus::ConsensusWeighting;
use microflow::engine::{AnalyticsEngine, TickReport};
use microflow::mode::Mode;
use microflow::runtime_config::RuntimeConfig;
use microflow::types::{ContextKey, Snapshot};

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Monotonically increasing version counter. Incremented on every
    /// processed tick and every control change.
    pub state_version: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    // ── Analytics ───────────────────────────────────────────────────────
    pub engine: Mutex<AnalyticsEngine>,
    pub latest_report: RwLock<Option<TickReport>>,

    // ── Feed ────────────────────────────────────────────────────────────
    context_tx: watch::Sender<ContextKey>,
    pub feed_connected: RwLock<bool>,
    pub last_feed_event: RwLock<Option<std::time::Instant>>,

    // ── Error Log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct a new `AppState` from the given runtime configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        let engine = AnalyticsEngine::new(
            config.mode(),
            config.consensus_weighting,
            config.engine_config(),
        );
        let (context_tx, _) = watch::channel(ContextKey::new(
            config.symbol.clone(),
            config.timeframe.clone(),
        ));

        Self {
            state_version: AtomicU64::new(1),
            runtime_config: Arc::new(RwLock::new(config)),
            engine: Mutex::new(engine),
            latest_report: RwLock::new(None),
            context_tx,
            feed_connected: RwLock::new(false),
            last_feed_event: RwLock::new(None),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted when the limit is
    /// reached.
    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Context ─────────────────────────────────────────────────────────

    /// Context the feed should be streaming.
    pub fn context(&self) -> ContextKey {
        self.context_tx.borrow().clone()
    }

    /// Receiver that fires whenever the context changes.
    pub fn subscribe_context(&self) -> watch::Receiver<ContextKey> {
        self.context_tx.subscribe()
    }

    // ── Feed ────────────────────────────────────────────────────────────

    /// Run one snapshot through the engine and publish the report.
    ///
    /// Snapshots for a context other than the configured one (in flight
    /// across a context switch) are dropped. The check runs under the engine
    /// lock, which `set_context` also holds while it publishes a new context.
    pub fn ingest(&self, snapshot: Snapshot) -> Option<TickReport> {
        let report = {
            let mut engine = self.engine.lock();
            if snapshot.key() != self.context() {
                return None;
            }
            let report = engine.update(snapshot);
            *self.latest_report.write() = Some(report.clone());
            report
        };
        *self.last_feed_event.write() = Some(std::time::Instant::now());
        self.increment_version();
        Some(report)
    }

    pub fn set_feed_connected(&self, connected: bool) {
        *self.feed_connected.write() = connected;
        self.increment_version();
    }

    // ── Controls ────────────────────────────────────────────────────────

    pub fn set_mode(&self, mode: Mode) {
        self.engine.lock().set_mode(mode);
        self.runtime_config.write().mode = mode.to_string();
        self.increment_version();
    }

    pub fn set_consensus_weighting(&self, weighting: ConsensusWeighting) {
        self.engine.lock().set_consensus_weighting(weighting);
        self.runtime_config.write().consensus_weighting = weighting;
        self.increment_version();
    }

    /// Switch symbol and/or timeframe. All analytics state is discarded and
    /// the feed is told to reconnect when the symbol changed.
    pub fn set_context(&self, symbol: Option<String>, timeframe: Option<String>) -> ContextKey {
        let current = self.context();
        let next = ContextKey::new(
            symbol
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .unwrap_or(current.symbol.clone()),
            timeframe
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or(current.timeframe.clone()),
        );
        if next == current {
            return current;
        }

        {
            let mut engine = self.engine.lock();
            if next.symbol != current.symbol {
                engine.on_symbol_changed(&next.symbol);
            }
            if next.timeframe != current.timeframe {
                engine.on_timeframe_changed(&next.timeframe);
            }
            {
                let mut config = self.runtime_config.write();
                config.symbol = next.symbol.clone();
                config.timeframe = next.timeframe.clone();
            }
            *self.latest_report.write() = None;
            self.context_tx.send_replace(next.clone());
        }

        info!(from = %current, to = %next, "context changed");
        self.increment_version();
        next
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Build the serialisable host state served by `GET /api/v1/state`.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let now = Utc::now();
        let (mode, consensus_weighting, ticks) = {
            let engine = self.engine.lock();
            (engine.mode(), engine.consensus_weighting(), engine.ticks())
        };

        StateSnapshot {
            state_version: self.current_state_version(),
            server_time: now.timestamp_millis(),
            uptime_s: self.start_time.elapsed().as_secs(),
            context: self.context(),
            mode,
            consensus_weighting,
            ticks,
            feed_connected: *self.feed_connected.read(),
            last_feed_event_age_ms: self
                .last_feed_event
                .read()
                .map(|t| t.elapsed().as_millis() as u64),
            report: self.latest_report.read().clone(),
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

// =============================================================================
// Serialisable snapshot types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_s: u64,
    pub context: ContextKey,
    pub mode: Mode,
    pub consensus_weighting: ConsensusWeighting,
    pub ticks: u64,
    pub feed_connected: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_feed_event_age_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<TickReport>,

    pub recent_errors: Vec<ErrorRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use microflow::types::Level;

    fn snapshot(symbol: &str) -> Snapshot {
        Snapshot::new(
            vec![Level::support(99.0, 50.0), Level::resistance(101.0, 10.0)],
            100.0,
            symbol,
            "1m",
        )
    }

    #[test]
    fn ingest_publishes_report() {
        let state = AppState::new(RuntimeConfig::default());
        let v0 = state.current_state_version();
        let report = state.ingest(snapshot("BTCUSDT")).unwrap();
        assert!((report.liquidity.delta - 20.0).abs() < 1e-9);
        assert!(state.current_state_version() > v0);
        assert_eq!(state.build_snapshot().ticks, 1);
    }

    #[test]
    fn stale_context_is_dropped() {
        let state = AppState::new(RuntimeConfig::default());
        assert!(state.ingest(snapshot("ETHUSDT")).is_none());
        assert!(state.latest_report.read().is_none());
    }

    #[test]
    fn context_change_resets_and_notifies() {
        let state = AppState::new(RuntimeConfig::default());
        let rx = state.subscribe_context();
        state.ingest(snapshot("BTCUSDT"));

        let next = state.set_context(Some("ethusdt".into()), None);
        assert_eq!(next, ContextKey::new("ETHUSDT", "1m"));
        assert!(rx.has_changed().unwrap());
        assert!(state.latest_report.read().is_none());
        assert_eq!(state.runtime_config.read().symbol, "ETHUSDT");
        assert_eq!(state.build_snapshot().ticks, 0);
    }

    #[test]
    fn old_context_snapshot_after_switch_leaves_engine_alone() {
        let state = AppState::new(RuntimeConfig::default());
        state.ingest(snapshot("BTCUSDT"));
        state.set_context(Some("ETHUSDT".into()), None);

        assert!(state.ingest(snapshot("BTCUSDT")).is_none());
        assert!(state.latest_report.read().is_none());
        assert_eq!(
            state.engine.lock().active_context(),
            Some(&ContextKey::new("ETHUSDT", "1m"))
        );

        let report = state.ingest(snapshot("ETHUSDT")).unwrap();
        assert_eq!(report.context, ContextKey::new("ETHUSDT", "1m"));
        assert_eq!(state.build_snapshot().ticks, 1);
    }

    #[test]
    fn controls_update_config() {
        let state = AppState::new(RuntimeConfig::default());
        state.set_mode(Mode::MarketMaker);
        state.set_consensus_weighting(ConsensusWeighting::Conservative);
        let cfg = state.runtime_config.read().clone();
        assert_eq!(cfg.mode(), Mode::MarketMaker);
        assert_eq!(cfg.consensus_weighting, ConsensusWeighting::Conservative);
        assert_eq!(state.build_snapshot().mode, Mode::MarketMaker);
    }
}
