// =============================================================================
// Runtime Configuration — Engine settings with atomic save
// =============================================================================
//
// Everything the host needs to start the analytics engine: the trading mode,
// the consensus weighting, the watched context and the API bind address.
// Mode and weighting changed through the control API are written back on
// shutdown.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consensus::ConsensusWeighting;
use crate::engine::EngineConfig;
use crate::mode::Mode;
use crate::signals::report_gate::DEFAULT_REPORT_MIN_INTERVAL_MS;

pub const ENV_SYMBOL: &str = "MICROFLOW_SYMBOL";
pub const ENV_TIMEFRAME: &str = "MICROFLOW_TIMEFRAME";
pub const ENV_BIND_ADDR: &str = "MICROFLOW_BIND_ADDR";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_mode() -> String {
    Mode::default().to_string()
}

fn default_symbol() -> String {
    "BTCUSDT".to_string()
}

fn default_timeframe() -> String {
    "1m".to_string()
}

fn default_fair_value_range_pct() -> f64 {
    crate::book::fair_value::DEFAULT_RANGE * 100.0
}

fn default_report_min_interval_ms() -> i64 {
    DEFAULT_REPORT_MIN_INTERVAL_MS
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the microflow host.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Analytics profile ---------------------------------------------------

    /// Trading mode name. Unknown names fall back to Investor.
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Blend profile of the multi-timeframe consensus.
    #[serde(default)]
    pub consensus_weighting: ConsensusWeighting,

    // --- Context ------------------------------------------------------------

    /// Symbol whose depth stream feeds the engine.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Timeframe label attached to every snapshot.
    #[serde(default = "default_timeframe")]
    pub timeframe: String,

    // --- Engine tuning ------------------------------------------------------

    /// ±range around price (percent) used by the VWMP / IFV level filter.
    #[serde(default = "default_fair_value_range_pct")]
    pub fair_value_range_pct: f64,

    /// Minimum interval between re-publications of an unchanged score.
    #[serde(default = "default_report_min_interval_ms")]
    pub report_min_interval_ms: i64,

    // --- Host ---------------------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            consensus_weighting: ConsensusWeighting::default(),
            symbol: default_symbol(),
            timeframe: default_timeframe(),
            fair_value_range_pct: default_fair_value_range_pct(),
            report_min_interval_ms: default_report_min_interval_ms(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol,
            timeframe = %config.timeframe,
            mode = %config.mode,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        // Atomic write: write to a temporary sibling file, then rename.
        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `MICROFLOW_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(symbol) = get(ENV_SYMBOL) {
            self.symbol = symbol.to_uppercase();
        }
        if let Some(timeframe) = get(ENV_TIMEFRAME) {
            self.timeframe = timeframe;
        }
        if let Some(addr) = get(ENV_BIND_ADDR) {
            self.bind_addr = addr;
        }
    }

    /// Resolved trading mode (warns and falls back on unknown names).
    pub fn mode(&self) -> Mode {
        Mode::parse_or_fallback(&self.mode)
    }

    pub fn engine_config(&self) -> EngineConfig {
        let range = if self.fair_value_range_pct.is_finite() && self.fair_value_range_pct > 0.0 {
            self.fair_value_range_pct / 100.0
        } else {
            crate::book::fair_value::DEFAULT_RANGE
        };
        EngineConfig {
            fair_value_range: range,
            report_min_interval_ms: self.report_min_interval_ms.max(0),
        }
    }
}
