// =============================================================================
// Shared types used across the Microflow analytics engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Which side of the book a resting level sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Bid liquidity below (or at) the current price.
    Support,
    /// Ask liquidity above (or at) the current price.
    Resistance,
}

impl Side {
    /// +1.0 for support, -1.0 for resistance.
    pub fn sign(self) -> f64 {
        match self {
            Self::Support => 1.0,
            Self::Resistance => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Support => write!(f, "support"),
            Self::Resistance => write!(f, "resistance"),
        }
    }
}

/// A single aggregated price level from the depth snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub volume: f64,
    pub side: Side,
}

impl Level {
    pub fn support(price: f64, volume: f64) -> Self {
        Self {
            price,
            volume,
            side: Side::Support,
        }
    }

    pub fn resistance(price: f64, volume: f64) -> Self {
        Self {
            price,
            volume,
            side: Side::Resistance,
        }
    }

    /// A level is usable when its price is positive and its volume is a
    /// finite, non-negative number.
    pub fn is_usable(&self) -> bool {
        self.price.is_finite()
            && self.price > 0.0
            && self.volume.is_finite()
            && self.volume >= 0.0
    }

    /// Absolute distance from `current_price` in percent.
    pub fn distance_pct(&self, current_price: f64) -> f64 {
        if current_price <= 0.0 {
            return 0.0;
        }
        ((self.price - current_price).abs() / current_price) * 100.0
    }
}

/// One depth observation for a `(symbol, timeframe)` context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub levels: Vec<Level>,
    pub current_price: f64,
    pub symbol: String,
    pub timeframe: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl Snapshot {
    /// Build a snapshot stamped with the current wall-clock time.
    ///
    /// Degenerate levels (non-positive price, negative or non-finite volume)
    /// are dropped here so that no calculator has to re-check them.
    pub fn new(
        levels: Vec<Level>,
        current_price: f64,
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
    ) -> Self {
        Self {
            levels: levels.into_iter().filter(Level::is_usable).collect(),
            current_price,
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// True when the current price can anchor distance-weighted calculations.
    pub fn has_valid_price(&self) -> bool {
        self.current_price.is_finite() && self.current_price > 0.0
    }

    pub fn key(&self) -> ContextKey {
        ContextKey::new(self.symbol.clone(), self.timeframe.clone())
    }

    pub fn supports(&self) -> impl Iterator<Item = &Level> {
        self.levels.iter().filter(|l| l.side == Side::Support)
    }

    pub fn resistances(&self) -> impl Iterator<Item = &Level> {
        self.levels.iter().filter(|l| l.side == Side::Resistance)
    }
}

/// Composite key that scopes every piece of mutable analytics state.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContextKey {
    pub symbol: String,
    pub timeframe: String,
}

impl ContextKey {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
        }
    }
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.timeframe)
    }
}

/// Coarse direction attached to directional regimes and patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Self::Up
        } else if value < 0.0 {
            Self::Down
        } else {
            Self::Flat
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Self::Up => 1.0,
            Self::Down => -1.0,
            Self::Flat => 0.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "Up"),
            Self::Down => write!(f, "Down"),
            Self::Flat => write!(f, "Flat"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_drops_degenerate_levels() {
        let snap = Snapshot::new(
            vec![
                Level::support(99.0, 10.0),
                Level::support(0.0, 10.0),
                Level::resistance(-1.0, 5.0),
                Level::resistance(101.0, -3.0),
                Level::resistance(102.0, f64::NAN),
                Level::resistance(101.0, 0.0),
            ],
            100.0,
            "BTCUSDT",
            "1m",
        );
        assert_eq!(snap.levels.len(), 2);
        assert_eq!(snap.supports().count(), 1);
        assert_eq!(snap.resistances().count(), 1);
    }

    #[test]
    fn distance_pct_is_symmetric() {
        let below = Level::support(99.0, 1.0);
        let above = Level::resistance(101.0, 1.0);
        assert!((below.distance_pct(100.0) - 1.0).abs() < 1e-12);
        assert!((above.distance_pct(100.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn context_key_display() {
        let key = ContextKey::new("ETHUSDT", "5m");
        assert_eq!(key.to_string(), "ETHUSDT@5m");
    }
}
