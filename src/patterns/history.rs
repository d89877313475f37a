// =============================================================================
// LD History — Bounded (time, LD, price) series per context
// =============================================================================

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Capacity of the divergence window.
pub const DIVERGENCE_CAPACITY: usize = 20;
/// Capacity of the footprint window (absorption / spoof heuristics).
pub const FOOTPRINT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LdHistoryEntry {
    /// Epoch milliseconds.
    pub time: i64,
    pub ld: f64,
    pub price: f64,
}

/// Two drop-oldest rings over the same observations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LdHistory {
    recent: VecDeque<LdHistoryEntry>,
    footprint: VecDeque<LdHistoryEntry>,
}

impl LdHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LdHistoryEntry) {
        if !entry.ld.is_finite() || !entry.price.is_finite() || entry.price <= 0.0 {
            return;
        }
        push_bounded(&mut self.recent, entry, DIVERGENCE_CAPACITY);
        push_bounded(&mut self.footprint, entry, FOOTPRINT_CAPACITY);
    }

    /// Divergence window, oldest first.
    pub fn recent(&self) -> Vec<LdHistoryEntry> {
        self.recent.iter().copied().collect()
    }

    /// Last `n` footprint entries, oldest first.
    pub fn footprint_tail(&self, n: usize) -> Vec<LdHistoryEntry> {
        let skip = self.footprint.len().saturating_sub(n);
        self.footprint.iter().skip(skip).copied().collect()
    }

    pub fn ld_values(&self) -> Vec<f64> {
        self.footprint.iter().map(|e| e.ld).collect()
    }

    pub fn len(&self) -> usize {
        self.footprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.footprint.is_empty()
    }

    pub fn clear(&mut self) {
        self.recent.clear();
        self.footprint.clear();
    }
}

fn push_bounded(buf: &mut VecDeque<LdHistoryEntry>, entry: LdHistoryEntry, cap: usize) {
    buf.push_back(entry);
    while buf.len() > cap {
        buf.pop_front();
    }
}
