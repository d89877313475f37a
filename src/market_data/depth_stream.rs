// =============================================================================
// Depth Stream — Binance partial book depth → engine snapshots
// =============================================================================
//
// Subscribes to `<symbol>@depth20@100ms`. Every message becomes one
// `Snapshot`: bids are support levels, asks are resistance levels and the
// current price is the mid of the best bid and best ask.
//
// The stream returns as soon as the configured context changes so that the
// caller can reconnect to the new symbol.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tracing::{error, info, warn};

use crate::app_state::AppState;
use microflow::types::{ContextKey, Level, Snapshot};

/// Why a depth stream returned without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamExit {
    /// The configured context changed; reconnect immediately.
    ContextChanged,
    /// The exchange closed the stream.
    Closed,
}

pub fn depth_url(symbol: &str) -> String {
    let lower = symbol.to_lowercase();
    format!("wss://stream.binance.com:9443/ws/{lower}@depth20@100ms")
}

/// Stream depth snapshots for `context` into the engine until the stream
/// ends, fails, or the context changes.
pub async fn run_depth_stream(
    state: &Arc<AppState>,
    context: ContextKey,
    mut context_rx: watch::Receiver<ContextKey>,
) -> Result<StreamExit> {
    let url = depth_url(&context.symbol);
    info!(url = %url, context = %context, "connecting to depth WebSocket");

    let (ws_stream, _response) = connect_async(&url)
        .await
        .context("failed to connect to depth WebSocket")?;

    info!(context = %context, "depth WebSocket connected");
    state.set_feed_connected(true);
    let (_write, mut read) = ws_stream.split();

    let exit = loop {
        tokio::select! {
            changed = context_rx.changed() => {
                if changed.is_err() {
                    break Ok(StreamExit::Closed);
                }
                if *context_rx.borrow_and_update() != context {
                    info!(context = %context, "context changed, dropping depth stream");
                    break Ok(StreamExit::ContextChanged);
                }
            }
            msg = read.next() => match msg {
                Some(Ok(tokio_tungstenite::tungstenite::Message::Text(text))) => {
                    match parse_depth_message(&context, &text) {
                        Ok(snapshot) => {
                            state.ingest(snapshot);
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to parse depth message");
                        }
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(context = %context, error = %e, "depth WebSocket read error");
                    break Err(e.into());
                }
                None => {
                    warn!(context = %context, "depth WebSocket stream ended");
                    break Ok(StreamExit::Closed);
                }
            }
        }
    };

    state.set_feed_connected(false);
    exit
}

/// Parse one partial-depth payload into a snapshot for `context`.
///
/// Expected shape: `{"lastUpdateId":…, "bids":[["price","qty"],…], "asks":[…]}`.
pub fn parse_depth_message(context: &ContextKey, text: &str) -> Result<Snapshot> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse depth JSON")?;

    let bids = root["bids"].as_array().context("missing field bids")?;
    let asks = root["asks"].as_array().context("missing field asks")?;

    let bid_levels = parse_side(bids, Level::support);
    let ask_levels = parse_side(asks, Level::resistance);

    let best_bid = bid_levels.iter().map(|l| l.price).fold(0.0_f64, f64::max);
    let best_ask = ask_levels
        .iter()
        .map(|l| l.price)
        .fold(f64::INFINITY, f64::min);

    let price = match (best_bid > 0.0, best_ask.is_finite()) {
        (true, true) => (best_bid + best_ask) / 2.0,
        (true, false) => best_bid,
        (false, true) => best_ask,
        (false, false) => 0.0,
    };

    let mut levels = bid_levels;
    levels.extend(ask_levels);

    Ok(Snapshot::new(
        levels,
        price,
        context.symbol.clone(),
        context.timeframe.clone(),
    ))
}

fn parse_side(entries: &[serde_json::Value], make: fn(f64, f64) -> Level) -> Vec<Level> {
    entries
        .iter()
        .filter_map(|e| {
            let price = e.get(0)?.as_str()?.parse::<f64>().ok()?;
            let qty = e.get(1)?.as_str()?.parse::<f64>().ok()?;
            Some(make(price, qty))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use microflow::types::Side;

    fn ctx() -> ContextKey {
        ContextKey::new("BTCUSDT", "1m")
    }

    #[test]
    fn parses_bids_and_asks_into_levels() {
        let text = r#"{"lastUpdateId":160,
            "bids":[["100.0","5.0"],["99.5","2.0"]],
            "asks":[["101.0","3.0"],["101.5","1.0"]]}"#;
        let snap = parse_depth_message(&ctx(), text).unwrap();
        assert_eq!(snap.levels.len(), 4);
        assert_eq!(snap.supports().count(), 2);
        assert_eq!(snap.resistances().count(), 2);
        assert!((snap.current_price - 100.5).abs() < 1e-9);
        assert_eq!(snap.levels[0].side, Side::Support);
        assert_eq!(snap.key(), ctx());
    }

    #[test]
    fn one_sided_book_uses_best_available_price() {
        let text = r#"{"lastUpdateId":1,"bids":[],"asks":[["50.0","1.0"],["49.0","1.0"]]}"#;
        let snap = parse_depth_message(&ctx(), text).unwrap();
        assert!((snap.current_price - 49.0).abs() < 1e-9);
    }

    #[test]
    fn empty_book_has_no_price() {
        let text = r#"{"lastUpdateId":1,"bids":[],"asks":[]}"#;
        let snap = parse_depth_message(&ctx(), text).unwrap();
        assert!(!snap.has_valid_price());
        assert!(snap.levels.is_empty());
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let text = r#"{"bids":[["abc","1.0"],["99.0"]],"asks":[["101.0","0"]]}"#;
        let snap = parse_depth_message(&ctx(), text).unwrap();
        assert_eq!(snap.levels.len(), 1);
        assert_eq!(snap.levels[0].side, Side::Resistance);
    }

    #[test]
    fn missing_sides_is_an_error() {
        assert!(parse_depth_message(&ctx(), r#"{"lastUpdateId":1}"#).is_err());
        assert!(parse_depth_message(&ctx(), "not json").is_err());
    }

    #[test]
    fn url_is_lowercase() {
        assert_eq!(
            depth_url("ETHUSDT"),
            "wss://stream.binance.com:9443/ws/ethusdt@depth20@100ms"
        );
    }
}
