// =============================================================================
// microflow — Main Entry Point
// =============================================================================
//
// Feeds one Binance partial-depth stream into the analytics engine and serves
// the results over REST. The watched context can be switched at runtime; the
// feed reconnects to the new symbol immediately.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod market_data;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::StreamExit;
use microflow::runtime_config::RuntimeConfig;

const CONFIG_PATH: &str = "runtime_config.json";
const RECONNECT_DELAY_SECS: u64 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        microflow — Starting Up                           ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides();

    let bind_addr = config.bind_addr.clone();
    info!(
        symbol = %config.symbol,
        timeframe = %config.timeframe,
        mode = %config.mode(),
        consensus_weighting = %config.consensus_weighting,
        "Engine configured"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config));

    // ── 3. Depth feed ────────────────────────────────────────────────────
    let feed_state = state.clone();
    tokio::spawn(async move {
        loop {
            let context = feed_state.context();
            let context_rx = feed_state.subscribe_context();

            match market_data::run_depth_stream(&feed_state, context.clone(), context_rx).await {
                Ok(StreamExit::ContextChanged) => continue,
                Ok(StreamExit::Closed) => {
                    warn!(context = %context, "Depth stream closed — reconnecting in 5s");
                }
                Err(e) => {
                    error!(
                        context = %context,
                        error = %e,
                        "Depth stream error — reconnecting in 5s"
                    );
                    feed_state.push_error(format!("depth stream {context}: {e:#}"));
                }
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(RECONNECT_DELAY_SECS)).await;
        }
    });

    // ── 4. Start the API server ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let api_state = state.clone();
    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    let config = state.runtime_config.read().clone();
    if let Err(e) = config.save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("microflow shut down complete.");
    Ok(())
}
