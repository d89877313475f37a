// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Read endpoints serve the latest
// `TickReport` (or one section of it); control endpoints change the trading
// mode, the consensus weighting and the watched context.
//
// CORS is configured permissively; the API carries no secrets.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use microflow::consensus::ConsensusWeighting;
use microflow::mode::Mode;
use microflow::types::ContextKey;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Read ────────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/alpha", get(alpha))
        .route("/api/v1/regime", get(regime))
        .route("/api/v1/consensus", get(consensus))
        .route("/api/v1/patterns", get(patterns))
        .route("/api/v1/config", get(config))
        // ── Control ─────────────────────────────────────────────────
        .route("/api/v1/control/mode", post(control_mode))
        .route(
            "/api/v1/control/consensus-weighting",
            post(control_consensus_weighting),
        )
        .route("/api/v1/control/context", post(control_context))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
    feed_connected: bool,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
        feed_connected: *state.feed_connected.read(),
    };
    Json(resp)
}

// =============================================================================
// Full state snapshot
// =============================================================================

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.build_snapshot();
    Json(snapshot)
}

// =============================================================================
// Report sections
// =============================================================================

/// Serialise one section of the latest report, or a placeholder body when no
/// tick has been processed for the current context yet.
fn report_section<T: Serialize>(
    state: &AppState,
    name: &str,
    pick: impl FnOnce(&microflow::engine::TickReport) -> T,
) -> axum::response::Response {
    match state.latest_report.read().as_ref() {
        Some(report) => Json(serde_json::json!({
            "context": report.context,
            "timestamp": report.timestamp,
            "quality": report.quality,
            name: pick(report),
        }))
        .into_response(),
        None => Json(serde_json::json!({
            "context": state.context(),
            name: null,
            "message": "No analytics available yet",
        }))
        .into_response(),
    }
}

async fn alpha(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    report_section(&state, "alpha", |r| {
        serde_json::json!({
            "result": r.alpha,
            "published_score": r.published_score,
            "momentum": r.momentum,
        })
    })
}

async fn regime(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    report_section(&state, "regime", |r| {
        serde_json::json!({
            "type": r.regime.regime.to_string(),
            "direction": r.regime.direction,
            "result": r.regime,
        })
    })
}

async fn consensus(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    report_section(&state, "consensus", |r| r.consensus.clone())
}

async fn patterns(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    report_section(&state, "patterns", |r| r.patterns.clone())
}

// =============================================================================
// Config
// =============================================================================

async fn config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.runtime_config.read().clone();
    let profile = *state.engine.lock().profile();
    Json(serde_json::json!({
        "runtime": config,
        "profile": profile,
    }))
}

// =============================================================================
// Control endpoints
// =============================================================================

#[derive(Deserialize)]
struct ModeRequest {
    mode: String,
}

#[derive(Serialize)]
struct ModeResponse {
    mode: Mode,
    message: String,
}

/// Unknown mode names fall back to Investor, like the config loader.
async fn control_mode(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ModeRequest>,
) -> impl IntoResponse {
    let mode = Mode::parse_or_fallback(&req.mode);
    state.set_mode(mode);
    info!(mode = %mode, "Mode changed via API");

    Json(ModeResponse {
        mode,
        message: format!("Mode set to {mode}"),
    })
}

#[derive(Deserialize)]
struct WeightingRequest {
    weighting: String,
}

#[derive(Serialize)]
struct WeightingResponse {
    weighting: ConsensusWeighting,
}

async fn control_consensus_weighting(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WeightingRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let weighting: ConsensusWeighting = req.weighting.parse().map_err(|e: String| {
        warn!(error = %e, "Rejected consensus weighting change");
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("{e}. Use 'aggressive', 'conservative' or 'balanced'."),
            })),
        )
    })?;

    state.set_consensus_weighting(weighting);
    info!(weighting = %weighting, "Consensus weighting changed via API");

    Ok(Json(WeightingResponse { weighting }))
}

#[derive(Deserialize)]
struct ContextRequest {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    timeframe: Option<String>,
}

#[derive(Serialize)]
struct ContextResponse {
    context: ContextKey,
}

async fn control_context(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ContextRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if req.symbol.is_none() && req.timeframe.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Provide at least one of 'symbol' or 'timeframe'",
            })),
        ));
    }

    let context = state.set_context(req.symbol, req.timeframe);
    Ok(Json(ContextResponse { context }))
}
