use axum::Json;
use axum::extract::State;
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::engine::{RankSummary, RunSummary};

/// Manual admin trigger. Bypasses the daily timer entirely; the poster's
/// per-day watermarks still make a second trigger for the same day a
/// no-op.
pub async fn trigger(State(state): State<AppState>) -> Result<Json<RunSummary>, ApiError> {
    let summary = state.engine.run_daily(Utc::now()).await?;
    *state.last_summary.write().await = Some(summary.clone());
    Ok(Json(summary))
}

pub async fn trigger_ranks(State(state): State<AppState>) -> Result<Json<RankSummary>, ApiError> {
    Ok(Json(state.engine.evaluate_ranks(Utc::now()).await?))
}

pub async fn last_summary(
    State(state): State<AppState>,
) -> Result<Json<Option<RunSummary>>, ApiError> {
    Ok(Json(state.last_summary.read().await.clone()))
}
