use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::flows;
use crate::model::Deposit;

#[derive(Deserialize)]
pub struct CreateDepositRequest {
    pub user_id: String,
    pub amount: f64,
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateDepositRequest>,
) -> Result<Json<Deposit>, ApiError> {
    let deposit = flows::create_deposit(state.store.as_ref(), &req.user_id, req.amount, Utc::now())
        .await
        .map_err(|e| ApiError::BadRequest(format!("{:#}", e)))?;
    Ok(Json(deposit))
}

pub async fn list_pending(
    State(state): State<AppState>,
) -> Result<Json<Vec<Deposit>>, ApiError> {
    Ok(Json(state.store.pending_deposits().await?))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Deposit>, ApiError> {
    let deposit = flows::approve_deposit(
        state.store.as_ref(),
        state.notifier.as_ref(),
        &id,
        Utc::now(),
    )
    .await
    .map_err(|e| ApiError::Conflict(format!("{:#}", e)))?;
    Ok(Json(deposit))
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Deposit>, ApiError> {
    let deposit = flows::reject_deposit(state.store.as_ref(), state.notifier.as_ref(), &id, Utc::now())
        .await
        .map_err(|e| ApiError::Conflict(format!("{:#}", e)))?;
    Ok(Json(deposit))
}
