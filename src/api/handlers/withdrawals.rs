use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::flows;
use crate::model::Withdrawal;
use crate::store::SettleOutcome;

#[derive(Deserialize)]
pub struct RequestWithdrawalRequest {
    pub user_id: String,
    pub amount: f64,
}

pub async fn request(
    State(state): State<AppState>,
    Json(req): Json<RequestWithdrawalRequest>,
) -> Result<Json<Withdrawal>, ApiError> {
    let withdrawal =
        flows::request_withdrawal(state.store.as_ref(), &req.user_id, req.amount, Utc::now())
            .await
            .map_err(|e| ApiError::BadRequest(format!("{:#}", e)))?;
    Ok(Json(withdrawal))
}

pub async fn list_pending(
    State(state): State<AppState>,
) -> Result<Json<Vec<Withdrawal>>, ApiError> {
    Ok(Json(state.store.pending_withdrawals().await?))
}

#[derive(Serialize)]
pub struct SettleResponse {
    pub outcome: String,
}

async fn settle(state: &AppState, id: &str, approve: bool) -> Result<SettleResponse, ApiError> {
    let outcome = flows::settle_withdrawal(
        state.store.as_ref(),
        state.notifier.as_ref(),
        id,
        approve,
        Utc::now(),
    )
    .await
    .map_err(|e| ApiError::Conflict(format!("{:#}", e)))?;

    let outcome = match outcome {
        SettleOutcome::Approved { .. } => "approved",
        SettleOutcome::InsufficientBalance => "rejected_insufficient_balance",
        SettleOutcome::Rejected => "rejected",
        SettleOutcome::AlreadySettled => {
            return Err(ApiError::Conflict(format!(
                "withdrawal '{id}' is already settled"
            )));
        }
    };
    Ok(SettleResponse {
        outcome: outcome.to_string(),
    })
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SettleResponse>, ApiError> {
    Ok(Json(settle(&state, &id, true).await?))
}

pub async fn reject(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SettleResponse>, ApiError> {
    Ok(Json(settle(&state, &id, false).await?))
}
