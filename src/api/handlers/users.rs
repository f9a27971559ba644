use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::engine::graph;
use crate::flows;
use crate::model::rules::MAX_LEVELS;
use crate::model::{KycStatus, LedgerEntry, User};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub referrer_id: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<User>, ApiError> {
    let user = flows::register_user(
        state.store.as_ref(),
        &req.name,
        req.referrer_id.as_deref(),
        Utc::now(),
    )
    .await
    .map_err(|e| ApiError::BadRequest(format!("{:#}", e)))?;
    Ok(Json(user))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .store
        .get_user(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user '{id}' not found")))?;
    Ok(Json(user))
}

#[derive(Serialize)]
pub struct TeamLevelResponse {
    pub level: usize,
    pub members: Vec<User>,
}

#[derive(Serialize)]
pub struct TeamResponse {
    pub levels: Vec<TeamLevelResponse>,
    pub total_size: usize,
    pub integrity_warnings: u32,
}

pub async fn team(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TeamResponse>, ApiError> {
    if state.store.get_user(&id).await?.is_none() {
        return Err(ApiError::NotFound(format!("user '{id}' not found")));
    }

    let team = graph::team_by_level(state.store.as_ref(), &id, MAX_LEVELS).await?;
    let total_size = team.total_size();
    Ok(Json(TeamResponse {
        total_size,
        integrity_warnings: team.integrity_warnings,
        levels: team
            .levels
            .into_iter()
            .enumerate()
            .map(|(i, members)| TeamLevelResponse {
                level: i + 1,
                members,
            })
            .collect(),
    }))
}

pub async fn ledger(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    if state.store.get_user(&id).await?.is_none() {
        return Err(ApiError::NotFound(format!("user '{id}' not found")));
    }
    Ok(Json(state.store.ledger_for_user(&id).await?))
}

#[derive(Deserialize)]
pub struct KycRequest {
    pub status: KycStatus,
}

pub async fn set_kyc(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<KycRequest>,
) -> Result<Json<User>, ApiError> {
    let user = flows::set_kyc_status(
        state.store.as_ref(),
        state.notifier.as_ref(),
        &id,
        req.status,
    )
    .await
    .map_err(|e| ApiError::BadRequest(format!("{:#}", e)))?;
    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct BlockRequest {
    pub blocked: bool,
}

pub async fn set_blocked(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<BlockRequest>,
) -> Result<Json<User>, ApiError> {
    let user = flows::set_blocked(state.store.as_ref(), &id, req.blocked)
        .await
        .map_err(|e| ApiError::BadRequest(format!("{:#}", e)))?;
    Ok(Json(user))
}
