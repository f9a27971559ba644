use axum::Json;
use axum::extract::State;
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::model::ConfigBundle;
use crate::validate;

pub async fn get_config(State(state): State<AppState>) -> Result<Json<ConfigBundle>, ApiError> {
    Ok(Json(ConfigBundle {
        roi_settings: state.store.roi_settings().await?,
        level_rules: state.store.level_rules().await?,
        rank_rules: state.store.rank_rules().await?,
    }))
}

/// Replace the admin configuration as one unit. Stamps a fresh
/// `settings_version`, which marks any in-flight scheduled run stale.
pub async fn put_config(
    State(state): State<AppState>,
    Json(mut bundle): Json<ConfigBundle>,
) -> Result<Json<ConfigBundle>, ApiError> {
    if let Err(errors) = validate::validate(&bundle) {
        return Err(ApiError::Validation(
            errors.iter().map(|e| e.to_string()).collect(),
        ));
    }

    bundle.roi_settings.settings_version = Utc::now().timestamp_millis();
    state.store.put_roi_settings(&bundle.roi_settings).await?;
    state.store.put_level_rules(&bundle.level_rules).await?;
    state.store.put_rank_rules(&bundle.rank_rules).await?;
    Ok(Json(bundle))
}
