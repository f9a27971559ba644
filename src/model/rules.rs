use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::settings::RoiSettings;

/// Hard ceiling on configured referral levels and on traversal depth.
pub const MAX_LEVELS: usize = 30;

/// Admin-configured rule for one referral level. Level number is positional:
/// the rule at index 0 of the configured list is level 1, and the list is
/// dense, so removing a rule renumbers the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LevelRule {
    /// Commission percent on level business (0–100, two-decimal precision).
    pub income_percent: f64,
    /// Minimum own approved principal to qualify.
    #[serde(default)]
    pub self_investment_condition: f64,
    /// Minimum combined team principal at this level.
    #[serde(default)]
    pub total_team_business_condition: f64,
    /// Minimum head count at this level.
    #[serde(default)]
    pub total_team_size_condition: u64,
    /// Skip this level entirely in all calculations.
    #[serde(default)]
    pub blocked: bool,
}

/// Admin-configured rank ladder rung. Ranks are ordered 1..M and a user
/// holds the highest rank whose three thresholds are all met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankRule {
    pub rank: u32,
    /// Minimum combined business across all branches.
    pub total_business: f64,
    /// Minimum business on the strongest direct branch.
    pub power_leg_business: f64,
    /// Minimum combined business on the remaining branches.
    pub other_leg_business: f64,
    /// One-time reward on promotion. Must not exceed `total_business`.
    pub reward_income: f64,
}

/// The admin-maintained configuration as seeded/updated in one unit:
/// global ROI settings plus the level and rank ladders.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigBundle {
    pub roi_settings: RoiSettings,
    #[serde(default)]
    pub level_rules: Vec<LevelRule>,
    #[serde(default)]
    pub rank_rules: Vec<RankRule>,
}
