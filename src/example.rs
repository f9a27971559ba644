use crate::model::{ConfigBundle, LevelRule, RankRule, RoiSettings, RoiStatus};

/// Print an example configuration bundle to stdout.
pub fn run() -> anyhow::Result<()> {
    let bundle = example_bundle();
    println!("{}", serde_json::to_string_pretty(&bundle)?);
    Ok(())
}

/// A small but realistic configuration: 1%/day ROI capped at 30%,
/// three commission levels, two ranks.
pub fn example_bundle() -> ConfigBundle {
    ConfigBundle {
        roi_settings: RoiSettings {
            daily_roi: 0.01,
            max_roi: 0.30,
            status: RoiStatus::Active,
            trigger_hour: 10,
            activation_threshold: 20.0,
            settings_version: 0,
        },
        level_rules: vec![
            LevelRule {
                income_percent: 5.0,
                self_investment_condition: 20.0,
                total_team_business_condition: 0.0,
                total_team_size_condition: 1,
                blocked: false,
            },
            LevelRule {
                income_percent: 2.0,
                self_investment_condition: 50.0,
                total_team_business_condition: 100.0,
                total_team_size_condition: 2,
                blocked: false,
            },
            LevelRule {
                income_percent: 1.0,
                self_investment_condition: 100.0,
                total_team_business_condition: 500.0,
                total_team_size_condition: 4,
                blocked: false,
            },
        ],
        rank_rules: vec![
            RankRule {
                rank: 1,
                total_business: 1000.0,
                power_leg_business: 600.0,
                other_leg_business: 400.0,
                reward_income: 100.0,
            },
            RankRule {
                rank: 2,
                total_business: 5000.0,
                power_leg_business: 3000.0,
                other_leg_business: 2000.0,
                reward_income: 500.0,
            },
        ],
    }
}
