use std::path::Path;

use thiserror::Error;

use crate::model::rules::MAX_LEVELS;
use crate::model::{ConfigBundle, RoiSettings};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("daily_roi must be positive, got {value}")]
    NonPositiveDailyRoi { value: f64 },

    #[error("max_roi {max} is below daily_roi {daily}; no deposit could ever accrue a full day")]
    MaxBelowDaily { daily: f64, max: f64 },

    #[error("trigger_hour {hour} outside valid range 0..=23")]
    TriggerHourOutOfRange { hour: u32 },

    #[error("activation_threshold must be non-negative, got {value}")]
    NegativeActivationThreshold { value: f64 },

    #[error("{count} level rules configured, maximum is {MAX_LEVELS}")]
    TooManyLevels { count: usize },

    #[error("level {level}: income_percent {value} outside valid range 0..=100")]
    PercentOutOfRange { level: usize, value: f64 },

    #[error("level {level}: {field} must be non-negative, got {value}")]
    NegativeLevelThreshold {
        level: usize,
        field: &'static str,
        value: f64,
    },

    #[error("rank rules must be dense and ascending from 1; position {position} has rank {rank}")]
    RankNotDense { position: usize, rank: u32 },

    #[error("rank {rank}: {field} must be non-negative, got {value}")]
    NegativeRankThreshold {
        rank: u32,
        field: &'static str,
        value: f64,
    },

    #[error("rank {rank}: reward_income {reward} exceeds total_business {total_business}")]
    RewardExceedsBusiness {
        rank: u32,
        reward: f64,
        total_business: f64,
    },
}

/// Load and fully validate a configuration bundle from a JSON file.
pub fn load_and_validate(path: &Path) -> Result<ConfigBundle, Vec<ValidationError>> {
    let contents = std::fs::read_to_string(path).map_err(|e| vec![ValidationError::Io(e)])?;
    let bundle: ConfigBundle =
        serde_json::from_str(&contents).map_err(|e| vec![ValidationError::Json(e)])?;
    validate(&bundle)?;
    Ok(bundle)
}

/// Validate a configuration bundle, collecting all errors. Business-rule
/// violations are rejected here, before anything reaches the store.
pub fn validate(bundle: &ConfigBundle) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_settings(&bundle.roi_settings, &mut errors);

    if bundle.level_rules.len() > MAX_LEVELS {
        errors.push(ValidationError::TooManyLevels {
            count: bundle.level_rules.len(),
        });
    }
    for (i, rule) in bundle.level_rules.iter().enumerate() {
        let level = i + 1;
        if !(0.0..=100.0).contains(&rule.income_percent) {
            errors.push(ValidationError::PercentOutOfRange {
                level,
                value: rule.income_percent,
            });
        }
        for (field, value) in [
            ("self_investment_condition", rule.self_investment_condition),
            (
                "total_team_business_condition",
                rule.total_team_business_condition,
            ),
        ] {
            if value < 0.0 {
                errors.push(ValidationError::NegativeLevelThreshold { level, field, value });
            }
        }
    }

    for (i, rule) in bundle.rank_rules.iter().enumerate() {
        if rule.rank as usize != i + 1 {
            errors.push(ValidationError::RankNotDense {
                position: i + 1,
                rank: rule.rank,
            });
        }
        for (field, value) in [
            ("total_business", rule.total_business),
            ("power_leg_business", rule.power_leg_business),
            ("other_leg_business", rule.other_leg_business),
            ("reward_income", rule.reward_income),
        ] {
            if value < 0.0 {
                errors.push(ValidationError::NegativeRankThreshold {
                    rank: rule.rank,
                    field,
                    value,
                });
            }
        }
        if rule.reward_income > rule.total_business {
            errors.push(ValidationError::RewardExceedsBusiness {
                rank: rule.rank,
                reward: rule.reward_income,
                total_business: rule.total_business,
            });
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_settings(settings: &RoiSettings, errors: &mut Vec<ValidationError>) {
    if settings.daily_roi <= 0.0 {
        errors.push(ValidationError::NonPositiveDailyRoi {
            value: settings.daily_roi,
        });
    } else if settings.max_roi < settings.daily_roi {
        errors.push(ValidationError::MaxBelowDaily {
            daily: settings.daily_roi,
            max: settings.max_roi,
        });
    }
    if settings.trigger_hour > 23 {
        errors.push(ValidationError::TriggerHourOutOfRange {
            hour: settings.trigger_hour,
        });
    }
    if settings.activation_threshold < 0.0 {
        errors.push(ValidationError::NegativeActivationThreshold {
            value: settings.activation_threshold,
        });
    }
}

/// Entry point for the `validate` CLI command.
pub fn run(path: &Path) -> anyhow::Result<()> {
    match load_and_validate(path) {
        Ok(bundle) => {
            println!(
                "OK: {} level rules, {} rank rules, daily ROI {:.4}, cap {:.4}",
                bundle.level_rules.len(),
                bundle.rank_rules.len(),
                bundle.roi_settings.daily_roi,
                bundle.roi_settings.max_roi
            );
            Ok(())
        }
        Err(errors) => {
            eprintln!("Validation failed with {} error(s):", errors.len());
            for e in &errors {
                eprintln!("  - {e}");
            }
            anyhow::bail!("invalid configuration");
        }
    }
}
