use anyhow::Result;

use crate::model::{LevelRule, User};
use crate::store::Store;

use super::eligibility::meets_level;
use super::graph::{self, TeamLevels};

/// Result of one level-commission pass for a user.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LevelIncome {
    /// Commission across every level the user currently qualifies for,
    /// counting every team member ever qualified.
    pub lifetime: f64,
    /// The repeatable daily portion: only active members with positive
    /// principal generate it.
    pub today: f64,
    pub integrity_warnings: u32,
}

/// Compute level commission for `user` against the configured ladder.
///
/// Both figures are recomputed from scratch each run rather than
/// incrementally, so the calculator is idempotent given consistent input
/// state. Blocked team members contribute zero everywhere.
pub async fn compute(store: &dyn Store, user: &User, rules: &[LevelRule]) -> Result<LevelIncome> {
    let mut income = LevelIncome::default();
    if rules.is_empty() {
        return Ok(income);
    }

    let team = graph::team_by_level(store, &user.id, rules.len()).await?;
    income.integrity_warnings = team.integrity_warnings;
    accumulate(user, &team, rules, &mut income);
    Ok(income)
}

fn accumulate(user: &User, team: &TeamLevels, rules: &[LevelRule], income: &mut LevelIncome) {
    for (i, rule) in rules.iter().enumerate() {
        if rule.blocked {
            continue;
        }

        // Eligibility sees the same blocked-filtered team that the sums use.
        let level_team: Vec<User> = team
            .level(i + 1)
            .iter()
            .filter(|u| !u.is_blocked)
            .cloned()
            .collect();
        if level_team.is_empty() {
            continue;
        }
        if !meets_level(user, &level_team, rule) {
            continue;
        }

        let level_business: f64 = level_team.iter().map(|u| u.self_deposit).sum();
        income.lifetime += level_business * rule.income_percent / 100.0;

        let daily_business: f64 = level_team
            .iter()
            .filter(|u| u.is_active && u.self_deposit > 0.0)
            .map(|u| u.self_deposit)
            .sum();
        income.today += daily_business * rule.income_percent / 100.0;
    }
}
