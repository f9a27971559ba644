use crate::model::{LevelRule, User};

/// Decide whether `user` qualifies for a level's commission.
///
/// Three independent conditions must all hold: own investment, combined
/// team business at the level, and team head count. A blocked rule
/// short-circuits to ineligible.
pub fn meets_level(user: &User, level_team: &[User], rule: &LevelRule) -> bool {
    if rule.blocked {
        return false;
    }

    let team_business: f64 = level_team.iter().map(|u| u.self_deposit).sum();

    user.self_deposit >= rule.self_investment_condition
        && team_business >= rule.total_team_business_condition
        && level_team.len() as u64 >= rule.total_team_size_condition
}
