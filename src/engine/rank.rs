use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::model::{RankRule, User};
use crate::notify::NotificationSink;
use crate::store::Store;

use super::graph::{self, LegSplit};

/// A rank promotion that was applied to a user.
#[derive(Debug, Clone, PartialEq)]
pub struct Promotion {
    pub user_id: String,
    pub from_rank: u32,
    pub to_rank: u32,
    pub reward: f64,
    pub legs: LegSplit,
}

/// Select the highest rank whose three thresholds are all met. Returns
/// `None` when no rung qualifies; the caller leaves the current rank
/// unchanged (ranks are never revoked here, demotion is an explicit
/// admin action).
pub fn qualify(rules: &[RankRule], total_business: f64, legs: &LegSplit) -> Option<RankRule> {
    rules
        .iter()
        .filter(|r| {
            total_business >= r.total_business
                && legs.power_leg >= r.power_leg_business
                && legs.other_leg >= r.other_leg_business
        })
        .max_by_key(|r| r.rank)
        .cloned()
}

/// Evaluate one user against the rank ladder and apply a promotion when
/// one is due.
///
/// The user-field updates and the reward ledger entry commit atomically
/// through the store; the notification is fire-and-forget and a delivery
/// failure never rolls the promotion back.
pub async fn evaluate(
    store: &dyn Store,
    notifier: &dyn NotificationSink,
    user: &User,
    rules: &[RankRule],
    now: DateTime<Utc>,
) -> Result<Option<Promotion>> {
    if rules.is_empty() || user.is_blocked {
        return Ok(None);
    }

    let legs = graph::leg_split(store, &user.id).await?;
    let total_business = legs.total();

    let Some(rule) = qualify(rules, total_business, &legs) else {
        return Ok(None);
    };
    if rule.rank <= user.rank {
        return Ok(None);
    }

    let applied = store
        .record_promotion(
            &user.id,
            rule.rank,
            rule.reward_income,
            legs.power_leg,
            legs.other_leg,
            now.date_naive(),
            now,
        )
        .await?;
    if !applied {
        // Someone else promoted this user past `rule.rank` first.
        return Ok(None);
    }

    notifier.deliver(
        &user.id,
        &format!(
            "Congratulations! You reached rank {} and earned a reward of ${:.2}",
            rule.rank, rule.reward_income
        ),
    );

    Ok(Some(Promotion {
        user_id: user.id.clone(),
        from_rank: user.rank,
        to_rank: rule.rank,
        reward: rule.reward_income,
        legs,
    }))
}
