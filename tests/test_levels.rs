mod common;

use common::{add_user, approx, level_rule};

use payout_flow::engine::{eligibility, level};
use payout_flow::model::LevelRule;
use payout_flow::store::Store;
use payout_flow::store::memory::MemoryStore;

fn gated_rule() -> LevelRule {
    LevelRule {
        income_percent: 5.0,
        self_investment_condition: 100.0,
        total_team_business_condition: 200.0,
        total_team_size_condition: 2,
        blocked: false,
    }
}

#[tokio::test]
async fn all_three_conditions_must_hold() {
    let store = MemoryStore::new();
    let weak = add_user(&store, "a", None, 50.0).await;
    let strong = add_user(&store, "a2", None, 100.0).await;
    let t1 = add_user(&store, "b", Some("a"), 100.0).await;
    let t2 = add_user(&store, "c", Some("a"), 100.0).await;

    let rule = gated_rule();
    let team = vec![t1, t2];

    // 2 of 3: own investment short.
    assert!(!eligibility::meets_level(&weak, &team, &rule));
    // All 3.
    assert!(eligibility::meets_level(&strong, &team, &rule));
    // 2 of 3: team too small.
    assert!(!eligibility::meets_level(&strong, &team[..1], &rule));
}

#[tokio::test]
async fn blocked_rule_short_circuits() {
    let store = MemoryStore::new();
    let user = add_user(&store, "a", None, 1000.0).await;
    let team = vec![add_user(&store, "b", Some("a"), 1000.0).await];

    let mut rule = level_rule(5.0);
    rule.blocked = true;
    assert!(!eligibility::meets_level(&user, &team, &rule));
}

#[tokio::test]
async fn failed_level_pays_zero_passed_level_pays_percent() {
    let store = MemoryStore::new();
    let user = add_user(&store, "a", None, 100.0).await;
    add_user(&store, "b", Some("a"), 100.0).await;
    add_user(&store, "c", Some("a"), 100.0).await;

    // Level 1 passes (200 business, 2 members), level 2 has nobody.
    let rules = vec![gated_rule(), gated_rule()];
    let income = level::compute(&store, &user, &rules).await.unwrap();
    assert!(approx(income.lifetime, 200.0 * 5.0 / 100.0));
    assert!(approx(income.today, 10.0));

    // Weaker upline meets only 2 of 3 conditions: zero from that level.
    let mut weak = user.clone();
    weak.self_deposit = 50.0;
    store.update_user(&weak).await.unwrap();
    let income = level::compute(&store, &weak, &rules).await.unwrap();
    assert!(approx(income.lifetime, 0.0));
    assert!(approx(income.today, 0.0));
}

#[tokio::test]
async fn daily_income_counts_only_active_members() {
    let store = MemoryStore::new();
    let user = add_user(&store, "a", None, 0.0).await;
    add_user(&store, "b", Some("a"), 300.0).await;
    let mut inactive = add_user(&store, "c", Some("a"), 200.0).await;
    inactive.is_active = false;
    store.update_user(&inactive).await.unwrap();

    let rules = vec![level_rule(10.0)];
    let income = level::compute(&store, &user, &rules).await.unwrap();
    // Lifetime counts everyone qualified; daily only the active member.
    assert!(approx(income.lifetime, 500.0 * 0.10));
    assert!(approx(income.today, 300.0 * 0.10));
}

#[tokio::test]
async fn blocked_members_count_for_nothing() {
    let store = MemoryStore::new();
    let user = add_user(&store, "a", None, 100.0).await;
    add_user(&store, "b", Some("a"), 100.0).await;
    let mut blocked = add_user(&store, "c", Some("a"), 100.0).await;
    blocked.is_blocked = true;
    store.update_user(&blocked).await.unwrap();

    // Needs 2 members and 200 business at level 1; the blocked member
    // no longer counts toward either.
    let rules = vec![gated_rule()];
    let income = level::compute(&store, &user, &rules).await.unwrap();
    assert!(approx(income.lifetime, 0.0));
    assert!(approx(income.today, 0.0));
}

#[tokio::test]
async fn deeper_levels_use_their_own_rule() {
    let store = MemoryStore::new();
    let user = add_user(&store, "a", None, 0.0).await;
    add_user(&store, "b", Some("a"), 100.0).await;
    add_user(&store, "c", Some("b"), 400.0).await;

    let rules = vec![level_rule(5.0), level_rule(2.0)];
    let income = level::compute(&store, &user, &rules).await.unwrap();
    assert!(approx(income.lifetime, 100.0 * 0.05 + 400.0 * 0.02));
}
