#![allow(dead_code)]

use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use payout_flow::model::{
    Deposit, DepositStatus, LevelRule, RankRule, RoiSettings, RoiStatus, User,
};
use payout_flow::notify::NotificationSink;
use payout_flow::store::Store;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// 1%/day ROI capped at 30%, active, $20 activation.
pub fn active_settings() -> RoiSettings {
    RoiSettings {
        daily_roi: 0.01,
        max_roi: 0.30,
        status: RoiStatus::Active,
        trigger_hour: 10,
        activation_threshold: 20.0,
        settings_version: 1,
    }
}

pub fn level_rule(percent: f64) -> LevelRule {
    LevelRule {
        income_percent: percent,
        self_investment_condition: 0.0,
        total_team_business_condition: 0.0,
        total_team_size_condition: 0,
        blocked: false,
    }
}

pub fn rank_rule(rank: u32, total: f64, power: f64, other: f64, reward: f64) -> RankRule {
    RankRule {
        rank,
        total_business: total,
        power_leg_business: power,
        other_leg_business: other,
        reward_income: reward,
    }
}

/// Insert an active user with the given principal.
pub async fn add_user(
    store: &dyn Store,
    id: &str,
    referrer: Option<&str>,
    self_deposit: f64,
) -> User {
    let mut user = User::new(
        id.to_string(),
        format!("user {id}"),
        referrer.map(str::to_string),
        at(2026, 1, 1, 0),
    );
    user.self_deposit = self_deposit;
    user.is_active = true;
    store.insert_user(&user).await.unwrap();
    user
}

/// Insert an approved deposit anchored at `approved_at`.
pub async fn add_approved_deposit(
    store: &dyn Store,
    id: &str,
    user_id: &str,
    amount: f64,
    approved_at: DateTime<Utc>,
) -> Deposit {
    let mut deposit = Deposit::new(id.to_string(), user_id.to_string(), amount, approved_at);
    deposit.status = DepositStatus::Approved;
    deposit.approved_at = Some(approved_at);
    store.insert_deposit(&deposit).await.unwrap();
    deposit
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Sink that records deliveries for assertions.
#[derive(Default)]
pub struct CollectingSink {
    pub delivered: Mutex<Vec<(String, String)>>,
}

impl NotificationSink for CollectingSink {
    fn deliver(&self, user_id: &str, message: &str) {
        self.delivered
            .lock()
            .unwrap()
            .push((user_id.to_string(), message.to_string()));
    }
}
