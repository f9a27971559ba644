use std::collections::HashMap;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::model::{
    Deposit, DepositStatus, IncomeType, KycStatus, LedgerEntry, LevelRule, RankRule, RoiSettings,
    User, Withdrawal, WithdrawalStatus,
};
use crate::scheduler::state::SchedulerState;

use super::{DepositSettleOutcome, PostOutcome, SettleOutcome, Store};

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    user_order: Vec<String>,
    deposits: HashMap<String, Deposit>,
    deposit_order: Vec<String>,
    withdrawals: HashMap<String, Withdrawal>,
    withdrawal_order: Vec<String>,
    ledger: Vec<LedgerEntry>,
    roi_settings: RoiSettings,
    level_rules: Vec<LevelRule>,
    rank_rules: Vec<RankRule>,
    scheduler_state: Option<SchedulerState>,
}

/// In-memory store. One mutex guards everything, so every primitive is
/// trivially atomic. Backs the integration tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.users.contains_key(&user.id) {
            bail!("user {} already exists", user.id);
        }
        inner.user_order.push(user.id.clone());
        inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(id).cloned())
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.users.contains_key(&user.id) {
            bail!("user {} not found", user.id);
        }
        inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn set_kyc_status(&self, user_id: &str, status: KycStatus) -> Result<User> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get_mut(user_id) else {
            bail!("user {user_id} not found");
        };
        user.kyc_status = status;
        Ok(user.clone())
    }

    async fn set_blocked(&self, user_id: &str, blocked: bool) -> Result<User> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get_mut(user_id) else {
            bail!("user {user_id} not found");
        };
        user.is_blocked = blocked;
        Ok(user.clone())
    }

    async fn list_payable_users(&self) -> Result<Vec<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .user_order
            .iter()
            .filter_map(|id| inner.users.get(id))
            .filter(|u| u.is_active && !u.is_blocked)
            .cloned()
            .collect())
    }

    async fn direct_referrals(&self, user_id: &str) -> Result<Vec<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .user_order
            .iter()
            .filter_map(|id| inner.users.get(id))
            .filter(|u| u.referrer_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn insert_deposit(&self, deposit: &Deposit) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.deposit_order.push(deposit.id.clone());
        inner.deposits.insert(deposit.id.clone(), deposit.clone());
        Ok(())
    }

    async fn get_deposit(&self, id: &str) -> Result<Option<Deposit>> {
        let inner = self.inner.lock().await;
        Ok(inner.deposits.get(id).cloned())
    }

    async fn approved_deposits(&self, user_id: &str) -> Result<Vec<Deposit>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .deposit_order
            .iter()
            .filter_map(|id| inner.deposits.get(id))
            .filter(|d| d.user_id == user_id && d.status == DepositStatus::Approved)
            .cloned()
            .collect())
    }

    async fn pending_deposits(&self) -> Result<Vec<Deposit>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .deposit_order
            .iter()
            .filter_map(|id| inner.deposits.get(id))
            .filter(|d| d.status == DepositStatus::Pending)
            .cloned()
            .collect())
    }

    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.withdrawal_order.push(withdrawal.id.clone());
        inner
            .withdrawals
            .insert(withdrawal.id.clone(), withdrawal.clone());
        Ok(())
    }

    async fn get_withdrawal(&self, id: &str) -> Result<Option<Withdrawal>> {
        let inner = self.inner.lock().await;
        Ok(inner.withdrawals.get(id).cloned())
    }

    async fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .withdrawal_order
            .iter()
            .filter_map(|id| inner.withdrawals.get(id))
            .filter(|w| w.status == WithdrawalStatus::Pending)
            .cloned()
            .collect())
    }

    async fn ledger_for_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .ledger
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn roi_settings(&self) -> Result<RoiSettings> {
        let inner = self.inner.lock().await;
        Ok(inner.roi_settings.clone())
    }

    async fn put_roi_settings(&self, settings: &RoiSettings) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.roi_settings = settings.clone();
        Ok(())
    }

    async fn level_rules(&self) -> Result<Vec<LevelRule>> {
        let inner = self.inner.lock().await;
        Ok(inner.level_rules.clone())
    }

    async fn put_level_rules(&self, rules: &[LevelRule]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.level_rules = rules.to_vec();
        Ok(())
    }

    async fn rank_rules(&self) -> Result<Vec<RankRule>> {
        let inner = self.inner.lock().await;
        Ok(inner.rank_rules.clone())
    }

    async fn put_rank_rules(&self, rules: &[RankRule]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.rank_rules = rules.to_vec();
        Ok(())
    }

    async fn scheduler_state(&self) -> Result<Option<SchedulerState>> {
        let inner = self.inner.lock().await;
        Ok(inner.scheduler_state.clone())
    }

    async fn put_scheduler_state(&self, state: &SchedulerState) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.scheduler_state = Some(state.clone());
        Ok(())
    }

    async fn post_income(
        &self,
        user_id: &str,
        roi_portion: f64,
        level_portion: f64,
        for_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<PostOutcome> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get(user_id).cloned() else {
            bail!("posting income: user {user_id} not found");
        };

        let roi_due = roi_portion > 0.0 && user.last_roi_date.is_none_or(|d| for_date > d);
        let level_due =
            level_portion > 0.0 && user.last_level_income_date.is_none_or(|d| for_date > d);

        let mut user = user;
        let mut outcome = PostOutcome::default();
        if roi_due {
            user.balance += roi_portion;
            user.last_roi_date = Some(for_date);
            outcome.roi_credited = roi_portion;
            inner.ledger.push(LedgerEntry::credited(
                Uuid::new_v4().to_string(),
                user_id.to_string(),
                IncomeType::Roi,
                roi_portion,
                for_date,
                now,
            ));
        }
        if level_due {
            user.balance += level_portion;
            user.last_level_income_date = Some(for_date);
            outcome.level_credited = level_portion;
            inner.ledger.push(LedgerEntry::credited(
                Uuid::new_v4().to_string(),
                user_id.to_string(),
                IncomeType::Level,
                level_portion,
                for_date,
                now,
            ));
        }
        inner.users.insert(user_id.to_string(), user);
        Ok(outcome)
    }

    async fn record_promotion(
        &self,
        user_id: &str,
        rank: u32,
        reward: f64,
        power_leg: f64,
        other_leg: f64,
        for_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get(user_id).cloned() else {
            bail!("recording promotion: user {user_id} not found");
        };
        if user.rank >= rank {
            return Ok(false);
        }

        let mut user = user;
        user.rank = rank;
        user.reward += reward;
        user.power_leg_business = power_leg;
        user.other_leg_business = other_leg;
        inner.users.insert(user_id.to_string(), user);
        inner.ledger.push(LedgerEntry::credited(
            Uuid::new_v4().to_string(),
            user_id.to_string(),
            IncomeType::Reward,
            reward,
            for_date,
            now,
        ));
        Ok(true)
    }

    async fn settle_deposit(
        &self,
        deposit_id: &str,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<DepositSettleOutcome> {
        let mut inner = self.inner.lock().await;
        let Some(deposit) = inner.deposits.get(deposit_id).cloned() else {
            bail!("deposit {deposit_id} not found");
        };
        if deposit.status != DepositStatus::Pending {
            return Ok(DepositSettleOutcome::AlreadySettled);
        }

        let mut deposit = deposit;
        if !approve {
            deposit.status = DepositStatus::Rejected;
            inner.deposits.insert(deposit_id.to_string(), deposit.clone());
            return Ok(DepositSettleOutcome::Rejected(deposit));
        }

        let Some(user) = inner.users.get(&deposit.user_id).cloned() else {
            bail!(
                "deposit {deposit_id} references missing user {}",
                deposit.user_id
            );
        };
        let threshold = inner.roi_settings.activation_threshold;

        let mut user = user;
        user.self_deposit += deposit.amount;
        let newly_active = !user.is_active && user.self_deposit >= threshold;
        if newly_active {
            user.is_active = true;
        }
        inner.users.insert(user.id.clone(), user);

        deposit.status = DepositStatus::Approved;
        deposit.approved_at = Some(now);
        inner.deposits.insert(deposit_id.to_string(), deposit.clone());
        Ok(DepositSettleOutcome::Approved {
            deposit,
            newly_active,
        })
    }

    async fn settle_withdrawal(
        &self,
        withdrawal_id: &str,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<SettleOutcome> {
        let mut inner = self.inner.lock().await;
        let Some(withdrawal) = inner.withdrawals.get(withdrawal_id).cloned() else {
            bail!("withdrawal {withdrawal_id} not found");
        };
        if withdrawal.status != WithdrawalStatus::Pending {
            return Ok(SettleOutcome::AlreadySettled);
        }

        let mut withdrawal = withdrawal;
        withdrawal.settled_at = Some(now);

        if !approve {
            withdrawal.status = WithdrawalStatus::Rejected;
            inner
                .withdrawals
                .insert(withdrawal_id.to_string(), withdrawal);
            return Ok(SettleOutcome::Rejected);
        }

        let Some(user) = inner.users.get(&withdrawal.user_id).cloned() else {
            bail!("withdrawal {withdrawal_id}: user {} not found", withdrawal.user_id);
        };
        if user.balance < withdrawal.amount {
            withdrawal.status = WithdrawalStatus::Rejected;
            inner
                .withdrawals
                .insert(withdrawal_id.to_string(), withdrawal);
            return Ok(SettleOutcome::InsufficientBalance);
        }

        let amount = withdrawal.amount;
        let mut user = user;
        user.balance -= amount;
        inner.users.insert(user.id.clone(), user);
        withdrawal.status = WithdrawalStatus::Approved;
        inner
            .withdrawals
            .insert(withdrawal_id.to_string(), withdrawal);
        Ok(SettleOutcome::Approved { amount })
    }

    async fn update_display_caches(
        &self,
        user_id: &str,
        roi_income: f64,
        level_income: f64,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.get_mut(user_id) else {
            bail!("updating caches: user {user_id} not found");
        };
        user.roi_income = roi_income;
        user.level_income = level_income;
        Ok(())
    }
}
