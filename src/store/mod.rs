pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{
    Deposit, KycStatus, LedgerEntry, LevelRule, RankRule, RoiSettings, User, Withdrawal,
};
use crate::scheduler::state::SchedulerState;

/// Outcome of one atomic posting attempt. Amounts are what was actually
/// credited, zero when the per-day watermark already covered `for_date`
/// or the computed portion was zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PostOutcome {
    pub roi_credited: f64,
    pub level_credited: f64,
}

impl PostOutcome {
    pub fn credited(&self) -> f64 {
        self.roi_credited + self.level_credited
    }
}

/// Outcome of settling a deposit review.
#[derive(Debug, Clone, PartialEq)]
pub enum DepositSettleOutcome {
    Approved {
        deposit: Deposit,
        /// True when this approval pushed the account over the activation
        /// threshold.
        newly_active: bool,
    },
    Rejected(Deposit),
    AlreadySettled,
}

/// Outcome of settling a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettleOutcome {
    Approved { amount: f64 },
    /// Approval was requested but the balance no longer covers the amount;
    /// the request is rejected instead of overdrawing.
    InsufficientBalance,
    Rejected,
    AlreadySettled,
}

/// Persistence boundary. The engine only ever talks to this trait; the
/// sqlite implementation backs production and the in-memory one backs tests.
///
/// `post_income`, `record_promotion`, `settle_deposit` and
/// `settle_withdrawal` are the atomic read-modify-write primitives: balance
/// movement, principal credits, watermark updates and ledger appends inside
/// them succeed or fail as a unit.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Users ──
    async fn insert_user(&self, user: &User) -> Result<()>;
    async fn get_user(&self, id: &str) -> Result<Option<User>>;
    async fn update_user(&self, user: &User) -> Result<()>;
    /// Targeted field update; never touches balances or watermarks.
    async fn set_kyc_status(&self, user_id: &str, status: KycStatus) -> Result<User>;
    /// Targeted field update; never touches balances or watermarks.
    async fn set_blocked(&self, user_id: &str, blocked: bool) -> Result<User>;
    /// Active, non-blocked users in registration order.
    async fn list_payable_users(&self) -> Result<Vec<User>>;
    async fn direct_referrals(&self, user_id: &str) -> Result<Vec<User>>;

    // ── Deposits ──
    async fn insert_deposit(&self, deposit: &Deposit) -> Result<()>;
    async fn get_deposit(&self, id: &str) -> Result<Option<Deposit>>;
    async fn approved_deposits(&self, user_id: &str) -> Result<Vec<Deposit>>;
    async fn pending_deposits(&self) -> Result<Vec<Deposit>>;

    // ── Withdrawals ──
    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<()>;
    async fn get_withdrawal(&self, id: &str) -> Result<Option<Withdrawal>>;
    async fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>>;

    // ── Ledger ──
    async fn ledger_for_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>>;

    // ── Configuration ──
    async fn roi_settings(&self) -> Result<RoiSettings>;
    async fn put_roi_settings(&self, settings: &RoiSettings) -> Result<()>;
    async fn level_rules(&self) -> Result<Vec<LevelRule>>;
    async fn put_level_rules(&self, rules: &[LevelRule]) -> Result<()>;
    async fn rank_rules(&self) -> Result<Vec<RankRule>>;
    async fn put_rank_rules(&self, rules: &[RankRule]) -> Result<()>;

    // ── Scheduler state ──
    async fn scheduler_state(&self) -> Result<Option<SchedulerState>>;
    async fn put_scheduler_state(&self, state: &SchedulerState) -> Result<()>;

    // ── Atomic primitives ──

    /// Credit daily income, guarded by the per-type per-day watermarks.
    /// For each type: if `for_date` is not after the stored watermark the
    /// portion is dropped (idempotent re-entry); otherwise the balance
    /// delta, the watermark advance and the ledger append apply together.
    async fn post_income(
        &self,
        user_id: &str,
        roi_portion: f64,
        level_portion: f64,
        for_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<PostOutcome>;

    /// Persist a rank promotion: rank, reward and leg figures on the user
    /// plus one reward ledger entry, atomically. Returns false if the rank
    /// on disk is already at or above `rank` (concurrent promotion).
    async fn record_promotion(
        &self,
        user_id: &str,
        rank: u32,
        reward: f64,
        power_leg: f64,
        other_leg: f64,
        for_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Settle a pending deposit review. Approval sets the status and the
    /// accrual anchor, credits the user's principal and re-checks the
    /// activation threshold, all inside one transaction; rejection only
    /// flips the status.
    async fn settle_deposit(
        &self,
        deposit_id: &str,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<DepositSettleOutcome>;

    /// Settle a pending withdrawal. Approval re-checks the balance inside
    /// the transaction and deducts it; rejection leaves the balance alone.
    async fn settle_withdrawal(
        &self,
        withdrawal_id: &str,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<SettleOutcome>;

    /// Overwrite the advisory display caches. Not transactional: these
    /// fields are never inputs to further money movement.
    async fn update_display_caches(
        &self,
        user_id: &str,
        roi_income: f64,
        level_income: f64,
    ) -> Result<()>;
}
