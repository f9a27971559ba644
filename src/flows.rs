//! Deposit, withdrawal and KYC approval flows. These feed the ledger:
//! approving a deposit starts its ROI accrual and may activate the
//! account; approving a withdrawal moves the balance through the store's
//! atomic settle primitive.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{Deposit, KycStatus, User, Withdrawal};
use crate::notify::NotificationSink;
use crate::store::{DepositSettleOutcome, SettleOutcome, Store};

/// Register a new user, optionally under a referrer. The referral edge
/// is set once here and never retargeted.
pub async fn register_user(
    store: &dyn Store,
    name: &str,
    referrer_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<User> {
    if name.trim().is_empty() {
        bail!("user name must not be empty");
    }
    if let Some(referrer) = referrer_id {
        if store.get_user(referrer).await?.is_none() {
            bail!("referrer '{referrer}' does not exist");
        }
    }

    let user = User::new(
        Uuid::new_v4().to_string(),
        name.to_string(),
        referrer_id.map(str::to_string),
        now,
    );
    store.insert_user(&user).await?;
    Ok(user)
}

/// Create a pending deposit for review.
pub async fn create_deposit(
    store: &dyn Store,
    user_id: &str,
    amount: f64,
    now: DateTime<Utc>,
) -> Result<Deposit> {
    if amount <= 0.0 {
        bail!("deposit amount must be positive");
    }
    if store.get_user(user_id).await?.is_none() {
        bail!("user '{user_id}' does not exist");
    }

    let deposit = Deposit::new(Uuid::new_v4().to_string(), user_id.to_string(), amount, now);
    store.insert_deposit(&deposit).await?;
    Ok(deposit)
}

/// Approve a pending deposit: anchor its accrual at `now`, credit the
/// user's principal, and activate the account once lifetime approved
/// principal reaches the activation threshold.
///
/// Status, anchor, credit and activation all apply through the store's
/// atomic settle primitive, so concurrent approvals for one user never
/// lose a principal credit.
pub async fn approve_deposit(
    store: &dyn Store,
    notifier: &dyn NotificationSink,
    deposit_id: &str,
    now: DateTime<Utc>,
) -> Result<Deposit> {
    match store.settle_deposit(deposit_id, true, now).await? {
        DepositSettleOutcome::Approved {
            deposit,
            newly_active,
        } => {
            notifier.deliver(
                &deposit.user_id,
                &format!("Your deposit of ${:.2} has been approved", deposit.amount),
            );
            if newly_active {
                notifier.deliver(&deposit.user_id, "Your account is now active");
            }
            Ok(deposit)
        }
        _ => bail!("deposit '{deposit_id}' is already settled"),
    }
}

/// Reject a pending deposit. Terminal; no balances move.
pub async fn reject_deposit(
    store: &dyn Store,
    notifier: &dyn NotificationSink,
    deposit_id: &str,
    now: DateTime<Utc>,
) -> Result<Deposit> {
    match store.settle_deposit(deposit_id, false, now).await? {
        DepositSettleOutcome::Rejected(deposit) => {
            notifier.deliver(
                &deposit.user_id,
                &format!("Your deposit of ${:.2} was rejected", deposit.amount),
            );
            Ok(deposit)
        }
        _ => bail!("deposit '{deposit_id}' is already settled"),
    }
}

/// Request a withdrawal. Requires approved KYC and a covering balance;
/// the balance itself only moves at approval time.
pub async fn request_withdrawal(
    store: &dyn Store,
    user_id: &str,
    amount: f64,
    now: DateTime<Utc>,
) -> Result<Withdrawal> {
    if amount <= 0.0 {
        bail!("withdrawal amount must be positive");
    }
    let Some(user) = store.get_user(user_id).await? else {
        bail!("user '{user_id}' does not exist");
    };
    if user.is_blocked {
        bail!("user '{user_id}' is blocked");
    }
    if user.kyc_status != KycStatus::Approved {
        bail!("withdrawals require approved KYC");
    }
    if user.balance < amount {
        bail!(
            "insufficient balance: requested ${:.2}, available ${:.2}",
            amount,
            user.balance
        );
    }

    let withdrawal = Withdrawal::new(Uuid::new_v4().to_string(), user_id.to_string(), amount, now);
    store.insert_withdrawal(&withdrawal).await?;
    Ok(withdrawal)
}

/// Settle a pending withdrawal. On approval the store re-checks the
/// balance inside its transaction; a balance that dropped since the
/// request rejects instead of overdrawing.
pub async fn settle_withdrawal(
    store: &dyn Store,
    notifier: &dyn NotificationSink,
    withdrawal_id: &str,
    approve: bool,
    now: DateTime<Utc>,
) -> Result<SettleOutcome> {
    let Some(withdrawal) = store.get_withdrawal(withdrawal_id).await? else {
        bail!("withdrawal '{withdrawal_id}' not found");
    };

    let outcome = store.settle_withdrawal(withdrawal_id, approve, now).await?;
    match outcome {
        SettleOutcome::Approved { amount } => notifier.deliver(
            &withdrawal.user_id,
            &format!("Your withdrawal of ${:.2} has been approved", amount),
        ),
        SettleOutcome::InsufficientBalance => notifier.deliver(
            &withdrawal.user_id,
            &format!(
                "Your withdrawal of ${:.2} was rejected: insufficient balance",
                withdrawal.amount
            ),
        ),
        SettleOutcome::Rejected => notifier.deliver(
            &withdrawal.user_id,
            &format!("Your withdrawal of ${:.2} was rejected", withdrawal.amount),
        ),
        SettleOutcome::AlreadySettled => {}
    }
    Ok(outcome)
}

/// Update a user's KYC status. A targeted store update; a concurrent
/// payout posting to the same user cannot be clobbered.
pub async fn set_kyc_status(
    store: &dyn Store,
    notifier: &dyn NotificationSink,
    user_id: &str,
    status: KycStatus,
) -> Result<User> {
    let user = store.set_kyc_status(user_id, status).await?;
    notifier.deliver(user_id, &format!("Your KYC status is now {}", status.as_str()));
    Ok(user)
}

/// Block or unblock a user. Blocked users drop out of all payout and
/// eligibility computation immediately; historical referral edges stay
/// intact for tree integrity.
pub async fn set_blocked(store: &dyn Store, user_id: &str, blocked: bool) -> Result<User> {
    store.set_blocked(user_id, blocked).await
}
