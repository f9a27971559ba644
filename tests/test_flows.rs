mod common;

use std::sync::Arc;

use common::{active_settings, approx, at, CollectingSink};

use payout_flow::flows;
use payout_flow::model::{DepositStatus, KycStatus, WithdrawalStatus};
use payout_flow::store::memory::MemoryStore;
use payout_flow::store::sqlite::SqliteStore;
use payout_flow::store::{SettleOutcome, Store};

#[tokio::test]
async fn registration_validates_referrer() {
    let store = MemoryStore::new();
    let now = at(2026, 1, 1, 9);

    let root = flows::register_user(&store, "root", None, now).await.unwrap();
    assert!(root.referrer_id.is_none());
    assert!(!root.is_active);

    let child = flows::register_user(&store, "child", Some(&root.id), now)
        .await
        .unwrap();
    assert_eq!(child.referrer_id.as_deref(), Some(root.id.as_str()));

    assert!(flows::register_user(&store, "orphan", Some("ghost"), now)
        .await
        .is_err());
    assert!(flows::register_user(&store, "  ", None, now).await.is_err());
}

#[tokio::test]
async fn deposit_approval_credits_principal_and_activates_at_threshold() {
    let store = MemoryStore::new();
    let sink = CollectingSink::default();
    store.put_roi_settings(&active_settings()).await.unwrap();
    let user = flows::register_user(&store, "u", None, at(2026, 1, 1, 9))
        .await
        .unwrap();

    // $10 approved: below the $20 threshold, still inactive.
    let d1 = flows::create_deposit(&store, &user.id, 10.0, at(2026, 1, 2, 9))
        .await
        .unwrap();
    flows::approve_deposit(&store, &sink, &d1.id, at(2026, 1, 2, 10))
        .await
        .unwrap();
    let user_after = store.get_user(&user.id).await.unwrap().unwrap();
    assert!(approx(user_after.self_deposit, 10.0));
    assert!(!user_after.is_active);

    // Another $10 crosses it.
    let d2 = flows::create_deposit(&store, &user.id, 10.0, at(2026, 1, 3, 9))
        .await
        .unwrap();
    let approved = flows::approve_deposit(&store, &sink, &d2.id, at(2026, 1, 3, 10))
        .await
        .unwrap();
    assert_eq!(approved.status, DepositStatus::Approved);
    assert_eq!(approved.approved_at, Some(at(2026, 1, 3, 10)));

    let user_after = store.get_user(&user.id).await.unwrap().unwrap();
    assert!(approx(user_after.self_deposit, 20.0));
    assert!(user_after.is_active);
    // Balance is untouched: principal is not withdrawable income.
    assert!(approx(user_after.balance, 0.0));

    // Two deposit approvals plus one activation notice.
    assert_eq!(sink.delivered.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn settled_deposits_cannot_be_settled_again() {
    let store = MemoryStore::new();
    let sink = CollectingSink::default();
    store.put_roi_settings(&active_settings()).await.unwrap();
    let user = flows::register_user(&store, "u", None, at(2026, 1, 1, 9))
        .await
        .unwrap();

    let deposit = flows::create_deposit(&store, &user.id, 50.0, at(2026, 1, 2, 9))
        .await
        .unwrap();
    flows::approve_deposit(&store, &sink, &deposit.id, at(2026, 1, 2, 10))
        .await
        .unwrap();

    assert!(flows::approve_deposit(&store, &sink, &deposit.id, at(2026, 1, 2, 11))
        .await
        .is_err());
    assert!(
        flows::reject_deposit(&store, &sink, &deposit.id, at(2026, 1, 2, 11))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn rejected_deposit_moves_nothing() {
    let store = MemoryStore::new();
    let sink = CollectingSink::default();
    store.put_roi_settings(&active_settings()).await.unwrap();
    let user = flows::register_user(&store, "u", None, at(2026, 1, 1, 9))
        .await
        .unwrap();

    let deposit = flows::create_deposit(&store, &user.id, 500.0, at(2026, 1, 2, 9))
        .await
        .unwrap();
    let rejected = flows::reject_deposit(&store, &sink, &deposit.id, at(2026, 1, 2, 10))
        .await
        .unwrap();
    assert_eq!(rejected.status, DepositStatus::Rejected);

    let user_after = store.get_user(&user.id).await.unwrap().unwrap();
    assert!(approx(user_after.self_deposit, 0.0));
    assert!(!user_after.is_active);
    assert!(store.approved_deposits(&user.id).await.unwrap().is_empty());
}

async fn concurrent_approvals_keep_every_credit(store: Arc<dyn Store>) {
    store.put_roi_settings(&active_settings()).await.unwrap();
    let user = flows::register_user(store.as_ref(), "u", None, at(2026, 1, 1, 9))
        .await
        .unwrap();
    let d1 = flows::create_deposit(store.as_ref(), &user.id, 10.0, at(2026, 1, 2, 9))
        .await
        .unwrap();
    let d2 = flows::create_deposit(store.as_ref(), &user.id, 10.0, at(2026, 1, 2, 9))
        .await
        .unwrap();

    // Both approvals interleave on the same user; the settle primitive
    // serializes the principal credits.
    let sink = CollectingSink::default();
    let now = at(2026, 1, 3, 10);
    let (a, b) = tokio::join!(
        flows::approve_deposit(store.as_ref(), &sink, &d1.id, now),
        flows::approve_deposit(store.as_ref(), &sink, &d2.id, now),
    );
    a.unwrap();
    b.unwrap();

    let user = store.get_user(&user.id).await.unwrap().unwrap();
    assert!(approx(user.self_deposit, 20.0), "got {}", user.self_deposit);
    assert!(user.is_active);
    assert_eq!(store.approved_deposits(&user.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn memory_concurrent_approvals_keep_every_credit() {
    concurrent_approvals_keep_every_credit(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn sqlite_concurrent_approvals_keep_every_credit() {
    concurrent_approvals_keep_every_credit(Arc::new(SqliteStore::open_in_memory().unwrap())).await;
}

#[tokio::test]
async fn racing_approve_and_reject_settle_exactly_once() {
    let store = MemoryStore::new();
    let sink = CollectingSink::default();
    store.put_roi_settings(&active_settings()).await.unwrap();
    let user = flows::register_user(&store, "u", None, at(2026, 1, 1, 9))
        .await
        .unwrap();
    let deposit = flows::create_deposit(&store, &user.id, 50.0, at(2026, 1, 2, 9))
        .await
        .unwrap();

    let now = at(2026, 1, 3, 10);
    let (approved, rejected) = tokio::join!(
        flows::approve_deposit(&store, &sink, &deposit.id, now),
        flows::reject_deposit(&store, &sink, &deposit.id, now),
    );
    // Exactly one side wins; the loser reports a settled conflict.
    assert_eq!(approved.is_ok() as u8 + rejected.is_ok() as u8, 1);

    let user = store.get_user(&user.id).await.unwrap().unwrap();
    let deposit = store.get_deposit(&deposit.id).await.unwrap().unwrap();
    match deposit.status {
        DepositStatus::Approved => {
            assert!(approx(user.self_deposit, 50.0));
            assert!(deposit.approved_at.is_some());
        }
        DepositStatus::Rejected => {
            assert!(approx(user.self_deposit, 0.0));
            assert!(deposit.approved_at.is_none());
        }
        DepositStatus::Pending => panic!("deposit never settled"),
    }
}

async fn funded_kyc_user(store: &MemoryStore, balance: f64) -> String {
    let user = flows::register_user(store, "u", None, at(2026, 1, 1, 9))
        .await
        .unwrap();
    let mut user = store.get_user(&user.id).await.unwrap().unwrap();
    user.balance = balance;
    user.kyc_status = KycStatus::Approved;
    store.update_user(&user).await.unwrap();
    user.id
}

#[tokio::test]
async fn withdrawal_requires_approved_kyc() {
    let store = MemoryStore::new();
    let user = flows::register_user(&store, "u", None, at(2026, 1, 1, 9))
        .await
        .unwrap();
    let mut user = store.get_user(&user.id).await.unwrap().unwrap();
    user.balance = 100.0;
    store.update_user(&user).await.unwrap();

    // Pending KYC blocks the request.
    assert!(
        flows::request_withdrawal(&store, &user.id, 50.0, at(2026, 1, 5, 9))
            .await
            .is_err()
    );

    user.kyc_status = KycStatus::Approved;
    store.update_user(&user).await.unwrap();
    let withdrawal = flows::request_withdrawal(&store, &user.id, 50.0, at(2026, 1, 5, 9))
        .await
        .unwrap();
    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);

    // The request alone moves no funds.
    let user = store.get_user(&user.id).await.unwrap().unwrap();
    assert!(approx(user.balance, 100.0));
}

#[tokio::test]
async fn withdrawal_request_rejects_amount_over_balance() {
    let store = MemoryStore::new();
    let user_id = funded_kyc_user(&store, 30.0).await;

    assert!(
        flows::request_withdrawal(&store, &user_id, 31.0, at(2026, 1, 5, 9))
            .await
            .is_err()
    );
    assert!(
        flows::request_withdrawal(&store, &user_id, 0.0, at(2026, 1, 5, 9))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn approval_deducts_balance_once() {
    let store = MemoryStore::new();
    let sink = CollectingSink::default();
    let user_id = funded_kyc_user(&store, 100.0).await;

    let withdrawal = flows::request_withdrawal(&store, &user_id, 60.0, at(2026, 1, 5, 9))
        .await
        .unwrap();
    let outcome = flows::settle_withdrawal(&store, &sink, &withdrawal.id, true, at(2026, 1, 6, 9))
        .await
        .unwrap();
    assert_eq!(outcome, SettleOutcome::Approved { amount: 60.0 });

    let user = store.get_user(&user_id).await.unwrap().unwrap();
    assert!(approx(user.balance, 40.0));

    // Settling again is a conflict, not a second deduction.
    let again = flows::settle_withdrawal(&store, &sink, &withdrawal.id, true, at(2026, 1, 6, 10))
        .await
        .unwrap();
    assert_eq!(again, SettleOutcome::AlreadySettled);
    let user = store.get_user(&user_id).await.unwrap().unwrap();
    assert!(approx(user.balance, 40.0));
}

#[tokio::test]
async fn approval_rechecks_the_balance_at_settle_time() {
    let store = MemoryStore::new();
    let sink = CollectingSink::default();
    let user_id = funded_kyc_user(&store, 100.0).await;

    let withdrawal = flows::request_withdrawal(&store, &user_id, 80.0, at(2026, 1, 5, 9))
        .await
        .unwrap();

    // Balance drops between request and approval.
    let mut user = store.get_user(&user_id).await.unwrap().unwrap();
    user.balance = 50.0;
    store.update_user(&user).await.unwrap();

    let outcome = flows::settle_withdrawal(&store, &sink, &withdrawal.id, true, at(2026, 1, 6, 9))
        .await
        .unwrap();
    assert_eq!(outcome, SettleOutcome::InsufficientBalance);

    let user = store.get_user(&user_id).await.unwrap().unwrap();
    assert!(approx(user.balance, 50.0));
    let settled = store.get_withdrawal(&withdrawal.id).await.unwrap().unwrap();
    assert_eq!(settled.status, WithdrawalStatus::Rejected);
}

#[tokio::test]
async fn admin_rejection_leaves_balance_alone() {
    let store = MemoryStore::new();
    let sink = CollectingSink::default();
    let user_id = funded_kyc_user(&store, 100.0).await;

    let withdrawal = flows::request_withdrawal(&store, &user_id, 60.0, at(2026, 1, 5, 9))
        .await
        .unwrap();
    let outcome = flows::settle_withdrawal(&store, &sink, &withdrawal.id, false, at(2026, 1, 6, 9))
        .await
        .unwrap();
    assert_eq!(outcome, SettleOutcome::Rejected);

    let user = store.get_user(&user_id).await.unwrap().unwrap();
    assert!(approx(user.balance, 100.0));
}

#[tokio::test]
async fn blocked_users_cannot_request_withdrawals() {
    let store = MemoryStore::new();
    let user_id = funded_kyc_user(&store, 100.0).await;
    flows::set_blocked(&store, &user_id, true).await.unwrap();

    assert!(
        flows::request_withdrawal(&store, &user_id, 10.0, at(2026, 1, 5, 9))
            .await
            .is_err()
    );

    // Unblocking restores the path.
    flows::set_blocked(&store, &user_id, false).await.unwrap();
    assert!(
        flows::request_withdrawal(&store, &user_id, 10.0, at(2026, 1, 5, 9))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn kyc_status_updates_notify_the_user() {
    let store = MemoryStore::new();
    let sink = CollectingSink::default();
    let user = flows::register_user(&store, "u", None, at(2026, 1, 1, 9))
        .await
        .unwrap();
    assert_eq!(user.kyc_status, KycStatus::Pending);

    let updated = flows::set_kyc_status(&store, &sink, &user.id, KycStatus::Approved)
        .await
        .unwrap();
    assert_eq!(updated.kyc_status, KycStatus::Approved);
    assert_eq!(sink.delivered.lock().unwrap().len(), 1);
}
