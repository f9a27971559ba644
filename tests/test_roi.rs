mod common;

use common::{active_settings, add_approved_deposit, add_user, approx, at, date};

use payout_flow::engine::roi;
use payout_flow::model::{Deposit, DepositStatus};
use payout_flow::store::Store;
use payout_flow::store::memory::MemoryStore;

#[test]
fn lifetime_roi_is_capped_at_max_days() {
    // $1000 approved 40 days ago, 1%/day capped at 30%: 30 days count.
    let settings = active_settings();
    let mut deposit = Deposit::new("d1".into(), "u1".into(), 1000.0, at(2026, 1, 1, 12));
    deposit.status = DepositStatus::Approved;
    deposit.approved_at = Some(at(2026, 1, 1, 12));

    let accrual = roi::accrue(&[deposit], &settings, date(2026, 2, 10));
    assert!(approx(accrual.lifetime, 300.0), "got {}", accrual.lifetime);
    // Past the cap, the deposit no longer earns a daily portion.
    assert!(approx(accrual.today, 0.0), "got {}", accrual.today);
}

#[test]
fn deposit_within_window_earns_daily_portion() {
    let settings = active_settings();
    let mut deposit = Deposit::new("d1".into(), "u1".into(), 1000.0, at(2026, 1, 1, 12));
    deposit.status = DepositStatus::Approved;
    deposit.approved_at = Some(at(2026, 1, 1, 12));

    let accrual = roi::accrue(&[deposit], &settings, date(2026, 1, 11));
    assert!(approx(accrual.lifetime, 100.0));
    assert!(approx(accrual.today, 10.0));
}

#[test]
fn approval_day_earns_nothing() {
    let settings = active_settings();
    let mut deposit = Deposit::new("d1".into(), "u1".into(), 500.0, at(2026, 1, 5, 9));
    deposit.status = DepositStatus::Approved;
    deposit.approved_at = Some(at(2026, 1, 5, 9));

    let accrual = roi::accrue(&[deposit.clone()], &settings, date(2026, 1, 5));
    assert!(approx(accrual.lifetime, 0.0));
    assert!(approx(accrual.today, 0.0));

    // The first earning day is the next calendar day, regardless of the
    // time of day the approval happened.
    let accrual = roi::accrue(&[deposit], &settings, date(2026, 1, 6));
    assert!(approx(accrual.lifetime, 5.0));
    assert!(approx(accrual.today, 5.0));
}

#[test]
fn cap_boundary_day_still_earns() {
    let settings = active_settings(); // max_days = 30
    let mut deposit = Deposit::new("d1".into(), "u1".into(), 1000.0, at(2026, 1, 1, 0));
    deposit.status = DepositStatus::Approved;
    deposit.approved_at = Some(at(2026, 1, 1, 0));

    // Day 30: last accruing day.
    let accrual = roi::accrue(&[deposit.clone()], &settings, date(2026, 1, 31));
    assert!(approx(accrual.lifetime, 300.0));
    assert!(approx(accrual.today, 10.0));

    // Day 31: capped.
    let accrual = roi::accrue(&[deposit], &settings, date(2026, 2, 1));
    assert!(approx(accrual.lifetime, 300.0));
    assert!(approx(accrual.today, 0.0));
}

#[test]
fn deposit_approved_in_the_future_is_ignored() {
    let settings = active_settings();
    let mut deposit = Deposit::new("d1".into(), "u1".into(), 1000.0, at(2026, 3, 1, 0));
    deposit.status = DepositStatus::Approved;
    deposit.approved_at = Some(at(2026, 3, 1, 0));

    let accrual = roi::accrue(&[deposit], &settings, date(2026, 2, 1));
    assert!(approx(accrual.lifetime, 0.0));
    assert!(approx(accrual.today, 0.0));
}

#[test]
fn deposit_without_anchor_is_skipped() {
    let settings = active_settings();
    let mut deposit = Deposit::new("d1".into(), "u1".into(), 1000.0, at(2026, 1, 1, 0));
    deposit.status = DepositStatus::Approved;
    deposit.approved_at = None; // corrupt record

    let accrual = roi::accrue(&[deposit], &settings, date(2026, 2, 1));
    assert!(approx(accrual.lifetime, 0.0));
    assert!(approx(accrual.today, 0.0));
}

#[test]
fn multiple_deposits_accrue_independently() {
    let settings = active_settings();
    let mk = |amount: f64, approved| {
        let mut d = Deposit::new("d".into(), "u1".into(), amount, approved);
        d.status = DepositStatus::Approved;
        d.approved_at = Some(approved);
        d
    };
    // One capped, one mid-window.
    let deposits = vec![mk(1000.0, at(2025, 10, 1, 0)), mk(500.0, at(2026, 1, 21, 0))];

    let accrual = roi::accrue(&deposits, &settings, date(2026, 1, 31));
    assert!(approx(accrual.lifetime, 300.0 + 50.0));
    assert!(approx(accrual.today, 5.0));
}

#[tokio::test]
async fn store_only_returns_approved_deposits() {
    let store = MemoryStore::new();
    add_user(&store, "a", None, 0.0).await;
    add_approved_deposit(&store, "d1", "a", 100.0, at(2026, 1, 1, 0)).await;

    let pending = Deposit::new("d2".into(), "a".into(), 50.0, at(2026, 1, 2, 0));
    store.insert_deposit(&pending).await.unwrap();

    let approved = store.approved_deposits("a").await.unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].id, "d1");
}
