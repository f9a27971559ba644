mod common;

use std::sync::Arc;

use common::{active_settings, add_approved_deposit, add_user, approx, at};

use chrono::{DateTime, Duration, Utc};

use payout_flow::engine::PayoutEngine;
use payout_flow::notify::NotificationSink;
use payout_flow::scheduler::state::SchedulerState;
use payout_flow::scheduler::{Coordinator, next_run_after};
use payout_flow::store::Store;
use payout_flow::store::memory::MemoryStore;
use payout_flow::store::sqlite::SqliteStore;

struct SilentSink;

impl NotificationSink for SilentSink {
    fn deliver(&self, _user_id: &str, _message: &str) {}
}

/// Recent anchor so the deposit is inside its earning window at the real
/// wall-clock time `trigger_now`/`recover` run at.
fn five_days_ago() -> DateTime<Utc> {
    Utc::now() - Duration::days(5)
}

fn coordinator(store: Arc<dyn Store>) -> Coordinator {
    let engine = Arc::new(PayoutEngine::new(store.clone(), Arc::new(SilentSink)));
    Coordinator::new(store, engine)
}

#[test]
fn next_run_is_today_when_hour_is_ahead() {
    let now = at(2026, 2, 1, 8);
    assert_eq!(next_run_after(now, 10), at(2026, 2, 1, 10));
}

#[test]
fn next_run_rolls_to_tomorrow_at_or_after_the_hour() {
    // Exactly at the trigger instant counts as passed.
    assert_eq!(next_run_after(at(2026, 2, 1, 10), 10), at(2026, 2, 2, 10));
    assert_eq!(next_run_after(at(2026, 2, 1, 15), 10), at(2026, 2, 2, 10));
}

#[test]
fn out_of_range_hour_is_clamped() {
    assert_eq!(next_run_after(at(2026, 2, 1, 0), 99), at(2026, 2, 1, 23));
}

#[tokio::test]
async fn trigger_now_runs_and_records_summary() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    store.put_roi_settings(&active_settings()).await.unwrap();
    add_user(store.as_ref(), "a", None, 1000.0).await;
    add_approved_deposit(store.as_ref(), "d1", "a", 1000.0, five_days_ago()).await;

    let coordinator = coordinator(store.clone());
    let summary = coordinator.trigger_now().await.unwrap();
    assert_eq!(summary.processed, 1);
    assert!(summary.credited > 0.0);

    let shared = coordinator.last_summary();
    let held = shared.read().await;
    assert!(approx(held.as_ref().unwrap().credited, summary.credited));
}

#[tokio::test]
async fn recovery_resumes_interrupted_run_with_matching_version() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let settings = active_settings();
    store.put_roi_settings(&settings).await.unwrap();
    add_user(store.as_ref(), "a", None, 1000.0).await;
    add_approved_deposit(store.as_ref(), "d1", "a", 1000.0, five_days_ago()).await;

    // Simulate a crash mid-run.
    store
        .put_scheduler_state(&SchedulerState {
            is_running: true,
            started_at: Some(at(2026, 1, 10, 10)),
            last_run: None,
            next_run: None,
            settings_version: settings.settings_version,
        })
        .await
        .unwrap();

    let coordinator = coordinator(store.clone());
    coordinator.recover().await.unwrap();

    // The resumed run posted income and the flag was cleared.
    let user = store.get_user("a").await.unwrap().unwrap();
    assert!(user.balance > 0.0);
    let state = store.scheduler_state().await.unwrap().unwrap();
    assert!(!state.is_running);
}

#[tokio::test]
async fn recovery_drops_stale_interrupted_run() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let mut settings = active_settings();
    settings.settings_version = 7;
    store.put_roi_settings(&settings).await.unwrap();
    add_user(store.as_ref(), "a", None, 1000.0).await;
    add_approved_deposit(store.as_ref(), "d1", "a", 1000.0, five_days_ago()).await;

    // Crash happened under an older configuration.
    store
        .put_scheduler_state(&SchedulerState {
            is_running: true,
            started_at: Some(at(2026, 1, 10, 10)),
            last_run: Some(at(2026, 1, 9, 10)),
            next_run: None,
            settings_version: 3,
        })
        .await
        .unwrap();

    let coordinator = coordinator(store.clone());
    coordinator.recover().await.unwrap();

    // Stale work is dropped: nothing posted, flag cleared, version updated.
    let user = store.get_user("a").await.unwrap().unwrap();
    assert!(approx(user.balance, 0.0));
    let state = store.scheduler_state().await.unwrap().unwrap();
    assert!(!state.is_running);
    assert_eq!(state.settings_version, 7);
    assert_eq!(state.last_run, Some(at(2026, 1, 9, 10)));
}

#[tokio::test]
async fn recovery_is_a_no_op_without_in_flight_state() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    store.put_roi_settings(&active_settings()).await.unwrap();
    add_user(store.as_ref(), "a", None, 1000.0).await;
    add_approved_deposit(store.as_ref(), "d1", "a", 1000.0, five_days_ago()).await;

    let coordinator = coordinator(store.clone());
    coordinator.recover().await.unwrap();

    let user = store.get_user("a").await.unwrap().unwrap();
    assert!(approx(user.balance, 0.0));
}

#[tokio::test]
async fn scheduler_state_round_trips_through_sqlite() {
    let store = SqliteStore::open_in_memory().unwrap();

    let state = SchedulerState {
        is_running: true,
        started_at: Some(at(2026, 2, 1, 10)),
        last_run: Some(at(2026, 1, 31, 10)),
        next_run: Some(at(2026, 2, 2, 10)),
        settings_version: 42,
    };
    store.put_scheduler_state(&state).await.unwrap();
    assert_eq!(store.scheduler_state().await.unwrap(), Some(state.clone()));

    // Upsert overwrites the single row.
    let idle = SchedulerState {
        is_running: false,
        started_at: None,
        last_run: Some(at(2026, 2, 1, 10)),
        next_run: None,
        settings_version: 43,
    };
    store.put_scheduler_state(&idle).await.unwrap();
    assert_eq!(store.scheduler_state().await.unwrap(), Some(idle));
}
