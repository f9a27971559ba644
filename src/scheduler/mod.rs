pub mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc, Weekday};
use tokio::sync::RwLock;

use crate::engine::{PayoutEngine, RunSummary};
use crate::store::Store;

use state::SchedulerState;

/// Fixed backoff after a failed run before rescheduling.
const RETRY_BACKOFF: Duration = Duration::from_secs(3600);

/// Decides *when* the payout engine runs: manual admin command, daily
/// wall-clock timer, or recovery after a crash. Persists minimal run
/// state so a restarting process can resume, skip, or restart without
/// double-running; the per-day watermarks in the poster remain the
/// actual duplicate guard.
pub struct Coordinator {
    store: Arc<dyn Store>,
    engine: Arc<PayoutEngine>,
    /// Last completed run summary, shared with the API.
    last_summary: Arc<RwLock<Option<RunSummary>>>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn Store>, engine: Arc<PayoutEngine>) -> Self {
        Coordinator {
            store,
            engine,
            last_summary: Arc::new(RwLock::new(None)),
        }
    }

    pub fn last_summary(&self) -> Arc<RwLock<Option<RunSummary>>> {
        self.last_summary.clone()
    }

    /// Manual trigger: runs immediately, bypassing the timer. Still
    /// subject to the poster's per-day idempotency.
    pub async fn trigger_now(&self) -> Result<RunSummary> {
        let summary = self.engine.run_daily(Utc::now()).await?;
        *self.last_summary.write().await = Some(summary.clone());
        Ok(summary)
    }

    /// Recovery path: re-derive intended state from the persisted
    /// `SchedulerState` and the current settings version.
    ///
    /// An interrupted run with a matching version is resumed (safe, the
    /// poster no-ops anything already applied); a mismatched version
    /// means the interrupted work is stale and is dropped.
    pub async fn recover(&self) -> Result<()> {
        let Some(state) = self.store.scheduler_state().await? else {
            return Ok(());
        };
        if !state.is_running {
            return Ok(());
        }

        let settings = self.store.roi_settings().await?;
        if settings.settings_version != state.settings_version {
            println!(
                "[scheduler] dropping stale in-flight run (v{} != v{})",
                state.settings_version, settings.settings_version
            );
            self.mark_idle(state, settings.settings_version).await?;
            return Ok(());
        }

        println!(
            "[scheduler] resuming run interrupted at {:?}",
            state.started_at
        );
        let summary = self.engine.run_daily(Utc::now()).await?;
        *self.last_summary.write().await = Some(summary);
        self.mark_idle(state, settings.settings_version).await?;
        Ok(())
    }

    /// Daily loop: sleep until the configured trigger hour, run, persist,
    /// reschedule. Reschedules itself after success and failure alike;
    /// failures wait out a fixed one-hour backoff first.
    pub async fn run_forever(&self) -> Result<()> {
        self.recover().await.context("scheduler recovery")?;

        loop {
            let settings = match self.store.roi_settings().await {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("[scheduler] cannot read settings: {:#}, retrying in 1h", e);
                    tokio::time::sleep(RETRY_BACKOFF).await;
                    continue;
                }
            };

            let now = Utc::now();
            let next_run = next_run_after(now, settings.trigger_hour);
            let wait = (next_run - now)
                .to_std()
                .unwrap_or(Duration::ZERO);

            self.store
                .put_scheduler_state(&SchedulerState {
                    is_running: false,
                    started_at: None,
                    last_run: self.current_last_run().await,
                    next_run: Some(next_run),
                    settings_version: settings.settings_version,
                })
                .await?;

            println!(
                "[scheduler] next run at {} (in {}s)",
                next_run.format("%Y-%m-%d %H:%M:%S"),
                wait.as_secs()
            );
            tokio::time::sleep(wait).await;

            // Staleness/status gate at the top of each reschedule: this is
            // the only cancellation boundary for future runs.
            let current = self.store.roi_settings().await?;
            if current.settings_version != settings.settings_version {
                println!("[scheduler] settings changed while waiting, rescheduling");
                continue;
            }

            let started = Utc::now();
            self.store
                .put_scheduler_state(&SchedulerState {
                    is_running: true,
                    started_at: Some(started),
                    last_run: self.current_last_run().await,
                    next_run: None,
                    settings_version: settings.settings_version,
                })
                .await?;

            match self.engine.run_daily(started).await {
                Ok(summary) => {
                    // Ranks run on a slower cadence: once a week after the
                    // Monday payout.
                    if !summary.paused && started.weekday() == Weekday::Mon {
                        if let Err(e) = self.engine.evaluate_ranks(started).await {
                            eprintln!("[scheduler] rank pass failed: {:#}", e);
                        }
                    }

                    *self.last_summary.write().await = Some(summary);
                    self.store
                        .put_scheduler_state(&SchedulerState {
                            is_running: false,
                            started_at: None,
                            last_run: Some(started),
                            next_run: None,
                            settings_version: settings.settings_version,
                        })
                        .await?;
                }
                Err(e) => {
                    eprintln!("[scheduler] run failed: {:#}, backing off 1h", e);
                    self.store
                        .put_scheduler_state(&SchedulerState {
                            is_running: false,
                            started_at: None,
                            last_run: self.current_last_run().await,
                            next_run: None,
                            settings_version: settings.settings_version,
                        })
                        .await?;
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            }
        }
    }

    async fn current_last_run(&self) -> Option<DateTime<Utc>> {
        match self.store.scheduler_state().await {
            Ok(Some(s)) => s.last_run,
            _ => None,
        }
    }

    async fn mark_idle(&self, state: SchedulerState, settings_version: i64) -> Result<()> {
        self.store
            .put_scheduler_state(&SchedulerState {
                is_running: false,
                started_at: None,
                last_run: state.last_run,
                next_run: None,
                settings_version,
            })
            .await
    }
}

/// The next instant at `trigger_hour`:00 UTC strictly after `now`. The
/// hour is interpreted in UTC, the same clock the posting watermarks use.
pub fn next_run_after(now: DateTime<Utc>, trigger_hour: u32) -> DateTime<Utc> {
    let hour = trigger_hour.min(23);
    let today_at = now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .expect("valid trigger hour")
        .and_utc();
    if today_at > now {
        today_at
    } else {
        today_at + chrono::Duration::days(1)
    }
}
