pub mod eligibility;
pub mod graph;
pub mod level;
pub mod poster;
pub mod rank;
pub mod roi;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::model::{RoiSettings, RoiStatus, User};
use crate::notify::NotificationSink;
use crate::store::Store;

use poster::Portions;
use rank::Promotion;

/// Re-read the settings version after this many users to catch
/// mid-run configuration changes.
const STALENESS_CHECK_EVERY: usize = 25;

/// Admin-facing result of one daily payout run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub for_date: Option<NaiveDate>,
    /// Users whose postings were attempted.
    pub processed: u32,
    /// Total funds credited across all users this run.
    pub credited: f64,
    /// Users skipped over data errors; never aborts the batch.
    pub skipped: u32,
    /// Repeated referral edges encountered during traversal.
    pub integrity_warnings: u32,
    /// True when the run stopped early because the settings changed
    /// mid-flight.
    pub aborted_stale: bool,
    /// True when ROI is globally paused and nothing ran.
    pub paused: bool,
}

/// Result of one rank evaluation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RankSummary {
    pub evaluated: u32,
    pub promoted: u32,
    pub skipped: u32,
}

/// The payout computation engine: walks each payable user's referral
/// tree, computes ROI and level commission, and posts the results through
/// the store's idempotent primitives.
///
/// Multiple trigger sources (manual, timer, recovery) may drive this
/// concurrently against the same store; correctness comes from the
/// per-day watermarks, not from mutual exclusion between triggers.
pub struct PayoutEngine {
    store: Arc<dyn Store>,
    notifier: Arc<dyn NotificationSink>,
}

impl PayoutEngine {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn NotificationSink>) -> Self {
        PayoutEngine { store, notifier }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Run the daily payout for every active, non-blocked user.
    ///
    /// Per-user errors are skipped and counted; only a mid-run settings
    /// change aborts the remainder of the batch.
    pub async fn run_daily(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let today = now.date_naive();
        let settings = self.store.roi_settings().await.context("loading settings")?;

        let mut summary = RunSummary {
            for_date: Some(today),
            ..Default::default()
        };

        if settings.status == RoiStatus::Paused {
            println!("[run] ROI is paused, nothing to do");
            summary.paused = true;
            return Ok(summary);
        }

        let version_snapshot = settings.settings_version;
        let rules = self.store.level_rules().await.context("loading level rules")?;
        let users = self
            .store
            .list_payable_users()
            .await
            .context("listing users")?;

        println!(
            "[run] daily payout for {}: {} users, {} levels",
            today,
            users.len(),
            rules.len()
        );

        for (i, user) in users.iter().enumerate() {
            if i > 0 && i % STALENESS_CHECK_EVERY == 0 {
                let current = self.store.roi_settings().await?;
                if current.settings_version != version_snapshot {
                    eprintln!(
                        "[run] settings changed mid-run (v{} -> v{}), aborting after {} of {} users",
                        version_snapshot,
                        current.settings_version,
                        summary.processed,
                        users.len()
                    );
                    summary.aborted_stale = true;
                    break;
                }
            }

            match self.process_user(user, &settings, &rules, today, now).await {
                Ok((credited, warnings)) => {
                    summary.processed += 1;
                    summary.credited += credited;
                    summary.integrity_warnings += warnings;
                }
                Err(e) => {
                    eprintln!("[run] skipping user '{}': {:#}", user.id, e);
                    summary.skipped += 1;
                }
            }
        }

        println!(
            "[run] done: processed {}, credited ${:.2}, skipped {}{}",
            summary.processed,
            summary.credited,
            summary.skipped,
            if summary.aborted_stale {
                " (aborted: stale settings)"
            } else {
                ""
            }
        );

        Ok(summary)
    }

    /// One user's read/compute/post sequence. ROI is computed before the
    /// level pass so the level income never sees a half-updated day.
    async fn process_user(
        &self,
        user: &User,
        settings: &RoiSettings,
        rules: &[crate::model::LevelRule],
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(f64, u32)> {
        let deposits = self
            .store
            .approved_deposits(&user.id)
            .await
            .context("loading deposits")?;
        let accrual = roi::accrue(&deposits, settings, today);
        let commission = level::compute(self.store.as_ref(), user, rules)
            .await
            .context("computing level income")?;

        let outcome = poster::post(
            self.store.as_ref(),
            &user.id,
            Portions {
                roi: accrual.today,
                level: commission.today,
            },
            today,
            now,
        )
        .await
        .context("posting income")?;

        // Advisory caches only, safe outside the posting transaction.
        self.store
            .update_display_caches(&user.id, accrual.lifetime, commission.lifetime)
            .await
            .context("updating display caches")?;

        Ok((outcome.credited(), commission.integrity_warnings))
    }

    /// Rank pass: evaluate every payable user against the rank ladder and
    /// apply promotions. Runs on a slower cadence than the daily payout.
    pub async fn evaluate_ranks(&self, now: DateTime<Utc>) -> Result<RankSummary> {
        let rules = self.store.rank_rules().await.context("loading rank rules")?;
        let users = self
            .store
            .list_payable_users()
            .await
            .context("listing users")?;

        let mut summary = RankSummary::default();
        for user in &users {
            match rank::evaluate(self.store.as_ref(), self.notifier.as_ref(), user, &rules, now)
                .await
            {
                Ok(Some(promotion)) => {
                    summary.evaluated += 1;
                    summary.promoted += 1;
                    self.log_promotion(&promotion);
                }
                Ok(None) => summary.evaluated += 1,
                Err(e) => {
                    eprintln!("[rank] skipping user '{}': {:#}", user.id, e);
                    summary.skipped += 1;
                }
            }
        }

        println!(
            "[rank] done: evaluated {}, promoted {}, skipped {}",
            summary.evaluated, summary.promoted, summary.skipped
        );
        Ok(summary)
    }

    fn log_promotion(&self, promotion: &Promotion) {
        println!(
            "[rank] '{}' promoted {} -> {} (power ${:.2} / other ${:.2}), reward ${:.2}",
            promotion.user_id,
            promotion.from_rank,
            promotion.to_rank,
            promotion.legs.power_leg,
            promotion.legs.other_leg,
            promotion.reward
        );
    }
}
