use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::engine::PayoutEngine;
use crate::notify::{LogSink, NotificationSink};
use crate::store::Store;
use crate::store::sqlite::SqliteStore;

/// Entry point for the `run` command: one manual payout run, optionally
/// followed by a rank pass. Equivalent to the admin "run now" button;
/// re-running on the same day is a no-op thanks to the per-day
/// watermarks.
pub fn run(data_dir: &Path, with_ranks: bool) -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::open(&data_dir.join("payout-flow.db")).context("opening store")?,
    );
    let notifier: Arc<dyn NotificationSink> = Arc::new(LogSink);
    let engine = PayoutEngine::new(store, notifier);

    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    rt.block_on(async {
        let now = Utc::now();
        engine.run_daily(now).await.context("daily run")?;
        if with_ranks {
            engine.evaluate_ranks(now).await.context("rank pass")?;
        }
        anyhow::Ok(())
    })?;

    Ok(())
}
