use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::store::Store;
use crate::store::sqlite::SqliteStore;

/// Entry point for the `seed` command: validate a configuration bundle
/// and write it into the store, stamping a fresh settings version.
pub fn run(file: &Path, data_dir: &Path) -> Result<()> {
    let mut bundle = crate::validate::load_and_validate(file).map_err(|errors| {
        let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::anyhow!("Configuration validation failed:\n  {}", msgs.join("\n  "))
    })?;

    let store = SqliteStore::open(&data_dir.join("payout-flow.db"))
        .context("opening store")?;

    bundle.roi_settings.settings_version = Utc::now().timestamp_millis();

    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    rt.block_on(async {
        store.put_roi_settings(&bundle.roi_settings).await?;
        store.put_level_rules(&bundle.level_rules).await?;
        store.put_rank_rules(&bundle.rank_rules).await?;
        anyhow::Ok(())
    })?;

    println!(
        "Seeded {} level rules, {} rank rules (settings v{})",
        bundle.level_rules.len(),
        bundle.rank_rules.len(),
        bundle.roi_settings.settings_version
    );
    Ok(())
}
