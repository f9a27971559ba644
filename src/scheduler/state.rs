use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted run-state for the trigger coordinator, saved in the store
/// between restarts. Exists purely so a recovering process can decide
/// whether to resume, skip, or restart; it is not a ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerState {
    pub is_running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    /// Snapshot of `RoiSettings.settings_version` taken when the run was
    /// scheduled. A mismatch against the stored settings marks in-flight
    /// work as stale.
    pub settings_version: i64,
}
