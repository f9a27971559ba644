use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

use crate::store::{PostOutcome, Store};

/// Computed income portions waiting to be posted for one user and day.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Portions {
    pub roi: f64,
    pub level: f64,
}

impl Portions {
    pub fn is_zero(&self) -> bool {
        self.roi <= 0.0 && self.level <= 0.0
    }
}

/// Post computed portions for `for_date`.
///
/// The store's transaction applies the balance delta, the watermark
/// advance and the ledger appends as a unit, and drops any portion whose
/// per-day watermark already covers `for_date`. Calling this twice for
/// the same `(user, for_date)` therefore changes the balance exactly
/// once, no matter which trigger source got there first.
pub async fn post(
    store: &dyn Store,
    user_id: &str,
    portions: Portions,
    for_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<PostOutcome> {
    if portions.is_zero() {
        return Ok(PostOutcome::default());
    }
    store
        .post_income(user_id, portions.roi, portions.level, for_date, now)
        .await
}
