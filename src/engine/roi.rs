use chrono::NaiveDate;

use crate::model::{Deposit, RoiSettings};

/// Result of one ROI accrual pass over a user's approved deposits.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RoiAccrual {
    /// Total capped return earned since each deposit's approval.
    pub lifetime: f64,
    /// The portion attributable to `today` alone.
    pub today: f64,
}

/// Compute today's and lifetime ROI for a set of approved deposits.
///
/// Day counts are whole calendar days from the approval day. A deposit
/// earns nothing for its own approval day: for posting day D it
/// contributes iff `1 <= days_since_approval <= max_days`. The same
/// convention applies to every trigger path. Side-effect free; posting
/// is the payout poster's job.
pub fn accrue(deposits: &[Deposit], settings: &RoiSettings, today: NaiveDate) -> RoiAccrual {
    let max_days = settings.max_days();
    let mut accrual = RoiAccrual::default();
    if settings.daily_roi <= 0.0 {
        return accrual;
    }

    for deposit in deposits {
        let Some(days) = deposit.days_since_approval(today) else {
            // Approved deposits without an anchor are corrupt; they earn
            // nothing rather than aborting the batch.
            continue;
        };
        if days < 0 {
            continue;
        }

        let roi_days = days.min(max_days);
        accrual.lifetime += deposit.amount * settings.daily_roi * roi_days as f64;
        if days >= 1 && days <= max_days {
            accrual.today += deposit.amount * settings.daily_roi;
        }
    }

    accrual
}
