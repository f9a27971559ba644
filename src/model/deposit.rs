use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Pending,
    Approved,
    Rejected,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "pending",
            DepositStatus::Approved => "approved",
            DepositStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DepositStatus::Pending),
            "approved" => Some(DepositStatus::Approved),
            "rejected" => Some(DepositStatus::Rejected),
            _ => None,
        }
    }
}

/// A principal deposit. Only approved deposits with an `approved_at` anchor
/// participate in ROI accrual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub status: DepositStatus,
    /// Accrual start anchor, set when the deposit is approved.
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Deposit {
    pub fn new(id: String, user_id: String, amount: f64, now: DateTime<Utc>) -> Self {
        Deposit {
            id,
            user_id,
            amount,
            status: DepositStatus::Pending,
            approved_at: None,
            created_at: now,
        }
    }

    /// Whole calendar days between the approval day and `today`.
    ///
    /// Uses normalized date boundaries, not millisecond deltas, so the time
    /// of day a deposit was approved never shifts its day count.
    pub fn days_since_approval(&self, today: NaiveDate) -> Option<i64> {
        let anchor = self.approved_at?.date_naive();
        Some((today - anchor).num_days())
    }
}
