use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of income types. Dispatch on this enum, never on free-form
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeType {
    Roi,
    Level,
    Reward,
}

impl IncomeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeType::Roi => "roi",
            IncomeType::Level => "level",
            IncomeType::Reward => "reward",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "roi" => Some(IncomeType::Roi),
            "level" => Some(IncomeType::Level),
            "reward" => Some(IncomeType::Reward),
            _ => None,
        }
    }
}

/// One posting event. Append-only: a reversal is a new offsetting entry,
/// never an edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    pub income_type: IncomeType,
    pub amount: f64,
    /// The calendar day this income is *for*, not when it was posted.
    pub for_date: NaiveDate,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn credited(
        id: String,
        user_id: String,
        income_type: IncomeType,
        amount: f64,
        for_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        LedgerEntry {
            id,
            user_id,
            income_type,
            amount,
            for_date,
            status: "credited".to_string(),
            created_at: now,
        }
    }
}
