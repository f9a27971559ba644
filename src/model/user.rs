use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// KYC review status. Withdrawals are gated on `Approved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Pending,
    Approved,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Pending => "pending",
            KycStatus::Approved => "approved",
            KycStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(KycStatus::Pending),
            "approved" => Some(KycStatus::Approved),
            "rejected" => Some(KycStatus::Rejected),
            _ => None,
        }
    }
}

/// A platform member. The referral relation is the `referrer_id` parent
/// pointer; it is set once at registration and never retargeted, so the
/// referral graph is a forest by construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Upstream referrer. `None` for root accounts.
    pub referrer_id: Option<String>,

    /// Cumulative approved principal.
    pub self_deposit: f64,
    /// Withdrawable credited funds. Only the payout poster and the
    /// withdrawal settle primitive may move this.
    pub balance: f64,

    // ── Advisory display caches ──
    pub roi_income: f64,
    pub level_income: f64,
    pub reward: f64,
    pub rank: u32,
    pub power_leg_business: f64,
    pub other_leg_business: f64,

    /// True once lifetime approved deposits reach the activation threshold.
    pub is_active: bool,
    /// Blocked users are excluded from all payout and eligibility math.
    pub is_blocked: bool,
    pub kyc_status: KycStatus,

    /// Watermarks: last calendar day each income type was posted for.
    pub last_roi_date: Option<NaiveDate>,
    pub last_level_income_date: Option<NaiveDate>,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: String, name: String, referrer_id: Option<String>, now: DateTime<Utc>) -> Self {
        User {
            id,
            name,
            referrer_id,
            self_deposit: 0.0,
            balance: 0.0,
            roi_income: 0.0,
            level_income: 0.0,
            reward: 0.0,
            rank: 0,
            power_leg_business: 0.0,
            other_leg_business: 0.0,
            is_active: false,
            is_blocked: false,
            kyc_status: KycStatus::Pending,
            last_roi_date: None,
            last_level_income_date: None,
            created_at: now,
        }
    }

    /// Users that participate in payout and eligibility computation.
    pub fn is_payable(&self) -> bool {
        self.is_active && !self.is_blocked
    }
}
