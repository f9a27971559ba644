use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoiStatus {
    Active,
    Paused,
}

impl RoiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoiStatus::Active => "active",
            RoiStatus::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(RoiStatus::Active),
            "paused" => Some(RoiStatus::Paused),
            _ => None,
        }
    }
}

/// Global ROI settings singleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RoiSettings {
    /// Daily return as a fraction of principal (0.01 = 1%/day).
    pub daily_roi: f64,
    /// Lifetime return cap as a fraction of principal (0.30 = 30%).
    pub max_roi: f64,
    pub status: RoiStatus,
    /// UTC hour of day (0–23) the scheduled daily run fires. The same
    /// clock as the calendar-day posting watermarks; local time never
    /// enters the schedule.
    #[serde(default = "default_trigger_hour")]
    pub trigger_hour: u32,
    /// Lifetime approved principal at which an account becomes active.
    #[serde(default = "default_activation_threshold")]
    pub activation_threshold: f64,
    /// Monotonically increasing token (unix millis at write time). In-flight
    /// scheduled work compares its snapshot against the stored value to
    /// detect staleness.
    #[serde(default)]
    pub settings_version: i64,
}

fn default_trigger_hour() -> u32 {
    10
}

fn default_activation_threshold() -> f64 {
    20.0
}

impl Default for RoiSettings {
    /// Unseeded stores report a paused zero-rate configuration, so the
    /// engine never pays out before an admin has seeded real settings.
    fn default() -> Self {
        RoiSettings {
            daily_roi: 0.0,
            max_roi: 0.0,
            status: RoiStatus::Paused,
            trigger_hour: default_trigger_hour(),
            activation_threshold: default_activation_threshold(),
            settings_version: 0,
        }
    }
}

impl RoiSettings {
    /// Number of days after which a deposit stops accruing.
    pub fn max_days(&self) -> i64 {
        if self.daily_roi <= 0.0 {
            return 0;
        }
        (self.max_roi / self.daily_roi).floor() as i64
    }
}
