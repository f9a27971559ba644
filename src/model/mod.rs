pub mod deposit;
pub mod ledger;
pub mod rules;
pub mod settings;
pub mod user;
pub mod withdrawal;

pub use deposit::{Deposit, DepositStatus};
pub use ledger::{IncomeType, LedgerEntry};
pub use rules::{ConfigBundle, LevelRule, RankRule};
pub use settings::{RoiSettings, RoiStatus};
pub use user::{KycStatus, User};
pub use withdrawal::{Withdrawal, WithdrawalStatus};
