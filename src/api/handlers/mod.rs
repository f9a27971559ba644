pub mod config;
pub mod deposits;
pub mod runs;
pub mod users;
pub mod withdrawals;
