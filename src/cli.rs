use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MLM payout engine: daily ROI accrual, multi-level referral
/// commissions, rank rewards, and the approval workflow that feeds them.
#[derive(Parser)]
#[command(name = "payout-flow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Output the JSON schema for configuration bundles
    Schema,

    /// Validate a configuration bundle JSON file
    Validate {
        /// Path to the configuration JSON file
        file: PathBuf,
    },

    /// Output an example configuration bundle to stdout
    Example,

    /// Validate a configuration bundle and write it into the store
    Seed {
        /// Path to the configuration JSON file
        file: PathBuf,

        /// Directory holding the sqlite database
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },

    /// Run the daily payout once, immediately (manual admin trigger)
    Run {
        /// Directory holding the sqlite database
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Also run the rank evaluation pass
        #[arg(long)]
        ranks: bool,
    },

    /// Start the admin API server with the daily scheduler
    Serve {
        /// Host to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind
        #[arg(long, default_value = "8787")]
        port: u16,

        /// Directory holding the sqlite database
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
}
