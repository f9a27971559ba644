use anyhow::Context;
use clap::Parser;

use payout_flow::{api, cli, example, schema, seed, trigger, validate};

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Schema => schema::run(),
        cli::Command::Validate { file } => validate::run(&file),
        cli::Command::Example => example::run(),
        cli::Command::Seed { file, data_dir } => seed::run(&file, &data_dir),
        cli::Command::Run { data_dir, ranks } => trigger::run(&data_dir, ranks),
        cli::Command::Serve {
            host,
            port,
            data_dir,
        } => {
            let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
            rt.block_on(api::serve(&host, port, &data_dir))
        }
    }
}
