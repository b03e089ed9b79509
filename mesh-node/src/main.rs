// SPDX-License-Identifier: MIT OR Apache-2.0

mod cli;
mod config;
mod daemon;
mod logger;

use clap::Parser;
use cli::{Cli, NodeCommand};
use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Some(NodeCommand::Reset)) {
        println!("RESET_BLOCKCHAIN");
        return Ok(());
    }

    let config = Config::load(&cli.opts)?;
    logger::init(&config.log_level);

    daemon::run(config).await
}
