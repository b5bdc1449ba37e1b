//! cosmos CLI: run the bot or check its config.

use anyhow::Result;
use clap::Parser;
use cosmos::cli::{Cli, Commands};
use cosmos::{run_bot, CosmosConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = CosmosConfig::load(config)?;
            run_bot(config).await
        }
        Commands::CheckConfig { config } => {
            let config = CosmosConfig::load(config)?;
            println!("{}", config.summary());
            println!("config OK");
            Ok(())
        }
    }
}
