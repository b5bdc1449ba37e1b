//! CLI parser.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cosmos")]
#[command(about = "Group-chat assistant: whitelist routing, per-thread ChatGPT conversations", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot over the console transport (JSON events on stdin, sends on stdout).
    Run {
        /// Config file (else COSMOS_CONFIG, else ./cosmos.json).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Load and validate the config, then print it with the key masked.
    CheckConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
