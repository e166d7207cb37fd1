//! Songsmith CLI
//!
//! Command-line interface for the Songsmith server.

mod commands;
mod config;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "songsmith")]
#[command(about = "Songsmith song generation CLI", long_about = None)]
struct Cli {
    /// Server URL
    #[arg(long, env = "SONGSMITH_URL", default_value = "http://localhost:5000")]
    server_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "SONGSMITH_TIMEOUT", default_value = "1800")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        server_url: cli.server_url,
        timeout: Duration::from_secs(cli.timeout),
    };

    handle_command(cli.command, &config).await
}
