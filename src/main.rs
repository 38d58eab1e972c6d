//! Binance Feeder CLI
//!
//! Provides commands for:
//! - `serve`: Run backfill and realtime ingestion
//! - `backfill`: One-off historical backfill
//! - `symbols`: Print the working symbol set
//! - `server-time`: Check the exchange clock

use anyhow::{anyhow, Result};
use clap::Parser;

use binance_feeder::cli::{Cli, Commands};
use binance_feeder::logging::{init_logging, LogConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_logging(LogConfig::from_env()).map_err(|e| anyhow!(e))?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Execute command
    match cli.command {
        Commands::Serve(args) => {
            binance_feeder::cli::serve::execute(args).await?;
        }
        Commands::Backfill(args) => {
            binance_feeder::cli::backfill::execute(args).await?;
        }
        Commands::Symbols(args) => {
            binance_feeder::cli::symbols::execute(args).await?;
        }
        Commands::ServerTime(args) => {
            binance_feeder::cli::server_time::execute(args).await?;
        }
    }

    Ok(())
}
