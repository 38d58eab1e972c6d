//! Command-line interface
//!
//! Provides CLI commands for the feeder.

pub mod backfill;
pub mod serve;
pub mod server_time;
pub mod symbols;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::config::Settings;

/// Binance market data feeder
#[derive(Parser)]
#[command(name = "binance-feeder")]
#[command(about = "Backfill and stream Binance market data into a columnar store")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run backfill and realtime ingestion until interrupted
    Serve(serve::ServeArgs),
    /// Run a one-off historical backfill
    Backfill(backfill::BackfillArgs),
    /// Print the resolved working symbol set
    Symbols(symbols::SymbolsArgs),
    /// Print the exchange clock and local skew
    ServerTime(server_time::ServerTimeArgs),
}

/// Load settings from an explicit file or the layered config directory
pub fn load_settings(path: Option<&str>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => Settings::load().context("failed to load configuration")?,
    };
    Ok(settings)
}

/// Parse an RFC3339 timestamp or a `YYYY-MM-DD` date (midnight UTC)
pub fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid time '{}', expected RFC3339 or YYYY-MM-DD", value))?;
    date.and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .with_context(|| format!("invalid date '{}'", value))
}
