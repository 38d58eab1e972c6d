//! Backfill command - one-off historical backfill

use anyhow::{anyhow, Result};
use clap::Args;
use tracing::{info, warn};

use crate::feeder::Feeder;
use crate::schema::Cadence;

use super::{load_settings, parse_time};

/// Arguments for the backfill command
#[derive(Args)]
pub struct BackfillArgs {
    /// Configuration file path
    #[arg(long, short)]
    pub config: Option<String>,

    /// Start time (RFC3339 or YYYY-MM-DD), overrides backfill.start_time
    #[arg(long)]
    pub start: Option<String>,

    /// End time (RFC3339 or YYYY-MM-DD), defaults to now
    #[arg(long)]
    pub end: Option<String>,

    /// Bar interval (1m, 5m, 1h, 1d, ...)
    #[arg(long, short)]
    pub interval: Option<Cadence>,

    /// Symbols to backfill (comma-separated), replaces the include list
    #[arg(long, short, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Symbols processed concurrently
    #[arg(long, short)]
    pub parallelism: Option<usize>,

    /// Bars per request
    #[arg(long)]
    pub batch_size: Option<u32>,
}

/// Execute the backfill command
pub async fn execute(args: BackfillArgs) -> Result<()> {
    let mut settings = load_settings(args.config.as_deref())?;

    settings.backfill.enabled = true;
    settings.realtime.enabled = false;
    if let Some(start) = &args.start {
        settings.backfill.start_time = Some(parse_time(start)?);
    }
    if let Some(end) = &args.end {
        settings.backfill.end_time = Some(parse_time(end)?);
    }
    if let Some(interval) = args.interval {
        settings.backfill.interval = interval;
    }
    if !args.symbols.is_empty() {
        settings.symbols.include = args.symbols.clone();
    }
    if let Some(parallelism) = args.parallelism {
        settings.backfill.parallelism = parallelism;
    }
    if let Some(batch_size) = args.batch_size {
        settings.backfill.batch_size = batch_size;
    }
    settings.validate()?;

    let feeder = Feeder::from_settings(settings)?;

    let cancel = feeder.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping backfill");
            cancel.cancel();
        }
    });

    let summary = feeder.run().await;
    let report = summary
        .backfill
        .ok_or_else(|| anyhow!("backfill did not run"))?;

    info!("=== Backfill Report ===");
    info!("Symbols:        {}", report.symbols_processed);
    info!("Windows:        {} fetched, {} failed", report.windows_fetched, report.windows_failed);
    info!("Bars written:   {}", report.bars_written);
    info!("Write failures: {}", report.write_failures);
    if report.cancelled {
        warn!("Backfill was cancelled before completion");
    }

    Ok(())
}
