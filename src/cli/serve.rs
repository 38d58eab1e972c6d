//! Serve command - run the feeder until interrupted

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::feeder::Feeder;

use super::load_settings;

/// Arguments for the serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Configuration file path
    #[arg(long, short)]
    pub config: Option<String>,

    /// Skip the backfill even if enabled in the configuration
    #[arg(long)]
    pub no_backfill: bool,

    /// Skip realtime streaming even if enabled in the configuration
    #[arg(long)]
    pub no_realtime: bool,
}

/// Execute the serve command
pub async fn execute(args: ServeArgs) -> Result<()> {
    let mut settings = load_settings(args.config.as_deref())?;
    if args.no_backfill {
        settings.backfill.enabled = false;
    }
    if args.no_realtime {
        settings.realtime.enabled = false;
    }
    settings.validate()?;

    info!("Starting feeder");
    info!("  Testnet: {}", settings.exchange.testnet);
    info!("  Timeframe: {}", settings.timeframe);
    info!("  Backfill: {}", settings.backfill.enabled);
    info!(
        "  Realtime: {} {:?}",
        settings.realtime.enabled, settings.realtime.stream_types
    );
    info!(
        "  Storage: {:?} at {}",
        settings.storage.backend,
        settings.storage.directory.display()
    );

    let feeder = Feeder::from_settings(settings)?;

    // Set up shutdown handling
    let cancel = feeder.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            cancel.cancel();
        }
    });

    let summary = feeder.run().await;

    if let Some(report) = &summary.backfill {
        info!(
            "Backfill: {} symbols, {} bars written, {} windows failed",
            report.symbols_processed, report.bars_written, report.windows_failed
        );
    }
    for (kind, stats) in &summary.realtime {
        info!(
            "{} stream: {} frames, {} records, {} decode errors",
            kind, stats.frames_received, stats.records_forwarded, stats.decode_errors
        );
    }

    info!("Feeder stopped");
    Ok(())
}
