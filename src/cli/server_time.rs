//! Server time command - check the exchange clock

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use tracing::{info, warn};

use crate::provider::binance::BinanceClient;
use crate::provider::ExchangeApi;
use crate::schema::millis_to_datetime;

use super::load_settings;

/// Skew above which signed requests start being rejected
const MAX_SKEW_MILLIS: i64 = 1000;

/// Arguments for the server-time command
#[derive(Args)]
pub struct ServerTimeArgs {
    /// Configuration file path
    #[arg(long, short)]
    pub config: Option<String>,
}

/// Execute the server-time command
pub async fn execute(args: ServerTimeArgs) -> Result<()> {
    let settings = load_settings(args.config.as_deref())?;
    let client = BinanceClient::from_settings(&settings.exchange)?;

    let server_time = client.fetch_server_time().await?;
    let skew = Utc::now().timestamp_millis() - server_time;

    info!("Server time: {}", millis_to_datetime(server_time).to_rfc3339());
    info!("Local skew:  {} ms", skew);
    if skew.abs() > MAX_SKEW_MILLIS {
        warn!("Local clock differs from the exchange by more than {} ms", MAX_SKEW_MILLIS);
    }

    Ok(())
}
