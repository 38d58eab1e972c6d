//! Exchange trait definitions

use async_trait::async_trait;
use thiserror::Error;

use crate::schema::{Bar, Cadence, DepthSnapshot, Trade};
use crate::symbol::SymbolInfo;

/// Provider error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// REST surface of the exchange plus the streaming endpoint address
///
/// Every REST call on an implementation shares one request budget.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Fetch bars whose open time lies in `[start_time, end_time)` (epoch millis)
    async fn fetch_bars(
        &self,
        symbol: &str,
        cadence: Cadence,
        start_time: i64,
        end_time: i64,
        limit: u32,
    ) -> ProviderResult<Vec<Bar>>;

    /// Fetch the most recent trades for a symbol
    async fn fetch_recent_trades(&self, symbol: &str, limit: u32) -> ProviderResult<Vec<Trade>>;

    /// Fetch an order book snapshot
    async fn fetch_depth(&self, symbol: &str, limit: u32) -> ProviderResult<DepthSnapshot>;

    /// Fetch the full symbol catalog, unfiltered
    async fn fetch_exchange_info(&self) -> ProviderResult<Vec<SymbolInfo>>;

    /// Exchange clock in epoch millis
    async fn fetch_server_time(&self) -> ProviderResult<i64>;

    /// Base address for combined streams
    fn stream_base_url(&self) -> &str;
}
