//! Storage layer for market data
//!
//! The ingestion engine only sees `MarketDataSink`. `ColumnarWriter` is the
//! concrete sink: it turns records into named column batches addressed by a
//! `symbol/timeframe/fieldGroup` key and appends them to a `ColumnStore`.

mod columnar;
mod jsonl;
mod memory;

pub use columnar::*;
pub use jsonl::JsonLinesStore;
pub use memory::MemoryColumnStore;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{StorageBackend, StorageSettings};
use crate::schema::{Bar, Cadence, DepthSnapshot, Trade};

/// Sink errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for normalized market data
///
/// Writes for different symbols may arrive concurrently.
#[async_trait]
pub trait MarketDataSink: Send + Sync {
    /// Append bars for `symbol` under the timeframe of `cadence`
    async fn write_bars(&self, symbol: &str, cadence: Cadence, bars: &[Bar]) -> SinkResult<()>;

    /// Append trades for `symbol`
    async fn write_trades(&self, symbol: &str, trades: &[Trade]) -> SinkResult<()>;

    /// Record an order book snapshot for `symbol`
    async fn write_depth(&self, symbol: &str, depth: &DepthSnapshot) -> SinkResult<()>;
}

/// Build the sink selected in the settings
pub fn open_sink(settings: &StorageSettings) -> Arc<dyn MarketDataSink> {
    match settings.backend {
        StorageBackend::Memory => Arc::new(ColumnarWriter::new(MemoryColumnStore::new())),
        StorageBackend::Jsonl => Arc::new(ColumnarWriter::new(JsonLinesStore::new(
            &settings.directory,
        ))),
    }
}
