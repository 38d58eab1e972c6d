//! # Binance Feeder
//!
//! Market data ingestion from Binance into a columnar time-series store.
//!
//! ## Features
//!
//! - **Historical backfill**: paginates the klines endpoint over any range,
//!   a bounded number of symbols at a time, behind one shared rate limiter
//! - **Realtime streaming**: one combined WebSocket per stream kind (klines,
//!   trades, depth) covering the whole symbol universe
//! - **Bar aggregation**: final kline bars are reduced per symbol into
//!   coarser bars once a buffer threshold is reached
//!
//! ## Architecture
//!
//! Both paths talk to the exchange through the `ExchangeApi` trait and hand
//! normalized records to a `MarketDataSink`. The `Feeder` runs them side by
//! side under one cancellation token.

pub mod backfill;
pub mod cli;
pub mod config;
pub mod feeder;
pub mod logging;
pub mod provider;
pub mod realtime;
pub mod schema;
pub mod storage;
pub mod symbol;

// Re-export commonly used types
pub use backfill::{BackfillJob, BackfillReport, BackfillScheduler};
pub use config::Settings;
pub use feeder::{Feeder, FeederSummary};
pub use provider::{ExchangeApi, ProviderError, ProviderResult};
pub use realtime::{BarAggregator, StreamKind, StreamManager};
pub use schema::{Bar, Cadence, DepthSnapshot, Trade};
pub use storage::{MarketDataSink, SinkError};
pub use symbol::{SymbolInfo, SymbolUniverse};
