//! Exchange access
//!
//! `ExchangeApi` is the seam between the schedulers and the remote exchange.
//! The Binance client is the production implementation; the mock exchange
//! stands in for it in tests and offline runs.

pub mod binance;
pub mod mock;
mod traits;

pub use traits::*;
