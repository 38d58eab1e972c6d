//! Binance spot implementation
//!
//! REST access through `BinanceClient`, plus the wire types and lenient
//! decoders shared with the realtime stream manager.

mod client;
pub mod endpoints;
mod rate_limiter;
pub mod types;

pub use client::BinanceClient;
pub use endpoints::BinanceEndpoints;
pub use rate_limiter::{RequestRateLimiter, DEFAULT_REQUESTS_PER_MINUTE};
