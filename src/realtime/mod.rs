//! Realtime ingestion
//!
//! One combined WebSocket connection per stream kind covers every symbol.
//! Final kline bars also feed the `BarAggregator`, which emits one reduced
//! bar per symbol each time its buffer fills.

mod aggregator;
mod handler;
mod manager;

pub use aggregator::{reduce_bars, BarAggregator};
pub use handler::{FrameHandler, StreamStats};
pub use manager::{StreamManager, StreamManagerConfig};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::provider::{ProviderError, ProviderResult};
use crate::schema::Cadence;

/// Error returned for an unknown stream kind name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown stream type '{0}' (expected kline, trade or depth)")]
pub struct StreamKindParseError(pub String);

/// Kind of market data stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Candlestick updates, `<symbol>@kline_<interval>`
    Kline,
    /// Individual trades, `<symbol>@trade`
    Trade,
    /// Top 20 book levels every 100ms, `<symbol>@depth20@100ms`
    Depth,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Kline => "kline",
            StreamKind::Trade => "trade",
            StreamKind::Depth => "depth",
        }
    }

    /// Stream name for one symbol
    pub fn stream_name(&self, symbol: &str, cadence: Cadence) -> String {
        let symbol = symbol.to_lowercase();
        match self {
            StreamKind::Kline => format!("{}@kline_{}", symbol, cadence.code()),
            StreamKind::Trade => format!("{}@trade", symbol),
            StreamKind::Depth => format!("{}@depth20@100ms", symbol),
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamKind {
    type Err = StreamKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kline" => Ok(StreamKind::Kline),
            "trade" => Ok(StreamKind::Trade),
            "depth" => Ok(StreamKind::Depth),
            _ => Err(StreamKindParseError(s.to_string())),
        }
    }
}

/// Combined-stream URL subscribing every symbol to one stream kind
///
/// Stream names are joined with `/` into the `streams` query parameter and
/// left unencoded, as the exchange expects.
pub fn build_stream_url(
    base_url: &str,
    kind: StreamKind,
    symbols: &[String],
    cadence: Cadence,
) -> ProviderResult<Url> {
    if symbols.is_empty() {
        return Err(ProviderError::Configuration(format!(
            "no symbols to subscribe for {} stream",
            kind
        )));
    }

    let streams: Vec<String> = symbols
        .iter()
        .map(|s| kind.stream_name(s, cadence))
        .collect();
    let separator = if base_url.contains('?') { '&' } else { '?' };
    let url = format!("{}{}streams={}", base_url, separator, streams.join("/"));

    Url::parse(&url)
        .map_err(|e| ProviderError::Configuration(format!("invalid stream URL {}: {}", url, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_names() {
        assert_eq!(
            StreamKind::Kline.stream_name("BTCUSDT", Cadence::Minute5),
            "btcusdt@kline_5m"
        );
        assert_eq!(
            StreamKind::Trade.stream_name("BTCUSDT", Cadence::Minute5),
            "btcusdt@trade"
        );
        assert_eq!(
            StreamKind::Depth.stream_name("ETHBTC", Cadence::Minute1),
            "ethbtc@depth20@100ms"
        );
    }

    #[test]
    fn test_parse_stream_kind() {
        assert_eq!("kline".parse::<StreamKind>().unwrap(), StreamKind::Kline);
        assert_eq!(" Trade ".parse::<StreamKind>().unwrap(), StreamKind::Trade);
        assert_eq!("DEPTH".parse::<StreamKind>().unwrap(), StreamKind::Depth);
        assert!("ticker".parse::<StreamKind>().is_err());
    }

    #[test]
    fn test_build_stream_url() {
        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        let url = build_stream_url(
            "wss://stream.binance.com:9443/stream",
            StreamKind::Kline,
            &symbols,
            Cadence::Minute1,
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "wss://stream.binance.com:9443/stream?streams=btcusdt@kline_1m/ethusdt@kline_1m"
        );
    }

    #[test]
    fn test_build_stream_url_requires_symbols() {
        let result = build_stream_url(
            "wss://example.com/stream",
            StreamKind::Trade,
            &[],
            Cadence::Minute1,
        );
        assert!(result.is_err());
    }
}
