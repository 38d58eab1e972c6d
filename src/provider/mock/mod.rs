//! Mock exchange for testing
//!
//! Serves synthetic bars and a fixed catalog, records every bar request, and
//! can be scripted to fail specific windows or symbols.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::provider::{ExchangeApi, ProviderError, ProviderResult};
use crate::schema::{Bar, Cadence, DepthSnapshot, PriceLevel, Trade};
use crate::symbol::SymbolInfo;

/// One recorded `fetch_bars` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarRequest {
    pub symbol: String,
    pub cadence: Cadence,
    pub start_time: i64,
    pub end_time: i64,
    pub limit: u32,
}

/// Mock exchange for testing
pub struct MockExchange {
    catalog: Vec<SymbolInfo>,
    catalog_fails: bool,
    failing_windows: HashSet<(String, i64)>,
    failing_symbols: HashSet<String>,
    call_delay: Duration,
    stream_url: String,
    /// Price of every synthetic bar
    pub base_price: f64,
    bar_requests: Mutex<Vec<BarRequest>>,
    catalog_calls: AtomicUsize,
}

impl MockExchange {
    /// Create a mock with an empty catalog
    pub fn new() -> Self {
        Self {
            catalog: Vec::new(),
            catalog_fails: false,
            failing_windows: HashSet::new(),
            failing_symbols: HashSet::new(),
            call_delay: Duration::ZERO,
            stream_url: "ws://127.0.0.1:9/stream".to_string(),
            base_price: 100.0,
            bar_requests: Mutex::new(Vec::new()),
            catalog_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_catalog(mut self, catalog: Vec<SymbolInfo>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Make every catalog fetch fail
    pub fn with_catalog_failure(mut self) -> Self {
        self.catalog_fails = true;
        self
    }

    /// Fail the bar request for `symbol` starting at `start_time`
    pub fn fail_window(mut self, symbol: &str, start_time: i64) -> Self {
        self.failing_windows
            .insert((symbol.to_uppercase(), start_time));
        self
    }

    /// Fail every bar request for `symbol`
    pub fn fail_symbol(mut self, symbol: &str) -> Self {
        self.failing_symbols.insert(symbol.to_uppercase());
        self
    }

    /// Simulated round-trip latency of every bar request
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = url.into();
        self
    }

    /// All bar requests in call order
    pub fn bar_requests(&self) -> Vec<BarRequest> {
        self.bar_requests.lock().clone()
    }

    /// Bar requests for one symbol in call order
    pub fn bar_requests_for(&self, symbol: &str) -> Vec<BarRequest> {
        self.bar_requests
            .lock()
            .iter()
            .filter(|r| r.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
            .collect()
    }

    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    fn synthetic_bar(&self, open_time: i64, cadence: Cadence) -> Bar {
        let price = self.base_price;
        Bar {
            open_time,
            open: price,
            high: price + 1.0,
            low: price - 1.0,
            close: price + 0.5,
            volume: 1.0,
            close_time: open_time + cadence.duration_millis() - 1,
            quote_volume: price,
            trade_count: 1,
            taker_buy_base: 0.5,
            taker_buy_quote: price / 2.0,
        }
    }
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeApi for MockExchange {
    async fn fetch_bars(
        &self,
        symbol: &str,
        cadence: Cadence,
        start_time: i64,
        end_time: i64,
        limit: u32,
    ) -> ProviderResult<Vec<Bar>> {
        let symbol = symbol.to_uppercase();
        self.bar_requests.lock().push(BarRequest {
            symbol: symbol.clone(),
            cadence,
            start_time,
            end_time,
            limit,
        });

        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }

        if self.failing_symbols.contains(&symbol)
            || self.failing_windows.contains(&(symbol.clone(), start_time))
        {
            return Err(ProviderError::Request(format!(
                "simulated failure for {} at {}",
                symbol, start_time
            )));
        }

        let step = cadence.duration_millis();
        let bars = (0..limit as i64)
            .map(|i| start_time + i * step)
            .take_while(|t| *t < end_time)
            .map(|t| self.synthetic_bar(t, cadence))
            .collect();

        Ok(bars)
    }

    async fn fetch_recent_trades(&self, _symbol: &str, limit: u32) -> ProviderResult<Vec<Trade>> {
        Ok((0..limit as i64)
            .map(|i| Trade {
                id: i + 1,
                price: self.base_price,
                quantity: 1.0,
                quote_quantity: self.base_price,
                timestamp_millis: 1_700_000_000_000 + i,
                is_buyer_maker: i % 2 == 0,
            })
            .collect())
    }

    async fn fetch_depth(&self, _symbol: &str, limit: u32) -> ProviderResult<DepthSnapshot> {
        let levels = |sign: f64| -> Vec<PriceLevel> {
            (1..=limit)
                .map(|i| PriceLevel {
                    price: self.base_price + sign * i as f64 * 0.01,
                    size: 1.0,
                })
                .collect()
        };

        Ok(DepthSnapshot {
            last_update_id: 1,
            bids: levels(-1.0),
            asks: levels(1.0),
        })
    }

    async fn fetch_exchange_info(&self) -> ProviderResult<Vec<SymbolInfo>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if self.catalog_fails {
            return Err(ProviderError::Connection(
                "simulated catalog failure".to_string(),
            ));
        }
        Ok(self.catalog.clone())
    }

    async fn fetch_server_time(&self) -> ProviderResult<i64> {
        Ok(chrono::Utc::now().timestamp_millis())
    }

    fn stream_base_url(&self) -> &str {
        &self.stream_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_synthetic_bars_respect_window_and_limit() {
        let mock = MockExchange::new();

        let bars = mock
            .fetch_bars("btcusdt", Cadence::Minute1, 0, 5 * 60_000, 1000)
            .await
            .unwrap();
        assert_eq!(bars.len(), 5);
        assert_eq!(bars[4].open_time, 4 * 60_000);

        let limited = mock
            .fetch_bars("BTCUSDT", Cadence::Minute1, 0, 5 * 60_000, 2)
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);

        assert_eq!(mock.bar_requests_for("BTCUSDT").len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let mock = MockExchange::new()
            .fail_window("ETHUSDT", 60_000)
            .fail_symbol("BADUSDT");

        assert!(mock
            .fetch_bars("ETHUSDT", Cadence::Minute1, 0, 60_000, 10)
            .await
            .is_ok());
        assert!(mock
            .fetch_bars("ethusdt", Cadence::Minute1, 60_000, 120_000, 10)
            .await
            .is_err());
        assert!(mock
            .fetch_bars("BADUSDT", Cadence::Minute1, 0, 60_000, 10)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_catalog_failure_counts_calls() {
        let mock = MockExchange::new().with_catalog_failure();

        assert!(mock.fetch_exchange_info().await.is_err());
        assert_eq!(mock.catalog_calls(), 1);
    }
}
