//! Count-based bar aggregation
//!
//! Buffers are keyed by (symbol, cadence) and locked individually, so a
//! flush for one symbol never blocks ingestion for another. There is no
//! time-based flush; `flush_all` drains partial buffers on shutdown.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::schema::{Bar, Cadence};
use crate::storage::MarketDataSink;

type BufferKey = (String, Cadence);

/// Reduce consecutive bars into one
///
/// Open and open time from the first bar, close and close time from the
/// last, extremes across all bars, volumes and counts summed.
pub fn reduce_bars(bars: &[Bar]) -> Option<Bar> {
    let first = bars.first()?;
    let last = bars.last()?;

    let mut reduced = Bar {
        open_time: first.open_time,
        open: first.open,
        high: first.high,
        low: first.low,
        close: last.close,
        volume: 0.0,
        close_time: last.close_time,
        quote_volume: 0.0,
        trade_count: 0,
        taker_buy_base: 0.0,
        taker_buy_quote: 0.0,
    };

    for bar in bars {
        reduced.high = reduced.high.max(bar.high);
        reduced.low = reduced.low.min(bar.low);
        reduced.volume += bar.volume;
        reduced.quote_volume += bar.quote_volume;
        reduced.trade_count += bar.trade_count;
        reduced.taker_buy_base += bar.taker_buy_base;
        reduced.taker_buy_quote += bar.taker_buy_quote;
    }

    Some(reduced)
}

/// Per-symbol bar buffers flushed to the sink by count
pub struct BarAggregator {
    cadence: Cadence,
    buffer_size: usize,
    sink: Arc<dyn MarketDataSink>,
    buffers: DashMap<BufferKey, Arc<Mutex<Vec<Bar>>>>,
}

impl BarAggregator {
    /// Reduced bars are written under `cadence`; a buffer flushes at `buffer_size` bars
    pub fn new(cadence: Cadence, buffer_size: usize, sink: Arc<dyn MarketDataSink>) -> Self {
        Self {
            cadence,
            buffer_size: buffer_size.max(1),
            sink,
            buffers: DashMap::new(),
        }
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn buffer(&self, symbol: &str) -> Arc<Mutex<Vec<Bar>>> {
        // Clone the handle so the map shard lock is released before awaiting
        self.buffers
            .entry((symbol.to_string(), self.cadence))
            .or_insert_with(|| Arc::new(Mutex::new(Vec::with_capacity(self.buffer_size))))
            .clone()
    }

    /// Append a bar and flush the symbol's buffer once it is full
    pub async fn ingest(&self, symbol: &str, bar: Bar) {
        let buffer = self.buffer(symbol);
        let mut bars = buffer.lock().await;
        bars.push(bar);

        if bars.len() >= self.buffer_size {
            self.flush_locked(symbol, &mut bars).await;
        }
    }

    /// Flush one symbol's buffer; no-op when empty or unknown
    pub async fn flush(&self, symbol: &str) {
        let buffer = match self.buffers.get(&(symbol.to_string(), self.cadence)) {
            Some(entry) => entry.value().clone(),
            None => return,
        };
        let mut bars = buffer.lock().await;
        self.flush_locked(symbol, &mut bars).await;
    }

    /// Flush every non-empty buffer
    pub async fn flush_all(&self) {
        let symbols: Vec<String> = self.buffers.iter().map(|e| e.key().0.clone()).collect();
        for symbol in symbols {
            self.flush(&symbol).await;
        }
    }

    /// Bars waiting in a symbol's buffer
    pub async fn buffered(&self, symbol: &str) -> usize {
        let buffer = match self.buffers.get(&(symbol.to_string(), self.cadence)) {
            Some(entry) => entry.value().clone(),
            None => return 0,
        };
        let len = buffer.lock().await.len();
        len
    }

    async fn flush_locked(&self, symbol: &str, bars: &mut Vec<Bar>) {
        let Some(reduced) = reduce_bars(bars) else {
            return;
        };
        let count = bars.len();
        bars.clear();

        match self.sink.write_bars(symbol, self.cadence, &[reduced]).await {
            Ok(()) => debug!(
                "Flushed {} bars for {} into one {} bar",
                count,
                symbol,
                self.cadence.timeframe_label()
            ),
            Err(e) => error!("Failed to write aggregated bar for {}: {}", symbol, e),
        }
    }

    /// Number of (symbol, cadence) buffers created so far
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Log buffer occupancy
    pub async fn log_status(&self) {
        let symbols: Vec<String> = self.buffers.iter().map(|e| e.key().0.clone()).collect();
        for symbol in symbols {
            info!(
                "Aggregator buffer {} {}: {}/{}",
                symbol,
                self.cadence.timeframe_label(),
                self.buffered(&symbol).await,
                self.buffer_size
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ColumnarWriter, MemoryColumnStore, SinkError, SinkResult, TimeBucketKey};
    use crate::schema::{DepthSnapshot, Trade};
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;

    /// Records every bar batch written
    #[derive(Default)]
    struct RecordingSink {
        bars: SyncMutex<Vec<(String, Cadence, Vec<Bar>)>>,
        fail: bool,
    }

    #[async_trait]
    impl MarketDataSink for RecordingSink {
        async fn write_bars(&self, symbol: &str, cadence: Cadence, bars: &[Bar]) -> SinkResult<()> {
            if self.fail {
                return Err(SinkError::Store("unavailable".to_string()));
            }
            self.bars
                .lock()
                .push((symbol.to_string(), cadence, bars.to_vec()));
            Ok(())
        }

        async fn write_trades(&self, _symbol: &str, _trades: &[Trade]) -> SinkResult<()> {
            Ok(())
        }

        async fn write_depth(&self, _symbol: &str, _depth: &DepthSnapshot) -> SinkResult<()> {
            Ok(())
        }
    }

    fn bar(i: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Bar {
        Bar {
            open_time: i * 60_000,
            open,
            high,
            low,
            close,
            volume,
            close_time: i * 60_000 + 59_999,
            quote_volume: volume * 10.0,
            trade_count: 2,
            taker_buy_base: volume / 2.0,
            taker_buy_quote: volume * 5.0,
        }
    }

    #[test]
    fn test_reduce_empty() {
        assert_eq!(reduce_bars(&[]), None);
    }

    #[test]
    fn test_reduce_rule() {
        let bars = [
            bar(0, 5.0, 10.0, 1.0, 6.0, 1.0),
            bar(1, 6.0, 12.0, 2.0, 7.0, 1.0),
            bar(2, 7.0, 9.0, 0.5, 8.0, 1.0),
        ];

        let reduced = reduce_bars(&bars).unwrap();

        assert_eq!(reduced.open_time, 0);
        assert_eq!(reduced.close_time, 2 * 60_000 + 59_999);
        assert_eq!(reduced.open, 5.0);
        assert_eq!(reduced.close, 8.0);
        assert_eq!(reduced.high, 12.0);
        assert_eq!(reduced.low, 0.5);
        assert_eq!(reduced.volume, 3.0);
        assert_eq!(reduced.quote_volume, 30.0);
        assert_eq!(reduced.trade_count, 6);
        assert_eq!(reduced.taker_buy_base, 1.5);
        assert_eq!(reduced.taker_buy_quote, 15.0);
    }

    #[tokio::test]
    async fn test_flush_at_buffer_size() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = BarAggregator::new(Cadence::Minute5, 3, sink.clone());

        aggregator.ingest("BTCUSDT", bar(0, 5.0, 10.0, 1.0, 6.0, 1.0)).await;
        aggregator.ingest("BTCUSDT", bar(1, 6.0, 12.0, 2.0, 7.0, 1.0)).await;
        assert!(sink.bars.lock().is_empty());
        assert_eq!(aggregator.buffered("BTCUSDT").await, 2);

        aggregator.ingest("BTCUSDT", bar(2, 7.0, 9.0, 0.5, 8.0, 1.0)).await;

        let written = sink.bars.lock().clone();
        assert_eq!(written.len(), 1);
        let (symbol, cadence, bars) = &written[0];
        assert_eq!(symbol, "BTCUSDT");
        assert_eq!(*cadence, Cadence::Minute5);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].high, 12.0);
        assert_eq!(bars[0].low, 0.5);
        assert_eq!(bars[0].volume, 3.0);
        assert_eq!(bars[0].open, 5.0);
        assert_eq!(bars[0].close, 8.0);
        assert_eq!(aggregator.buffered("BTCUSDT").await, 0);
    }

    #[tokio::test]
    async fn test_symbols_buffer_independently() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = BarAggregator::new(Cadence::Minute1, 2, sink.clone());

        aggregator.ingest("BTCUSDT", bar(0, 1.0, 1.0, 1.0, 1.0, 1.0)).await;
        aggregator.ingest("ETHUSDT", bar(0, 1.0, 1.0, 1.0, 1.0, 1.0)).await;
        assert!(sink.bars.lock().is_empty());

        aggregator.ingest("ETHUSDT", bar(1, 1.0, 1.0, 1.0, 1.0, 1.0)).await;

        let written = sink.bars.lock().clone();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, "ETHUSDT");
        assert_eq!(aggregator.buffered("BTCUSDT").await, 1);
        assert_eq!(aggregator.buffer_count(), 2);
    }

    #[tokio::test]
    async fn test_flush_is_noop_when_empty() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = BarAggregator::new(Cadence::Minute1, 5, sink.clone());

        aggregator.flush("BTCUSDT").await;
        aggregator.ingest("BTCUSDT", bar(0, 1.0, 2.0, 0.5, 1.5, 1.0)).await;
        aggregator.flush("BTCUSDT").await;
        aggregator.flush("BTCUSDT").await;

        assert_eq!(sink.bars.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_flush_all_drains_partial_buffers() {
        let writer = Arc::new(ColumnarWriter::new(MemoryColumnStore::new()));
        let aggregator = BarAggregator::new(Cadence::Hour1, 100, writer.clone());

        aggregator.ingest("BTCUSDT", bar(0, 1.0, 2.0, 0.5, 1.5, 1.0)).await;
        aggregator.ingest("ETHUSDT", bar(0, 1.0, 2.0, 0.5, 1.5, 1.0)).await;
        aggregator.flush_all().await;

        let store = writer.store();
        assert_eq!(store.row_count(&TimeBucketKey::ohlcv("BTCUSDT", Cadence::Hour1)), 1);
        assert_eq!(store.row_count(&TimeBucketKey::ohlcv("ETHUSDT", Cadence::Hour1)), 1);
        assert_eq!(aggregator.buffered("BTCUSDT").await, 0);
    }

    #[tokio::test]
    async fn test_write_failure_still_clears_buffer() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let aggregator = BarAggregator::new(Cadence::Minute1, 1, sink);

        aggregator.ingest("BTCUSDT", bar(0, 1.0, 2.0, 0.5, 1.5, 1.0)).await;

        assert_eq!(aggregator.buffered("BTCUSDT").await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_ingest_flushes_every_bar_once() {
        let sink = Arc::new(RecordingSink::default());
        let aggregator = Arc::new(BarAggregator::new(Cadence::Minute1, 10, sink.clone()));

        let mut handles = Vec::new();
        for task in 0..4 {
            let aggregator = aggregator.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    let symbol = if task % 2 == 0 { "BTCUSDT" } else { "ETHUSDT" };
                    aggregator
                        .ingest(symbol, bar(i, 1.0, 1.0, 1.0, 1.0, 1.0))
                        .await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 50 bars per symbol, buffer of 10: five flushes each, nothing left over
        let written = sink.bars.lock().clone();
        assert_eq!(written.len(), 10);
        let total_volume: f64 = written.iter().map(|(_, _, bars)| bars[0].volume).sum();
        assert_eq!(total_volume, 100.0);
        assert_eq!(aggregator.buffered("BTCUSDT").await, 0);
        assert_eq!(aggregator.buffered("ETHUSDT").await, 0);
    }
}
