//! Stream frame decoding and forwarding

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::provider::binance::types::{
    symbol_from_stream_name, DepthPayload, KlineEvent, StreamFrame, TradeEvent,
};
use crate::schema::Cadence;
use crate::storage::MarketDataSink;

use super::{BarAggregator, StreamKind};

/// Frame counters of one stream connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Text frames read
    pub frames_received: u64,
    /// Records handed to the sink
    pub records_forwarded: u64,
    /// Frames that could not be decoded
    pub decode_errors: u64,
    /// Kline updates skipped because the bar was still open
    pub open_bars_skipped: u64,
}

#[derive(Default)]
struct Counters {
    frames_received: AtomicU64,
    records_forwarded: AtomicU64,
    decode_errors: AtomicU64,
    open_bars_skipped: AtomicU64,
}

/// Decodes frames of one stream kind and forwards the records
///
/// Final kline bars go to the sink under the base timeframe and to the
/// aggregator; trades and depth snapshots go straight to the sink.
pub struct FrameHandler {
    kind: StreamKind,
    base_timeframe: Cadence,
    sink: Arc<dyn MarketDataSink>,
    aggregator: Arc<BarAggregator>,
    counters: Counters,
}

impl FrameHandler {
    pub fn new(
        kind: StreamKind,
        base_timeframe: Cadence,
        sink: Arc<dyn MarketDataSink>,
        aggregator: Arc<BarAggregator>,
    ) -> Self {
        Self {
            kind,
            base_timeframe,
            sink,
            aggregator,
            counters: Counters::default(),
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            frames_received: self.counters.frames_received.load(Ordering::Relaxed),
            records_forwarded: self.counters.records_forwarded.load(Ordering::Relaxed),
            decode_errors: self.counters.decode_errors.load(Ordering::Relaxed),
            open_bars_skipped: self.counters.open_bars_skipped.load(Ordering::Relaxed),
        }
    }

    /// Handle one text frame; decode failures are logged and counted
    pub async fn handle_text(&self, text: &str) {
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);

        let (stream, data) = match StreamFrame::parse(text) {
            Ok(StreamFrame::Data { stream, data }) => (stream, data),
            Ok(StreamFrame::Control) => {
                debug!("{} stream control frame: {}", self.kind, text);
                return;
            }
            Err(e) => {
                self.decode_failed(&e.to_string(), text);
                return;
            }
        };

        match self.kind {
            StreamKind::Kline => self.handle_kline(data, text).await,
            StreamKind::Trade => self.handle_trade(data, text).await,
            StreamKind::Depth => self.handle_depth(&stream, data, text).await,
        }
    }

    async fn handle_kline(&self, data: Value, raw: &str) {
        let event: KlineEvent = match serde_json::from_value(data) {
            Ok(event) => event,
            Err(e) => return self.decode_failed(&e.to_string(), raw),
        };

        if !event.kline.is_final {
            self.counters.open_bars_skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let symbol = event.symbol().to_uppercase();
        let bar = event.kline.to_bar();

        match self
            .sink
            .write_bars(&symbol, self.base_timeframe, &[bar])
            .await
        {
            Ok(()) => {
                self.counters.records_forwarded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => error!("Failed to write bar for {}: {}", symbol, e),
        }

        self.aggregator.ingest(&symbol, bar).await;
    }

    async fn handle_trade(&self, data: Value, raw: &str) {
        let event: TradeEvent = match serde_json::from_value(data) {
            Ok(event) => event,
            Err(e) => return self.decode_failed(&e.to_string(), raw),
        };

        let symbol = event.symbol.to_uppercase();
        match self.sink.write_trades(&symbol, &[event.to_trade()]).await {
            Ok(()) => {
                self.counters.records_forwarded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => error!("Failed to write trade for {}: {}", symbol, e),
        }
    }

    async fn handle_depth(&self, stream: &str, data: Value, raw: &str) {
        let payload: DepthPayload = match serde_json::from_value(data) {
            Ok(payload) => payload,
            Err(e) => return self.decode_failed(&e.to_string(), raw),
        };

        let symbol = match payload
            .symbol
            .as_deref()
            .map(str::to_uppercase)
            .or_else(|| symbol_from_stream_name(stream))
        {
            Some(symbol) => symbol,
            None => return self.decode_failed("depth frame without symbol", raw),
        };

        match self.sink.write_depth(&symbol, &payload.to_snapshot()).await {
            Ok(()) => {
                self.counters.records_forwarded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => error!("Failed to write depth for {}: {}", symbol, e),
        }
    }

    fn decode_failed(&self, reason: &str, raw: &str) {
        self.counters.decode_errors.fetch_add(1, Ordering::Relaxed);
        warn!("Failed to decode {} frame: {} ({})", self.kind, reason, raw);
    }
}
