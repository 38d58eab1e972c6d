//! WebSocket connection lifecycle for realtime streams

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::schema::Cadence;
use crate::storage::MarketDataSink;

use super::{build_stream_url, BarAggregator, FrameHandler, StreamKind, StreamStats};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = Arc<Mutex<SplitSink<WsStream, Message>>>;

const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Stream manager configuration
#[derive(Debug, Clone)]
pub struct StreamManagerConfig {
    /// Timeframe final kline bars are written under
    pub base_timeframe: Cadence,
    /// Kline interval subscribed and cadence of reduced bars
    pub update_frequency: Cadence,
    /// Final bars buffered per symbol before one reduced bar is emitted
    pub buffer_size: usize,
    /// Interval between ping frames
    pub keepalive_interval: Duration,
}

impl Default for StreamManagerConfig {
    fn default() -> Self {
        Self {
            base_timeframe: Cadence::Minute1,
            update_frequency: Cadence::Minute1,
            buffer_size: 1000,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

impl StreamManagerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base_timeframe: settings.timeframe,
            update_frequency: settings.realtime.update_frequency,
            buffer_size: settings.realtime.buffer_size,
            keepalive_interval: Duration::from_secs(settings.realtime.keepalive_interval_secs),
        }
    }
}

/// Runs one combined stream connection per stream kind
///
/// A failed dial or a dropped connection ends that stream only; the other
/// kinds keep running until cancelled.
#[derive(Clone)]
pub struct StreamManager {
    stream_base_url: String,
    sink: Arc<dyn MarketDataSink>,
    aggregator: Arc<BarAggregator>,
    config: StreamManagerConfig,
}

impl StreamManager {
    pub fn new(
        stream_base_url: impl Into<String>,
        sink: Arc<dyn MarketDataSink>,
        config: StreamManagerConfig,
    ) -> Self {
        let aggregator = Arc::new(BarAggregator::new(
            config.update_frequency,
            config.buffer_size,
            sink.clone(),
        ));

        Self {
            stream_base_url: stream_base_url.into(),
            sink,
            aggregator,
            config,
        }
    }

    pub fn config(&self) -> &StreamManagerConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &Arc<BarAggregator> {
        &self.aggregator
    }

    /// Run every requested stream kind until cancelled or disconnected
    ///
    /// Returns the frame counters of each stream. Buffered partial bars are
    /// flushed once all streams have stopped.
    pub async fn run(
        &self,
        symbols: &[String],
        kinds: &[StreamKind],
        cancel: &CancellationToken,
    ) -> Vec<(StreamKind, StreamStats)> {
        if symbols.is_empty() {
            warn!("No symbols to stream, realtime ingestion skipped");
            return Vec::new();
        }

        info!(
            "Starting realtime ingestion: {} symbols, streams {:?}, update frequency {}",
            symbols.len(),
            kinds,
            self.config.update_frequency
        );

        let mut tasks = JoinSet::new();
        for &kind in kinds {
            let manager = self.clone();
            let symbols = symbols.to_vec();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let stats = manager.run_stream(kind, &symbols, &cancel).await;
                (kind, stats)
            });
        }

        let mut results = Vec::with_capacity(kinds.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!("Stream task failed: {}", e),
            }
        }

        self.aggregator.log_status().await;
        self.aggregator.flush_all().await;
        info!("Realtime ingestion stopped");

        results
    }

    /// Run a single stream kind over one connection
    pub async fn run_stream(
        &self,
        kind: StreamKind,
        symbols: &[String],
        cancel: &CancellationToken,
    ) -> StreamStats {
        let url = match build_stream_url(
            &self.stream_base_url,
            kind,
            symbols,
            self.config.update_frequency,
        ) {
            Ok(url) => url,
            Err(e) => {
                error!("Cannot build {} stream URL: {}", kind, e);
                return StreamStats::default();
            }
        };

        info!("Connecting {} stream for {} symbols", kind, symbols.len());
        debug!("Stream URL: {}", url);

        let ws_stream = tokio::select! {
            _ = cancel.cancelled() => return StreamStats::default(),
            result = connect_async(url.as_str()) => match result {
                Ok((ws_stream, _)) => ws_stream,
                Err(e) => {
                    error!("Failed to connect {} stream: {}", kind, e);
                    return StreamStats::default();
                }
            },
        };
        info!("{} stream connected", kind);

        let (write, read) = ws_stream.split();
        let writer: WsWriter = Arc::new(Mutex::new(write));
        let handler = Arc::new(FrameHandler::new(
            kind,
            self.config.base_timeframe,
            self.sink.clone(),
            self.aggregator.clone(),
        ));

        let reader_cancel = cancel.child_token();
        let mut reader = tokio::spawn(read_frames(
            read,
            writer.clone(),
            handler.clone(),
            reader_cancel.clone(),
        ));

        let mut reader_finished = false;
        loop {
            if cancel.is_cancelled() {
                break;
            }

            if let Err(e) = writer.lock().await.send(Message::Ping(Vec::new())).await {
                warn!("Keepalive ping failed on {} stream: {}", kind, e);
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = &mut reader => {
                    reader_finished = true;
                    break;
                }
                _ = sleep(self.config.keepalive_interval) => {}
            }
        }

        if let Err(e) = writer.lock().await.close().await {
            debug!("Closing {} stream: {}", kind, e);
        }
        reader_cancel.cancel();
        if !reader_finished {
            if let Err(e) = reader.await {
                error!("{} stream reader failed: {}", kind, e);
            }
        }

        let stats = handler.stats();
        info!(
            "{} stream closed: {} frames, {} records, {} decode errors",
            kind, stats.frames_received, stats.records_forwarded, stats.decode_errors
        );
        stats
    }
}

async fn read_frames(
    mut read: SplitStream<WsStream>,
    writer: WsWriter,
    handler: Arc<FrameHandler>,
    cancel: CancellationToken,
) {
    let kind = handler.kind();

    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = read.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => handler.handle_text(&text).await,
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => handler.handle_text(text).await,
                Err(_) => debug!("Ignoring non-UTF-8 binary frame on {} stream", kind),
            },
            Some(Ok(Message::Ping(payload))) => {
                if let Err(e) = writer.lock().await.send(Message::Pong(payload)).await {
                    warn!("Failed to send pong on {} stream: {}", kind, e);
                    break;
                }
            }
            Some(Ok(Message::Pong(_))) => debug!("{} stream pong", kind),
            Some(Ok(Message::Close(frame))) => {
                info!("{} stream closed by server: {:?}", kind, frame);
                break;
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(e)) => {
                error!("Read error on {} stream: {}", kind, e);
                break;
            }
            None => {
                info!("{} stream ended", kind);
                break;
            }
        }
    }
}
