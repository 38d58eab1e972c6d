//! Feeder orchestration
//!
//! Runs backfill and realtime ingestion side by side under one cancellation
//! token and waits for both to drain.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::backfill::{BackfillJob, BackfillReport, BackfillScheduler};
use crate::config::Settings;
use crate::provider::binance::BinanceClient;
use crate::provider::{ExchangeApi, ProviderResult};
use crate::realtime::{StreamKind, StreamManager, StreamManagerConfig, StreamStats};
use crate::storage::{open_sink, MarketDataSink};
use crate::symbol::SymbolUniverse;

/// Outcome of one feeder run
#[derive(Debug, Default)]
pub struct FeederSummary {
    /// Present when backfill ran
    pub backfill: Option<BackfillReport>,
    /// Frame counters of every realtime stream that ran
    pub realtime: Vec<(StreamKind, StreamStats)>,
}

/// Owns the shared collaborators of both ingestion paths
pub struct Feeder {
    settings: Settings,
    exchange: Arc<dyn ExchangeApi>,
    universe: Arc<SymbolUniverse>,
    sink: Arc<dyn MarketDataSink>,
    cancel: CancellationToken,
}

impl Feeder {
    pub fn new(
        settings: Settings,
        exchange: Arc<dyn ExchangeApi>,
        sink: Arc<dyn MarketDataSink>,
    ) -> Self {
        let universe = Arc::new(SymbolUniverse::new(
            exchange.clone(),
            &settings.symbols.include,
            &settings.symbols.exclude,
        ));

        Self {
            settings,
            exchange,
            universe,
            sink,
            cancel: CancellationToken::new(),
        }
    }

    /// Feeder talking to the configured exchange and storage backend
    pub fn from_settings(settings: Settings) -> ProviderResult<Self> {
        let exchange: Arc<dyn ExchangeApi> =
            Arc::new(BinanceClient::from_settings(&settings.exchange)?);
        let sink = open_sink(&settings.storage);
        Ok(Self::new(settings, exchange, sink))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn universe(&self) -> &Arc<SymbolUniverse> {
        &self.universe
    }

    /// Token shared by every ingestion task; cancel it to stop the run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.cancel.cancel();
    }

    /// Run the enabled ingestion paths until they finish or are cancelled
    pub async fn run(&self) -> FeederSummary {
        let backfill_enabled = self.settings.backfill.enabled;
        let realtime_enabled = self.settings.realtime.enabled;

        if !backfill_enabled && !realtime_enabled {
            warn!("Neither backfill nor realtime is enabled, nothing to do");
            return FeederSummary::default();
        }

        self.universe.resolve().await;
        info!(
            "Feeder starting with {} symbols (backfill: {}, realtime: {})",
            self.universe.symbol_count(),
            backfill_enabled,
            realtime_enabled
        );

        let backfill = async {
            if backfill_enabled {
                self.run_backfill().await
            } else {
                None
            }
        };
        let realtime = async {
            if realtime_enabled {
                self.run_realtime().await
            } else {
                Vec::new()
            }
        };

        let (backfill, realtime) = tokio::join!(backfill, realtime);
        info!("Feeder stopped");

        FeederSummary { backfill, realtime }
    }

    async fn run_backfill(&self) -> Option<BackfillReport> {
        let job = match BackfillJob::from_settings(&self.settings.backfill) {
            Ok(job) => job,
            Err(e) => {
                error!("Invalid backfill configuration: {}", e);
                return None;
            }
        };

        let scheduler = BackfillScheduler::from_settings(
            self.exchange.clone(),
            self.universe.clone(),
            self.sink.clone(),
            &self.settings.backfill,
        );
        Some(scheduler.run(&job, &self.cancel).await)
    }

    async fn run_realtime(&self) -> Vec<(StreamKind, StreamStats)> {
        let manager = StreamManager::new(
            self.exchange.stream_base_url(),
            self.sink.clone(),
            StreamManagerConfig::from_settings(&self.settings),
        );
        let symbols = self.universe.working_set();
        manager
            .run(&symbols, &self.settings.realtime.stream_types, &self.cancel)
            .await
    }
}
