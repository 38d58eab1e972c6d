//! Bounded-concurrency historical backfill

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{BackfillSettings, ConfigError};
use crate::provider::binance::endpoints::MAX_ROWS_PER_REQUEST;
use crate::provider::ExchangeApi;
use crate::schema::{Cadence, TimeRange};
use crate::storage::MarketDataSink;
use crate::symbol::SymbolUniverse;

use super::{plan_windows, BackfillReport, SymbolOutcome};

/// What to backfill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillJob {
    pub range: TimeRange,
    pub cadence: Cadence,
    /// Cadence periods per REST call, at most the exchange row limit
    pub batch_size: u32,
}

impl BackfillJob {
    /// `batch_size` is clamped to `1..=MAX_ROWS_PER_REQUEST`
    pub fn new(range: TimeRange, cadence: Cadence, batch_size: u32) -> Self {
        Self {
            range,
            cadence,
            batch_size: batch_size.clamp(1, MAX_ROWS_PER_REQUEST),
        }
    }

    /// Job described by validated backfill settings
    pub fn from_settings(settings: &BackfillSettings) -> Result<Self, ConfigError> {
        Ok(Self::new(
            settings.time_range()?,
            settings.interval,
            settings.batch_size,
        ))
    }
}

impl fmt::Display for BackfillJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}, interval {}, batch size {}",
            self.range.start.to_rfc3339(),
            self.range.end.to_rfc3339(),
            self.cadence,
            self.batch_size
        )
    }
}

/// Walks a time range for every symbol of the working set
///
/// At most `parallelism` symbols are processed at once. Within one symbol
/// windows are fetched and written strictly in time order.
pub struct BackfillScheduler {
    universe: Arc<SymbolUniverse>,
    worker: SymbolWorker,
    parallelism: usize,
}

impl BackfillScheduler {
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        universe: Arc<SymbolUniverse>,
        sink: Arc<dyn MarketDataSink>,
        parallelism: usize,
        inter_batch_delay: Duration,
    ) -> Self {
        Self {
            universe,
            worker: SymbolWorker {
                exchange,
                sink,
                inter_batch_delay,
            },
            parallelism: parallelism.max(1),
        }
    }

    /// Scheduler built from backfill settings
    pub fn from_settings(
        exchange: Arc<dyn ExchangeApi>,
        universe: Arc<SymbolUniverse>,
        sink: Arc<dyn MarketDataSink>,
        settings: &BackfillSettings,
    ) -> Self {
        Self::new(
            exchange,
            universe,
            sink,
            settings.parallelism,
            Duration::from_millis(settings.inter_batch_delay_ms),
        )
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// One-line summary of a job as this scheduler would run it
    pub fn describe(&self, job: &BackfillJob) -> String {
        format!("{}, parallelism {}", job, self.parallelism)
    }

    /// Backfill every symbol of the working set
    ///
    /// Returns after every launched symbol task has finished. Cancellation
    /// stops launching new symbols and ends running ones at their next
    /// window boundary.
    pub async fn run(&self, job: &BackfillJob, cancel: &CancellationToken) -> BackfillReport {
        let mut report = BackfillReport::default();

        self.universe.resolve().await;
        let symbols = self.universe.working_set();
        if symbols.is_empty() {
            warn!("No symbols to backfill");
            return report;
        }

        info!(
            "Starting backfill of {} symbols: {}",
            symbols.len(),
            self.describe(job)
        );

        let permits = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks = JoinSet::new();

        for symbol in symbols {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Backfill cancelled, not launching remaining symbols");
                    report.cancelled = true;
                    break;
                }
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!("Backfill worker pool closed: {}", e);
                        break;
                    }
                },
            };

            let worker = self.worker.clone();
            let job = *job;
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = worker.run(&symbol, &job, &cancel).await;
                (symbol, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((symbol, outcome)) => {
                    debug!("Backfill of {} finished: {:?}", symbol, outcome);
                    report.record(outcome);
                }
                Err(e) => error!("Backfill task failed: {}", e),
            }
        }

        info!(
            "Backfill {}: {} symbols, {} windows fetched, {} failed, {} bars written",
            if report.cancelled { "cancelled" } else { "completed" },
            report.symbols_processed,
            report.windows_fetched,
            report.windows_failed,
            report.bars_written
        );

        report
    }
}

#[derive(Clone)]
struct SymbolWorker {
    exchange: Arc<dyn ExchangeApi>,
    sink: Arc<dyn MarketDataSink>,
    inter_batch_delay: Duration,
}

impl SymbolWorker {
    async fn run(&self, symbol: &str, job: &BackfillJob, cancel: &CancellationToken) -> SymbolOutcome {
        let mut outcome = SymbolOutcome::default();
        let mut windows = plan_windows(symbol, job.range, job.cadence, job.batch_size).peekable();

        while let Some(window) = windows.next() {
            if cancel.is_cancelled() {
                info!("Backfill of {} cancelled", symbol);
                outcome.cancelled = true;
                return outcome;
            }

            // The window bounds the rows; a window of calendar months can
            // hold more opens than batch_size
            match self
                .exchange
                .fetch_bars(
                    &window.symbol,
                    window.cadence,
                    window.start_time,
                    window.end_time,
                    MAX_ROWS_PER_REQUEST,
                )
                .await
            {
                Ok(bars) if bars.is_empty() => {
                    outcome.windows_fetched += 1;
                    debug!("No bars for {}", window);
                }
                Ok(bars) => {
                    outcome.windows_fetched += 1;
                    match self.sink.write_bars(symbol, job.cadence, &bars).await {
                        Ok(()) => {
                            outcome.bars_written += bars.len() as u64;
                            info!("Wrote {} bars for {}", bars.len(), window);
                        }
                        Err(e) => {
                            outcome.write_failures += 1;
                            error!("Failed to write bars for {}: {}", window, e);
                        }
                    }
                }
                Err(e) => {
                    outcome.windows_failed += 1;
                    error!("Failed to fetch bars for {}: {}", window, e);
                }
            }

            if windows.peek().is_some() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Backfill of {} cancelled", symbol);
                        outcome.cancelled = true;
                        return outcome;
                    }
                    _ = sleep(self.inter_batch_delay) => {}
                }
            }
        }

        outcome
    }
}
