//! Historical backfill
//!
//! Each symbol of the working set is walked over the configured range in
//! fixed-size windows, one REST call per window. A failed window is logged
//! and skipped; it never stops the symbol or its peers.

mod scheduler;
mod window;

pub use scheduler::{BackfillJob, BackfillScheduler};
pub use window::{plan_windows, BatchWindow, WindowPlan};

/// Totals of one backfill run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Symbols whose task ran, to completion or cancellation
    pub symbols_processed: usize,
    pub windows_fetched: u64,
    pub windows_failed: u64,
    pub bars_written: u64,
    pub write_failures: u64,
    /// Whether the run stopped early on cancellation
    pub cancelled: bool,
}

impl BackfillReport {
    fn record(&mut self, outcome: SymbolOutcome) {
        self.symbols_processed += 1;
        self.windows_fetched += outcome.windows_fetched;
        self.windows_failed += outcome.windows_failed;
        self.bars_written += outcome.bars_written;
        self.write_failures += outcome.write_failures;
        self.cancelled |= outcome.cancelled;
    }
}

#[derive(Debug, Default)]
struct SymbolOutcome {
    windows_fetched: u64,
    windows_failed: u64,
    bars_written: u64,
    write_failures: u64,
    cancelled: bool,
}
