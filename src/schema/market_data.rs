//! Bar, trade and order book records

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar over one cadence
///
/// Times are epoch milliseconds. The usual `low <= open/close <= high`
/// ordering is expected of upstream data but not checked here.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bar {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
    pub quote_volume: f64,
    pub trade_count: i64,
    pub taker_buy_base: f64,
    pub taker_buy_quote: f64,
}

impl Bar {
    /// Open time as a UTC timestamp
    pub fn open_datetime(&self) -> DateTime<Utc> {
        millis_to_datetime(self.open_time)
    }

    /// True for the all-zero row produced from a short wire row
    pub fn is_placeholder(&self) -> bool {
        *self == Bar::default()
    }
}

/// Single executed trade
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub price: f64,
    pub quantity: f64,
    pub quote_quantity: f64,
    pub timestamp_millis: i64,
    pub is_buyer_maker: bool,
}

/// One side of a book level
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub size: f64,
}

/// Top-of-book snapshot, best levels first on both sides
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub last_update_id: i64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Convert epoch milliseconds to a UTC timestamp, clamping out-of-range values to the epoch
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bar_is_placeholder() {
        assert!(Bar::default().is_placeholder());

        let bar = Bar {
            open_time: 1,
            ..Default::default()
        };
        assert!(!bar.is_placeholder());
    }

    #[test]
    fn test_time_range_millis() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let range = TimeRange::new(start, end);

        assert_eq!(range.end_millis() - range.start_millis(), 3_600_000);
        assert!(!range.is_empty());
        assert!(TimeRange::new(end, start).is_empty());
    }

    #[test]
    fn test_millis_to_datetime() {
        let dt = millis_to_datetime(1_700_000_000_123);
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_123);
    }
}
