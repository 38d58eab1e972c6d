//! Backfill window planning

use std::fmt;

use crate::schema::{millis_to_datetime, Cadence, TimeRange};

/// Time range fetched by one REST call, half-open `[start_time, end_time)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchWindow {
    pub symbol: String,
    pub start_time: i64,
    pub end_time: i64,
    pub cadence: Cadence,
}

impl fmt::Display for BatchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{} - {})",
            self.symbol,
            self.cadence,
            millis_to_datetime(self.start_time).format("%Y-%m-%d %H:%M"),
            millis_to_datetime(self.end_time).format("%Y-%m-%d %H:%M")
        )
    }
}

/// Iterator over the windows covering a range for one symbol
///
/// Each window spans `batch_size` cadence periods, the last one clipped to
/// the range end. Windows come out in increasing time order.
#[derive(Debug, Clone)]
pub struct WindowPlan {
    symbol: String,
    cadence: Cadence,
    step_millis: i64,
    current: i64,
    end: i64,
}

impl Iterator for WindowPlan {
    type Item = BatchWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.end {
            return None;
        }

        let start_time = self.current;
        let end_time = start_time.saturating_add(self.step_millis).min(self.end);
        self.current = end_time;

        Some(BatchWindow {
            symbol: self.symbol.clone(),
            start_time,
            end_time,
            cadence: self.cadence,
        })
    }
}

/// Plan the windows for one symbol
pub fn plan_windows(symbol: &str, range: TimeRange, cadence: Cadence, batch_size: u32) -> WindowPlan {
    WindowPlan {
        symbol: symbol.to_string(),
        cadence,
        step_millis: cadence
            .duration_millis()
            .saturating_mul(i64::from(batch_size.max(1))),
        current: range.start_millis(),
        end: range.end_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn range(start_min: i64, end_min: i64) -> TimeRange {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TimeRange::new(
            base + chrono::Duration::minutes(start_min),
            base + chrono::Duration::minutes(end_min),
        )
    }

    #[test]
    fn test_windows_split_in_order() {
        let r = range(0, 30);
        let windows: Vec<_> = plan_windows("BTCUSDT", r, Cadence::Minute1, 10).collect();

        let t0 = r.start_millis();
        let minute = 60_000;
        assert_eq!(windows.len(), 3);
        assert_eq!(
            windows
                .iter()
                .map(|w| (w.start_time, w.end_time))
                .collect::<Vec<_>>(),
            vec![
                (t0, t0 + 10 * minute),
                (t0 + 10 * minute, t0 + 20 * minute),
                (t0 + 20 * minute, t0 + 30 * minute),
            ]
        );
    }

    #[test]
    fn test_last_window_clipped_to_range_end() {
        let r = range(0, 25);
        let windows: Vec<_> = plan_windows("BTCUSDT", r, Cadence::Minute5, 2).collect();

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2].end_time, r.end_millis());
        assert_eq!(windows[2].end_time - windows[2].start_time, 5 * 60_000);
    }

    #[test]
    fn test_empty_range_has_no_windows() {
        assert_eq!(plan_windows("BTCUSDT", range(10, 10), Cadence::Minute1, 1000).count(), 0);
    }

    #[test]
    fn test_huge_batch_size_saturates() {
        let r = TimeRange::new(
            Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        );
        let windows: Vec<_> = plan_windows("BTCUSDT", r, Cadence::Month1, u32::MAX).collect();

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_time, r.start_millis());
        assert_eq!(windows[0].end_time, r.end_millis());
    }

    #[test]
    fn test_window_display() {
        let window = plan_windows("ETHUSDT", range(0, 60), Cadence::Hour1, 1)
            .next()
            .unwrap();
        assert_eq!(window.to_string(), "ETHUSDT 1h [2024-01-01 00:00 - 2024-01-01 01:00)");
    }
}
