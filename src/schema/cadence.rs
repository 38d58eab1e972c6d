//! Exchange cadence codes and their canonical timeframe labels

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned for a cadence code outside the supported set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported cadence '{0}'")]
pub struct CadenceParseError(pub String);

/// Native bar interval of the exchange
///
/// Codes are case sensitive: `1m` is one minute, `1M` is one month.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Cadence {
    #[default]
    Minute1,
    Minute3,
    Minute5,
    Minute15,
    Minute30,
    Hour1,
    Hour2,
    Hour4,
    Hour6,
    Hour8,
    Hour12,
    Day1,
    Day3,
    Week1,
    Month1,
}

impl Cadence {
    pub const ALL: [Cadence; 15] = [
        Cadence::Minute1,
        Cadence::Minute3,
        Cadence::Minute5,
        Cadence::Minute15,
        Cadence::Minute30,
        Cadence::Hour1,
        Cadence::Hour2,
        Cadence::Hour4,
        Cadence::Hour6,
        Cadence::Hour8,
        Cadence::Hour12,
        Cadence::Day1,
        Cadence::Day3,
        Cadence::Week1,
        Cadence::Month1,
    ];

    /// Exchange-native code (`interval` query parameter, `kline_<code>` stream suffix)
    pub fn code(&self) -> &'static str {
        match self {
            Cadence::Minute1 => "1m",
            Cadence::Minute3 => "3m",
            Cadence::Minute5 => "5m",
            Cadence::Minute15 => "15m",
            Cadence::Minute30 => "30m",
            Cadence::Hour1 => "1h",
            Cadence::Hour2 => "2h",
            Cadence::Hour4 => "4h",
            Cadence::Hour6 => "6h",
            Cadence::Hour8 => "8h",
            Cadence::Hour12 => "12h",
            Cadence::Day1 => "1d",
            Cadence::Day3 => "3d",
            Cadence::Week1 => "1w",
            Cadence::Month1 => "1M",
        }
    }

    /// Canonical timeframe label used in storage keys
    pub fn timeframe_label(&self) -> &'static str {
        match self {
            Cadence::Minute1 => "1Min",
            Cadence::Minute3 => "3Min",
            Cadence::Minute5 => "5Min",
            Cadence::Minute15 => "15Min",
            Cadence::Minute30 => "30Min",
            Cadence::Hour1 => "1H",
            Cadence::Hour2 => "2H",
            Cadence::Hour4 => "4H",
            Cadence::Hour6 => "6H",
            Cadence::Hour8 => "8H",
            Cadence::Hour12 => "12H",
            Cadence::Day1 => "1D",
            Cadence::Day3 => "3D",
            Cadence::Week1 => "1W",
            Cadence::Month1 => "1M",
        }
    }

    /// Nominal length of one bar; a month counts as 30 days
    pub fn duration(&self) -> Duration {
        match self {
            Cadence::Minute1 => Duration::minutes(1),
            Cadence::Minute3 => Duration::minutes(3),
            Cadence::Minute5 => Duration::minutes(5),
            Cadence::Minute15 => Duration::minutes(15),
            Cadence::Minute30 => Duration::minutes(30),
            Cadence::Hour1 => Duration::hours(1),
            Cadence::Hour2 => Duration::hours(2),
            Cadence::Hour4 => Duration::hours(4),
            Cadence::Hour6 => Duration::hours(6),
            Cadence::Hour8 => Duration::hours(8),
            Cadence::Hour12 => Duration::hours(12),
            Cadence::Day1 => Duration::days(1),
            Cadence::Day3 => Duration::days(3),
            Cadence::Week1 => Duration::weeks(1),
            Cadence::Month1 => Duration::days(30),
        }
    }

    pub fn duration_millis(&self) -> i64 {
        self.duration().num_milliseconds()
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Cadence {
    type Err = CadenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Cadence::ALL
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or_else(|| CadenceParseError(s.to_string()))
    }
}

impl TryFrom<String> for Cadence {
    type Error = CadenceParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Cadence> for String {
    fn from(cadence: Cadence) -> Self {
        cadence.code().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_labels() {
        let expected = [
            ("1m", "1Min"),
            ("3m", "3Min"),
            ("5m", "5Min"),
            ("15m", "15Min"),
            ("30m", "30Min"),
            ("1h", "1H"),
            ("2h", "2H"),
            ("4h", "4H"),
            ("6h", "6H"),
            ("8h", "8H"),
            ("12h", "12H"),
            ("1d", "1D"),
            ("3d", "3D"),
            ("1w", "1W"),
            ("1M", "1M"),
        ];

        for (code, label) in expected {
            let cadence: Cadence = code.parse().unwrap();
            assert_eq!(cadence.code(), code);
            assert_eq!(cadence.timeframe_label(), label);
        }
    }

    #[test]
    fn test_minute_and_month_are_distinct() {
        assert_eq!("1m".parse::<Cadence>().unwrap(), Cadence::Minute1);
        assert_eq!("1M".parse::<Cadence>().unwrap(), Cadence::Month1);
    }

    #[test]
    fn test_unmapped_cadence_rejected() {
        assert_eq!(
            "2m".parse::<Cadence>(),
            Err(CadenceParseError("2m".to_string()))
        );
        assert!("".parse::<Cadence>().is_err());
        assert!("1Min".parse::<Cadence>().is_err());
    }

    #[test]
    fn test_durations() {
        assert_eq!(Cadence::Minute1.duration_millis(), 60_000);
        assert_eq!(Cadence::Hour4.duration_millis(), 4 * 3_600_000);
        assert_eq!(Cadence::Week1.duration(), Duration::days(7));
        assert_eq!(Cadence::Month1.duration(), Duration::days(30));
    }

    #[test]
    fn test_serde_uses_exchange_code() {
        let json = serde_json::to_string(&Cadence::Hour1).unwrap();
        assert_eq!(json, "\"1h\"");

        let parsed: Cadence = serde_json::from_str("\"15m\"").unwrap();
        assert_eq!(parsed, Cadence::Minute15);

        assert!(serde_json::from_str::<Cadence>("\"7m\"").is_err());
    }
}
