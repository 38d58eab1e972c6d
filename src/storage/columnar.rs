//! Column batches and the record-to-column writer

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, info};

use crate::schema::{Bar, Cadence, DepthSnapshot, Trade};

use super::{MarketDataSink, SinkResult};

/// Field group of bar batches
pub const FIELD_GROUP_OHLCV: &str = "OHLCV";

/// Field group of trade batches
pub const FIELD_GROUP_TRADE: &str = "Trade";

/// Exchange code written on every trade row
pub const TRADE_EXCHANGE_CODE: &str = "B";

/// Tape code written on every trade row (spot)
pub const TRADE_TAPE_CODE: &str = "A";

/// Timeframe trades are filed under
pub const TRADE_CADENCE: Cadence = Cadence::Minute1;

/// Storage address `symbol/timeframe/fieldGroup`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeBucketKey {
    pub symbol: String,
    pub timeframe: String,
    pub field_group: String,
}

impl TimeBucketKey {
    pub fn new(symbol: &str, cadence: Cadence, field_group: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe: cadence.timeframe_label().to_string(),
            field_group: field_group.to_string(),
        }
    }

    pub fn ohlcv(symbol: &str, cadence: Cadence) -> Self {
        Self::new(symbol, cadence, FIELD_GROUP_OHLCV)
    }

    pub fn trade(symbol: &str) -> Self {
        Self::new(symbol, TRADE_CADENCE, FIELD_GROUP_TRADE)
    }
}

impl fmt::Display for TimeBucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.symbol, self.timeframe, self.field_group)
    }
}

/// Typed values of one column
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnData {
    Int64(Vec<i64>),
    Int32(Vec<i32>),
    Float64(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn value_at(&self, row: usize) -> Value {
        match self {
            ColumnData::Int64(v) => v.get(row).map(|x| Value::from(*x)),
            ColumnData::Int32(v) => v.get(row).map(|x| Value::from(*x)),
            ColumnData::Float64(v) => v.get(row).map(|x| Value::from(*x)),
            ColumnData::Text(v) => v.get(row).map(|x| Value::from(x.as_str())),
        }
        .unwrap_or(Value::Null)
    }
}

/// Named column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// Ordered set of equally long columns
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnSeries {
    columns: Vec<Column>,
}

impl ColumnSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: &str, data: ColumnData) -> Self {
        self.columns.push(Column {
            name: name.to_string(),
            data,
        });
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.data)
    }

    /// Row count, taken from the first column
    pub fn len(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows as JSON objects keyed by column name
    pub fn rows(&self) -> Vec<Map<String, Value>> {
        (0..self.len())
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), c.data.value_at(row)))
                    .collect()
            })
            .collect()
    }

    /// OHLCV columns; Epoch is the open time in seconds
    pub fn from_bars(bars: &[Bar]) -> Self {
        Self::new()
            .with_column(
                "Epoch",
                ColumnData::Int64(bars.iter().map(|b| b.open_time / 1000).collect()),
            )
            .with_column("Open", ColumnData::Float64(bars.iter().map(|b| b.open).collect()))
            .with_column("High", ColumnData::Float64(bars.iter().map(|b| b.high).collect()))
            .with_column("Low", ColumnData::Float64(bars.iter().map(|b| b.low).collect()))
            .with_column("Close", ColumnData::Float64(bars.iter().map(|b| b.close).collect()))
            .with_column(
                "Volume",
                ColumnData::Float64(bars.iter().map(|b| b.volume).collect()),
            )
    }

    /// Trade columns; Epoch in seconds plus the sub-second remainder in nanoseconds
    pub fn from_trades(trades: &[Trade]) -> Self {
        let n = trades.len();
        Self::new()
            .with_column(
                "Epoch",
                ColumnData::Int64(
                    trades
                        .iter()
                        .map(|t| t.timestamp_millis.div_euclid(1000))
                        .collect(),
                ),
            )
            .with_column(
                "Nanosecond",
                ColumnData::Int32(
                    trades
                        .iter()
                        .map(|t| (t.timestamp_millis.rem_euclid(1000) * 1_000_000) as i32)
                        .collect(),
                ),
            )
            .with_column(
                "Price",
                ColumnData::Float64(trades.iter().map(|t| t.price).collect()),
            )
            .with_column(
                "Size",
                ColumnData::Float64(trades.iter().map(|t| t.quantity).collect()),
            )
            .with_column(
                "Exchange",
                ColumnData::Text(vec![TRADE_EXCHANGE_CODE.to_string(); n]),
            )
            .with_column("Tape", ColumnData::Text(vec![TRADE_TAPE_CODE.to_string(); n]))
    }
}

/// Append-only column storage addressed by bucket key
#[async_trait]
pub trait ColumnStore: Send + Sync {
    async fn append(&self, key: &TimeBucketKey, series: ColumnSeries) -> SinkResult<()>;
}

/// Sink converting records into column batches
pub struct ColumnarWriter<S> {
    store: S,
}

impl<S: ColumnStore> ColumnarWriter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: ColumnStore> MarketDataSink for ColumnarWriter<S> {
    async fn write_bars(&self, symbol: &str, cadence: Cadence, bars: &[Bar]) -> SinkResult<()> {
        if bars.is_empty() {
            return Ok(());
        }

        let key = TimeBucketKey::ohlcv(symbol, cadence);
        self.store.append(&key, ColumnSeries::from_bars(bars)).await?;

        debug!("Wrote {} bars to {}", bars.len(), key);
        Ok(())
    }

    async fn write_trades(&self, symbol: &str, trades: &[Trade]) -> SinkResult<()> {
        if trades.is_empty() {
            return Ok(());
        }

        let key = TimeBucketKey::trade(symbol);
        self.store
            .append(&key, ColumnSeries::from_trades(trades))
            .await?;

        debug!("Wrote {} trades to {}", trades.len(), key);
        Ok(())
    }

    async fn write_depth(&self, symbol: &str, depth: &DepthSnapshot) -> SinkResult<()> {
        // No depth layout in the store yet
        info!(
            "Received depth for {}: {} bids, {} asks",
            symbol,
            depth.bids.len(),
            depth.asks.len()
        );
        Ok(())
    }
}
