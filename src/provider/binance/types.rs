//! Binance message types
//!
//! Types for deserializing Binance REST responses and stream payloads.
//! REST responses carry most numbers as strings while stream payloads mix
//! strings and native numbers, so every numeric field goes through the
//! lenient decoders below: native number first, then string parse, then zero.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::schema::{Bar, DepthSnapshot, PriceLevel, Trade};
use crate::symbol::SymbolInfo;

/// Number of positional fields a raw kline row must carry
pub const KLINE_ROW_FIELDS: usize = 11;

/// Decode a float from a number or numeric string, zero otherwise
pub fn lenient_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Decode an integer from a number or numeric string, zero otherwise
pub fn lenient_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

/// Decode a flag from a bool or `"true"`/`"false"` string, false otherwise
pub fn lenient_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn de_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(lenient_f64(&Value::deserialize(deserializer)?))
}

fn de_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(lenient_i64(&Value::deserialize(deserializer)?))
}

fn de_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(lenient_bool(&Value::deserialize(deserializer)?))
}

/// Decode one positional kline row; short rows become a zero-valued placeholder
pub fn bar_from_row(row: &[Value]) -> Bar {
    if row.len() < KLINE_ROW_FIELDS {
        return Bar::default();
    }

    Bar {
        open_time: lenient_i64(&row[0]),
        open: lenient_f64(&row[1]),
        high: lenient_f64(&row[2]),
        low: lenient_f64(&row[3]),
        close: lenient_f64(&row[4]),
        volume: lenient_f64(&row[5]),
        close_time: lenient_i64(&row[6]),
        quote_volume: lenient_f64(&row[7]),
        trade_count: lenient_i64(&row[8]),
        taker_buy_base: lenient_f64(&row[9]),
        taker_buy_quote: lenient_f64(&row[10]),
    }
}

/// Decode a `/klines` response body
///
/// Rows that are not arrays are treated like short rows.
pub fn bars_from_rows(rows: &[Value]) -> Vec<Bar> {
    rows.iter()
        .map(|row| match row {
            Value::Array(fields) => bar_from_row(fields),
            _ => Bar::default(),
        })
        .collect()
}

/// Decode `[price, size]` book levels
pub fn levels_from_rows(rows: &[Value]) -> Vec<PriceLevel> {
    rows.iter()
        .map(|row| {
            let fields = row.as_array().map(Vec::as_slice).unwrap_or(&[]);
            PriceLevel {
                price: fields.first().map(lenient_f64).unwrap_or(0.0),
                size: fields.get(1).map(lenient_f64).unwrap_or(0.0),
            }
        })
        .collect()
}

/// Trade object from `/api/v3/trades`
#[derive(Debug, Deserialize, Clone)]
pub struct RestTrade {
    #[serde(default, deserialize_with = "de_i64")]
    pub id: i64,

    #[serde(default, deserialize_with = "de_f64")]
    pub price: f64,

    #[serde(default, deserialize_with = "de_f64")]
    pub qty: f64,

    #[serde(default, rename = "quoteQty", deserialize_with = "de_f64")]
    pub quote_qty: f64,

    #[serde(default, deserialize_with = "de_i64")]
    pub time: i64,

    #[serde(default, rename = "isBuyerMaker", deserialize_with = "de_bool")]
    pub is_buyer_maker: bool,
}

impl From<RestTrade> for Trade {
    fn from(t: RestTrade) -> Self {
        Trade {
            id: t.id,
            price: t.price,
            quantity: t.qty,
            quote_quantity: t.quote_qty,
            timestamp_millis: t.time,
            is_buyer_maker: t.is_buyer_maker,
        }
    }
}

/// Order book payload
///
/// Accepts both the REST / partial-depth field names (`lastUpdateId`,
/// `bids`, `asks`) and the diff-depth names (`u`, `b`, `a`).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DepthPayload {
    #[serde(default, rename = "lastUpdateId", alias = "u", deserialize_with = "de_i64")]
    pub last_update_id: i64,

    #[serde(default, alias = "b")]
    pub bids: Vec<Value>,

    #[serde(default, alias = "a")]
    pub asks: Vec<Value>,

    /// Present on diff-depth events only
    #[serde(default, rename = "s")]
    pub symbol: Option<String>,
}

impl DepthPayload {
    pub fn to_snapshot(&self) -> DepthSnapshot {
        DepthSnapshot {
            last_update_id: self.last_update_id,
            bids: levels_from_rows(&self.bids),
            asks: levels_from_rows(&self.asks),
        }
    }
}

/// `/api/v3/exchangeInfo` response, only the parts we read
#[derive(Debug, Deserialize)]
pub struct ExchangeInfoResponse {
    #[serde(default)]
    pub symbols: Vec<SymbolEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SymbolEntry {
    pub symbol: String,

    #[serde(default)]
    pub status: String,

    #[serde(default, rename = "baseAsset")]
    pub base_asset: String,

    #[serde(default, rename = "quoteAsset")]
    pub quote_asset: String,

    #[serde(default, rename = "isSpotTradingAllowed", deserialize_with = "de_bool")]
    pub is_spot_trading_allowed: bool,

    #[serde(default, rename = "isMarginTradingAllowed", deserialize_with = "de_bool")]
    pub is_margin_trading_allowed: bool,
}

impl From<SymbolEntry> for SymbolInfo {
    fn from(entry: SymbolEntry) -> Self {
        SymbolInfo {
            symbol: entry.symbol,
            status: entry.status,
            base_asset: entry.base_asset,
            quote_asset: entry.quote_asset,
            spot_trading_allowed: entry.is_spot_trading_allowed,
            margin_trading_allowed: entry.is_margin_trading_allowed,
        }
    }
}

/// `/api/v3/time` response
#[derive(Debug, Deserialize)]
pub struct ServerTimeResponse {
    #[serde(default, rename = "serverTime", deserialize_with = "de_i64")]
    pub server_time: i64,
}

/// Kline stream event (`<symbol>@kline_<interval>`)
#[derive(Debug, Deserialize, Clone)]
pub struct KlineEvent {
    #[serde(default, rename = "s")]
    pub symbol: String,

    #[serde(rename = "k")]
    pub kline: KlinePayload,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KlinePayload {
    #[serde(default, rename = "t", deserialize_with = "de_i64")]
    pub open_time: i64,

    #[serde(default, rename = "T", deserialize_with = "de_i64")]
    pub close_time: i64,

    #[serde(default, rename = "s")]
    pub symbol: String,

    #[serde(default, rename = "i")]
    pub interval: String,

    #[serde(default, rename = "o", deserialize_with = "de_f64")]
    pub open: f64,

    #[serde(default, rename = "h", deserialize_with = "de_f64")]
    pub high: f64,

    #[serde(default, rename = "l", deserialize_with = "de_f64")]
    pub low: f64,

    #[serde(default, rename = "c", deserialize_with = "de_f64")]
    pub close: f64,

    #[serde(default, rename = "v", deserialize_with = "de_f64")]
    pub volume: f64,

    #[serde(default, rename = "q", deserialize_with = "de_f64")]
    pub quote_volume: f64,

    #[serde(default, rename = "n", deserialize_with = "de_i64")]
    pub trade_count: i64,

    #[serde(default, rename = "V", deserialize_with = "de_f64")]
    pub taker_buy_base: f64,

    #[serde(default, rename = "Q", deserialize_with = "de_f64")]
    pub taker_buy_quote: f64,

    /// Bar is closed
    #[serde(default, rename = "x", deserialize_with = "de_bool")]
    pub is_final: bool,
}

impl KlineEvent {
    /// Symbol from the event, falling back to the one inside the kline
    pub fn symbol(&self) -> &str {
        if self.symbol.is_empty() {
            &self.kline.symbol
        } else {
            &self.symbol
        }
    }
}

impl KlinePayload {
    pub fn to_bar(&self) -> Bar {
        Bar {
            open_time: self.open_time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            close_time: self.close_time,
            quote_volume: self.quote_volume,
            trade_count: self.trade_count,
            taker_buy_base: self.taker_buy_base,
            taker_buy_quote: self.taker_buy_quote,
        }
    }
}

/// Trade stream event (`<symbol>@trade`)
///
/// The stream does not carry a quote quantity; it decodes to zero.
#[derive(Debug, Deserialize, Clone)]
pub struct TradeEvent {
    #[serde(default, rename = "s")]
    pub symbol: String,

    #[serde(default, rename = "t", deserialize_with = "de_i64")]
    pub trade_id: i64,

    #[serde(default, rename = "p", deserialize_with = "de_f64")]
    pub price: f64,

    #[serde(default, rename = "q", deserialize_with = "de_f64")]
    pub quantity: f64,

    #[serde(default, rename = "T", deserialize_with = "de_i64")]
    pub trade_time: i64,

    #[serde(default, rename = "m", deserialize_with = "de_bool")]
    pub is_buyer_maker: bool,
}

impl TradeEvent {
    pub fn to_trade(&self) -> Trade {
        Trade {
            id: self.trade_id,
            price: self.price,
            quantity: self.quantity,
            quote_quantity: 0.0,
            timestamp_millis: self.trade_time,
            is_buyer_maker: self.is_buyer_maker,
        }
    }
}

/// One frame read from the stream socket
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Combined-stream envelope `{stream, data}`
    Data { stream: String, data: Value },
    /// Reply to a control request, e.g. `{"result":null,"id":1}`
    Control,
}

impl StreamFrame {
    /// Classify a text frame
    ///
    /// A bare payload (single-stream endpoint) is returned as `Data` with an
    /// empty stream name.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;

        match value {
            Value::Object(mut map) => {
                let is_envelope =
                    map.get("stream").is_some_and(Value::is_string) && map.contains_key("data");
                if is_envelope {
                    let stream = map
                        .remove("stream")
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default();
                    let data = map.remove("data").unwrap_or(Value::Null);
                    return Ok(StreamFrame::Data { stream, data });
                }
                if map.contains_key("result") || map.contains_key("id") {
                    return Ok(StreamFrame::Control);
                }
                Ok(StreamFrame::Data {
                    stream: String::new(),
                    data: Value::Object(map),
                })
            }
            other => Ok(StreamFrame::Data {
                stream: String::new(),
                data: other,
            }),
        }
    }
}

/// Upper-cased symbol prefix of a stream name, e.g. `btcusdt@depth20@100ms` -> `BTCUSDT`
pub fn symbol_from_stream_name(stream: &str) -> Option<String> {
    stream
        .split('@')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_and_string_decode_equal() {
        let cases = [
            (json!(42000.5), json!("42000.5")),
            (json!(0.00012), json!("0.00012")),
            (json!(-3.25), json!("-3.25")),
            (json!(7), json!("7")),
        ];

        for (number, string) in cases {
            assert_eq!(lenient_f64(&number), lenient_f64(&string));
        }

        assert_eq!(lenient_i64(&json!(1_700_000_000_000i64)), 1_700_000_000_000);
        assert_eq!(lenient_i64(&json!("1700000000000")), 1_700_000_000_000);
        assert_eq!(lenient_i64(&json!(12.0)), 12);
        assert_eq!(lenient_i64(&json!("12.0")), 12);
    }

    #[test]
    fn test_unparseable_values_default_to_zero() {
        assert_eq!(lenient_f64(&json!("abc")), 0.0);
        assert_eq!(lenient_f64(&json!(null)), 0.0);
        assert_eq!(lenient_f64(&json!([1, 2])), 0.0);
        assert_eq!(lenient_i64(&json!("")), 0);
        assert_eq!(lenient_i64(&json!({"a": 1})), 0);
        assert!(!lenient_bool(&json!("nope")));
        assert!(lenient_bool(&json!("TRUE")));
    }

    #[test]
    fn test_bar_rows_string_and_number_agree() {
        let strings = json!([
            1700000000000i64, "100.5", "110.0", "99.0", "105.25", "12.5",
            1700000059999i64, "1300.75", 42, "6.0", "630.0", "0"
        ]);
        let numbers = json!([
            "1700000000000", 100.5, 110.0, 99.0, 105.25, 12.5,
            "1700000059999", 1300.75, "42", 6.0, 630.0
        ]);

        let a = bars_from_rows(&[strings]);
        let b = bars_from_rows(&[numbers]);

        assert_eq!(a, b);
        assert_eq!(a[0].open_time, 1_700_000_000_000);
        assert_eq!(a[0].close, 105.25);
        assert_eq!(a[0].trade_count, 42);
    }

    #[test]
    fn test_short_row_becomes_placeholder() {
        let rows = vec![
            json!([1700000000000i64, "1", "2", "0.5", "1.5", "10"]),
            json!([
                1700000060000i64, "1", "2", "0.5", "1.5", "10",
                1700000119999i64, "15", 3, "5", "7.5"
            ]),
            json!("not a row"),
        ];

        let bars = bars_from_rows(&rows);

        assert_eq!(bars.len(), 3);
        assert!(bars[0].is_placeholder());
        assert_eq!(bars[1].open_time, 1_700_000_060_000);
        assert!(bars[2].is_placeholder());
    }

    #[test]
    fn test_rest_trade_decode() {
        let trade: RestTrade = serde_json::from_value(json!({
            "id": 28457,
            "price": "4.00000100",
            "qty": "12.00000000",
            "quoteQty": "48.000012",
            "time": 1499865549590i64,
            "isBuyerMaker": true,
            "isBestMatch": true
        }))
        .unwrap();

        let trade = Trade::from(trade);
        assert_eq!(trade.id, 28457);
        assert_eq!(trade.price, 4.000001);
        assert_eq!(trade.quantity, 12.0);
        assert_eq!(trade.quote_quantity, 48.000012);
        assert!(trade.is_buyer_maker);
    }

    #[test]
    fn test_depth_payload_field_variants() {
        let rest: DepthPayload = serde_json::from_value(json!({
            "lastUpdateId": 1027024,
            "bids": [["4.00000000", "431.00000000"]],
            "asks": [["4.00000200", "12.00000000"], ["4.1", "1"]]
        }))
        .unwrap();
        let snapshot = rest.to_snapshot();
        assert_eq!(snapshot.last_update_id, 1027024);
        assert_eq!(snapshot.bids[0], PriceLevel { price: 4.0, size: 431.0 });
        assert_eq!(snapshot.asks.len(), 2);

        let diff: DepthPayload = serde_json::from_value(json!({
            "e": "depthUpdate",
            "s": "BNBBTC",
            "U": 157,
            "u": 160,
            "b": [["0.0024", "10"]],
            "a": [["0.0026", "100"]]
        }))
        .unwrap();
        assert_eq!(diff.symbol.as_deref(), Some("BNBBTC"));
        assert_eq!(diff.to_snapshot().last_update_id, 160);
        assert_eq!(diff.to_snapshot().asks[0].size, 100.0);
    }

    #[test]
    fn test_kline_event_decode() {
        let event: KlineEvent = serde_json::from_value(json!({
            "e": "kline",
            "E": 1672515782136i64,
            "s": "BTCUSDT",
            "k": {
                "t": 1672515780000i64,
                "T": 1672515839999i64,
                "s": "BTCUSDT",
                "i": "1m",
                "f": 100,
                "L": 200,
                "o": "0.0010",
                "c": "0.0020",
                "h": "0.0025",
                "l": "0.0015",
                "v": "1000",
                "n": 100,
                "x": true,
                "q": "1.0000",
                "V": "500",
                "Q": "0.500",
                "B": "123456"
            }
        }))
        .unwrap();

        assert!(event.kline.is_final);
        assert_eq!(event.symbol(), "BTCUSDT");

        let bar = event.kline.to_bar();
        assert_eq!(bar.open_time, 1672515780000);
        assert_eq!(bar.close_time, 1672515839999);
        assert_eq!(bar.high, 0.0025);
        assert_eq!(bar.low, 0.0015);
        assert_eq!(bar.volume, 1000.0);
        assert_eq!(bar.trade_count, 100);
        assert_eq!(bar.taker_buy_quote, 0.5);
    }

    #[test]
    fn test_trade_event_decode() {
        let event: TradeEvent = serde_json::from_value(json!({
            "e": "trade",
            "E": 1672515782136i64,
            "s": "BNBBTC",
            "t": 12345,
            "p": "0.001",
            "q": "100",
            "T": 1672515782136i64,
            "m": true,
            "M": true
        }))
        .unwrap();

        let trade = event.to_trade();
        assert_eq!(trade.id, 12345);
        assert_eq!(trade.price, 0.001);
        assert_eq!(trade.quote_quantity, 0.0);
        assert!(trade.is_buyer_maker);
    }

    #[test]
    fn test_stream_frame_classification() {
        let frame = StreamFrame::parse(r#"{"stream":"btcusdt@trade","data":{"p":"1"}}"#).unwrap();
        assert_eq!(
            frame,
            StreamFrame::Data {
                stream: "btcusdt@trade".to_string(),
                data: json!({"p": "1"})
            }
        );

        let control = StreamFrame::parse(r#"{"result":null,"id":1}"#).unwrap();
        assert_eq!(control, StreamFrame::Control);

        let bare = StreamFrame::parse(r#"{"e":"trade","s":"BTCUSDT"}"#).unwrap();
        assert!(matches!(bare, StreamFrame::Data { ref stream, .. } if stream.is_empty()));

        assert!(StreamFrame::parse("not json").is_err());
    }

    #[test]
    fn test_symbol_from_stream_name() {
        assert_eq!(
            symbol_from_stream_name("btcusdt@depth20@100ms").as_deref(),
            Some("BTCUSDT")
        );
        assert_eq!(symbol_from_stream_name(""), None);
    }
}
