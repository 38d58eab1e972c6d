//! JSON-lines column store
//!
//! Each bucket is a file `<dir>/<symbol>/<timeframe>/<fieldGroup>.jsonl`
//! holding one JSON object per row.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{ColumnSeries, ColumnStore, SinkResult, TimeBucketKey};

/// Column store writing rows as JSON lines on disk
pub struct JsonLinesStore {
    root: PathBuf,
}

impl JsonLinesStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// File backing `key`
    pub fn path_for(&self, key: &TimeBucketKey) -> PathBuf {
        self.root
            .join(&key.symbol)
            .join(&key.timeframe)
            .join(format!("{}.jsonl", key.field_group))
    }
}

#[async_trait]
impl ColumnStore for JsonLinesStore {
    async fn append(&self, key: &TimeBucketKey, series: ColumnSeries) -> SinkResult<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut buf = Vec::new();
        for row in series.rows() {
            serde_json::to_writer(&mut buf, &row)?;
            buf.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cadence, Trade};

    #[tokio::test]
    async fn test_rows_appended_as_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLinesStore::new(dir.path());
        let key = TimeBucketKey::trade("BTCUSDT");

        let trades = [
            Trade {
                id: 1,
                price: 10.0,
                quantity: 1.0,
                timestamp_millis: 1_000,
                ..Default::default()
            },
            Trade {
                id: 2,
                price: 11.0,
                quantity: 2.0,
                timestamp_millis: 2_500,
                ..Default::default()
            },
        ];
        store
            .append(&key, ColumnSeries::from_trades(&trades[..1]))
            .await
            .unwrap();
        store
            .append(&key, ColumnSeries::from_trades(&trades[1..]))
            .await
            .unwrap();

        let path = store.path_for(&key);
        assert!(path.ends_with("BTCUSDT/1Min/Trade.jsonl"));

        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["Epoch"], 2);
        assert_eq!(lines[1]["Nanosecond"], 500_000_000);
        assert_eq!(lines[1]["Size"], 2.0);
        assert_eq!(lines[0]["Exchange"], "B");
    }

    #[test]
    fn test_path_layout() {
        let store = JsonLinesStore::new("/data");
        let key = TimeBucketKey::ohlcv("ETHUSDT", Cadence::Day1);
        assert_eq!(
            store.path_for(&key),
            PathBuf::from("/data/ETHUSDT/1D/OHLCV.jsonl")
        );
    }
}
