//! In-process column store

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use super::{ColumnSeries, ColumnStore, SinkResult, TimeBucketKey};

/// Column store kept in memory, one batch list per bucket
#[derive(Default)]
pub struct MemoryColumnStore {
    buckets: DashMap<TimeBucketKey, Vec<ColumnSeries>>,
}

impl MemoryColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches appended to `key`, in append order
    pub fn batches(&self, key: &TimeBucketKey) -> Vec<ColumnSeries> {
        self.buckets
            .get(key)
            .map(|b| b.value().clone())
            .unwrap_or_default()
    }

    pub fn batch_count(&self, key: &TimeBucketKey) -> usize {
        self.buckets.get(key).map(|b| b.len()).unwrap_or(0)
    }

    pub fn row_count(&self, key: &TimeBucketKey) -> usize {
        self.buckets
            .get(key)
            .map(|b| b.iter().map(ColumnSeries::len).sum::<usize>())
            .unwrap_or(0)
    }

    /// All rows of `key` flattened across batches
    pub fn rows(&self, key: &TimeBucketKey) -> Vec<Map<String, Value>> {
        self.batches(key)
            .iter()
            .flat_map(ColumnSeries::rows)
            .collect()
    }

    /// Bucket keys, sorted
    pub fn keys(&self) -> Vec<TimeBucketKey> {
        let mut keys: Vec<TimeBucketKey> = self.buckets.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ColumnStore for MemoryColumnStore {
    async fn append(&self, key: &TimeBucketKey, series: ColumnSeries) -> SinkResult<()> {
        self.buckets.entry(key.clone()).or_default().push(series);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Bar, Cadence};

    #[tokio::test]
    async fn test_append_and_read_back() {
        let store = MemoryColumnStore::new();
        let key = TimeBucketKey::ohlcv("BTCUSDT", Cadence::Minute1);

        let first = ColumnSeries::from_bars(&[Bar::default()]);
        let second = ColumnSeries::from_bars(&[Bar::default(), Bar::default()]);
        store.append(&key, first).await.unwrap();
        store.append(&key, second).await.unwrap();

        assert_eq!(store.batch_count(&key), 2);
        assert_eq!(store.row_count(&key), 3);
        assert_eq!(store.rows(&key).len(), 3);
        assert_eq!(store.keys(), vec![key]);
    }
}
