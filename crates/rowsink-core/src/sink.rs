//! Record sink.
//!
//! Drives records through a [`TableMapping`] and a [`TableConnector`], either
//! writing one row per record or incrementing counters per record.

use crate::config::{SinkConfig, SinkModeConfig};
use crate::mapping::{Record, TableMapping};
use crate::store::{ConnectorStats, StoreProvider, TableConnector};
use crate::{Error, Result};
use tracing::{debug, info, warn};

/// What the sink does with each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    /// Write the mapped cells
    Put,
    /// Add `delta` to every mapped counter
    Increment { delta: i64 },
}

impl From<&SinkConfig> for SinkMode {
    fn from(config: &SinkConfig) -> Self {
        match config.mode {
            SinkModeConfig::Put => SinkMode::Put,
            SinkModeConfig::Increment => SinkMode::Increment {
                delta: config.delta,
            },
        }
    }
}

/// Runtime metrics for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkMetrics {
    /// Records submitted successfully
    pub records_processed: u64,
    /// Records that failed to map or submit
    pub records_failed: u64,
    /// Explicit flushes triggered by `flush_every`
    pub flushes_triggered: u64,
}

/// Result of processing a batch of records.
#[derive(Debug)]
pub struct BatchResult {
    /// Number of records submitted successfully
    pub succeeded: usize,
    /// Number of records that failed
    pub failed: usize,
    /// Per-record errors: `(index_in_batch, error)`
    pub errors: Vec<(usize, Error)>,
}

impl BatchResult {
    fn empty() -> Self {
        Self {
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
        }
    }

    /// Returns true if every record was submitted.
    pub fn is_all_ok(&self) -> bool {
        self.failed == 0
    }

    /// Total number of records attempted.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Maps records and submits them to one table.
#[derive(Debug)]
pub struct RecordSink {
    mapping: TableMapping,
    connector: TableConnector,
    mode: SinkMode,
    flush_every: usize,
    since_flush: usize,
    metrics: SinkMetrics,
}

impl RecordSink {
    /// Connect to the mapping's table and create a sink.
    pub async fn connect(
        provider: &dyn StoreProvider,
        mapping: TableMapping,
        mode: SinkMode,
    ) -> Result<Self> {
        let connector = TableConnector::connect(provider, &mapping).await?;
        Ok(Self::new(mapping, connector, mode))
    }

    /// Wrap an existing connector.
    pub fn new(mapping: TableMapping, connector: TableConnector, mode: SinkMode) -> Self {
        info!(table = %mapping.table_name(), mode = ?mode, "Record sink ready");
        Self {
            mapping,
            connector,
            mode,
            flush_every: 0,
            since_flush: 0,
            metrics: SinkMetrics::default(),
        }
    }

    /// Flush after every `n` submitted records. `0` disables.
    pub fn with_flush_every(mut self, n: usize) -> Self {
        self.flush_every = n;
        self
    }

    pub fn mode(&self) -> SinkMode {
        self.mode
    }

    pub fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    pub fn connector_stats(&self) -> &ConnectorStats {
        self.connector.stats()
    }

    /// Map one record and submit it.
    pub async fn process<R: Record + ?Sized>(&mut self, record: &R) -> Result<()> {
        match self.submit(record).await {
            Ok(()) => {
                self.metrics.records_processed += 1;
                self.maybe_flush().await;
                Ok(())
            }
            Err(e) => {
                self.metrics.records_failed += 1;
                warn!(table = %self.connector.table_name(), error = %e, "Record failed");
                Err(e)
            }
        }
    }

    /// Process every record, collecting per-record errors.
    ///
    /// A failing record never stops the rest of the batch.
    pub async fn process_batch<R: Record>(&mut self, records: &[R]) -> BatchResult {
        let mut result = BatchResult::empty();

        for (idx, record) in records.iter().enumerate() {
            match self.process(record).await {
                Ok(()) => result.succeeded += 1,
                Err(e) => {
                    result.failed += 1;
                    result.errors.push((idx, e));
                }
            }
        }

        debug!(
            succeeded = result.succeeded,
            failed = result.failed,
            "Processed record batch"
        );
        result
    }

    /// Send buffered writes.
    pub async fn flush(&mut self) {
        self.connector.flush().await;
        self.since_flush = 0;
    }

    /// Flush and close the underlying connector.
    pub async fn shutdown(mut self) -> (SinkMetrics, ConnectorStats) {
        self.connector.flush().await;
        let stats = self.connector.stats().clone();
        self.connector.close().await;
        info!(metrics = ?self.metrics, "Record sink stopped");
        (self.metrics, stats)
    }

    async fn submit<R: Record + ?Sized>(&mut self, record: &R) -> Result<()> {
        match self.mode {
            SinkMode::Put => {
                let op = self.mapping.build_write_operation(record)?;
                self.connector.put(op).await
            }
            SinkMode::Increment { delta } => {
                let op = self.mapping.build_increment_operation(record, delta)?;
                self.connector.increment(op).await
            }
        }
    }

    async fn maybe_flush(&mut self) {
        if self.flush_every == 0 {
            return;
        }
        self.since_flush += 1;
        if self.since_flush >= self.flush_every {
            self.flush().await;
            self.metrics.flushes_triggered += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::{MappingError, StoreError};
    use serde_json::json;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("events", ["data", "counters"]);
        store
    }

    fn put_mapping() -> TableMapping {
        let mut mapping = TableMapping::with_timestamp_field("events", "id", "ts");
        mapping.add_column("data", "payload");
        mapping
    }

    #[test]
    fn test_mode_from_config() {
        let mut config = SinkConfig::default();
        assert_eq!(SinkMode::from(&config), SinkMode::Put);

        config.mode = SinkModeConfig::Increment;
        config.delta = 3;
        assert_eq!(SinkMode::from(&config), SinkMode::Increment { delta: 3 });
    }

    #[tokio::test]
    async fn test_put_mode() {
        let store = store();
        let mut sink = RecordSink::connect(&store, put_mapping(), SinkMode::Put)
            .await
            .unwrap();

        sink.process(&json!({"id": "row1", "ts": 1000, "payload": "hello"}))
            .await
            .unwrap();
        let (metrics, stats) = sink.shutdown().await;

        assert_eq!(metrics.records_processed, 1);
        assert_eq!(stats.puts, 1);
        let cell = store.get("events", b"row1", b"data", b"payload").unwrap();
        assert_eq!(cell.value.as_ref(), b"hello");
        assert_eq!(cell.timestamp, 1000);
    }

    #[tokio::test]
    async fn test_increment_mode() {
        let store = store();
        let mut mapping = TableMapping::new("events", "id");
        mapping.add_column("counters", "clicks");
        let mut sink = RecordSink::connect(&store, mapping, SinkMode::Increment { delta: 2 })
            .await
            .unwrap();

        sink.process(&json!({"id": "row3"})).await.unwrap();
        sink.process(&json!({"id": "row3"})).await.unwrap();

        assert_eq!(store.counter("events", b"row3", b"counters", b"clicks"), Some(4));
        assert_eq!(sink.connector_stats().increments, 2);
    }

    #[tokio::test]
    async fn test_batch_collects_errors() {
        let store = store();
        let mut sink = RecordSink::connect(&store, put_mapping(), SinkMode::Put)
            .await
            .unwrap();

        let records = vec![
            json!({"id": "row1", "payload": "a"}),
            json!({"id": "row2"}),
            json!({"payload": "c"}),
            json!({"id": "row4", "payload": "d"}),
        ];
        let result = sink.process_batch(&records).await;

        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 2);
        assert_eq!(result.total(), 4);
        assert!(!result.is_all_ok());
        assert_eq!(result.errors[0].0, 1);
        assert!(matches!(
            result.errors[0].1,
            Error::Mapping(MappingError::FieldNotFound { ref field }) if field == "payload"
        ));
        assert_eq!(result.errors[1].0, 2);
        assert_eq!(sink.metrics().records_failed, 2);
    }

    #[tokio::test]
    async fn test_flush_every() {
        let store = store();
        let mut sink = RecordSink::connect(&store, put_mapping(), SinkMode::Put)
            .await
            .unwrap()
            .with_flush_every(2);

        sink.process(&json!({"id": "row1", "payload": "a"})).await.unwrap();
        assert_eq!(store.row_count("events"), 0);

        sink.process(&json!({"id": "row2", "payload": "b"})).await.unwrap();
        assert_eq!(store.row_count("events"), 2);
        assert_eq!(sink.metrics().flushes_triggered, 1);
    }

    #[tokio::test]
    async fn test_connect_schema_mismatch() {
        let store = MemoryStore::new();
        store.create_table("events", ["counters"]);

        let err = RecordSink::connect(&store, put_mapping(), SinkMode::Put)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::SchemaMismatch { .. })));
    }
}
