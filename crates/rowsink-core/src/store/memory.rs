//! In-process wide-column store.
//!
//! Backs tests, dry runs and the CLI without a cluster. Semantics follow a
//! typical wide-column client:
//!
//! - Tables are created up front with a fixed set of column families
//! - One version per cell is kept; older timestamps never overwrite newer ones
//! - Counters are 8-byte big-endian integers stored in ordinary cells
//! - With auto-flush off, puts collect in a client-side buffer that is sent
//!   once it reaches the write buffer size or on an explicit flush
//!
//! A [`FailurePlan`] can be installed to make individual calls fail.

use crate::mapping::{IncrementOp, WriteOp};
use crate::store::client::{
    CounterValue, StoreProvider, StoreResult, TableClient, TableDescriptor,
};
use crate::StoreError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Default client-side write buffer size (2 MiB).
pub const DEFAULT_WRITE_BUFFER_SIZE: u64 = 2 * 1024 * 1024;

/// Calls to fail on purpose.
#[derive(Debug, Clone, Default)]
pub struct FailurePlan {
    pub fail_open: bool,
    pub fail_descriptor: bool,
    pub fail_put: bool,
    pub fail_increment: bool,
    pub fail_flush: bool,
    pub fail_close: bool,
    pub fail_buffer_size: bool,
}

/// A stored cell version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCell {
    pub value: Bytes,
    pub timestamp: i64,
}

/// Counters kept by the store itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    /// Row writes applied to table data
    pub puts_applied: u64,
    /// Increments applied to table data
    pub increments_applied: u64,
    /// Operations that skipped the durability log
    pub wal_skipped: u64,
    /// Buffer flushes that sent at least one put
    pub flushes: u64,
}

type ColumnKey = (Bytes, Bytes);

#[derive(Debug, Default)]
struct MemoryTable {
    families: BTreeSet<String>,
    rows: BTreeMap<Bytes, BTreeMap<ColumnKey, StoredCell>>,
}

impl MemoryTable {
    fn check_family(&self, table: &str, family: &Bytes) -> StoreResult<()> {
        let known = std::str::from_utf8(family)
            .map(|f| self.families.contains(f))
            .unwrap_or(false);
        if known {
            Ok(())
        } else {
            Err(StoreError::WriteFailed(format!(
                "column family '{}' does not exist in table {}",
                String::from_utf8_lossy(family),
                table
            )))
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, MemoryTable>,
    failures: FailurePlan,
    stats: MemoryStoreStats,
}

/// Shared in-memory store. Clones refer to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a table with the given column families.
    pub fn create_table<I, S>(&self, name: &str, families: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let table = MemoryTable {
            families: families.into_iter().map(Into::into).collect(),
            rows: BTreeMap::new(),
        };
        debug!(table = %name, families = ?table.families, "Created in-memory table");
        self.inner.write().tables.insert(name.to_string(), table);
    }

    /// Install a failure plan, replacing the previous one.
    pub fn set_failures(&self, failures: FailurePlan) {
        self.inner.write().failures = failures;
    }

    /// Read the stored version of one cell.
    pub fn get(
        &self,
        table: &str,
        row: &[u8],
        family: &[u8],
        qualifier: &[u8],
    ) -> Option<StoredCell> {
        let inner = self.inner.read();
        let key = (Bytes::copy_from_slice(family), Bytes::copy_from_slice(qualifier));
        inner.tables.get(table)?.rows.get(row)?.get(&key).cloned()
    }

    /// Read a counter cell as an integer.
    pub fn counter(
        &self,
        table: &str,
        row: &[u8],
        family: &[u8],
        counter_id: &[u8],
    ) -> Option<i64> {
        self.get(table, row, family, counter_id)
            .and_then(|cell| decode_counter(&cell.value))
    }

    /// Number of rows holding at least one cell.
    pub fn row_count(&self, table: &str) -> usize {
        self.inner
            .read()
            .tables
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    /// Snapshot of store-side counters.
    pub fn stats(&self) -> MemoryStoreStats {
        self.inner.read().stats.clone()
    }

    fn failures(&self) -> FailurePlan {
        self.inner.read().failures.clone()
    }

    fn descriptor(&self, table: &str) -> StoreResult<TableDescriptor> {
        let inner = self.inner.read();
        let t = inner.tables.get(table).ok_or_else(|| StoreError::ConnectionFailed {
            table: table.to_string(),
            message: "table not found".into(),
        })?;
        Ok(TableDescriptor::new(table, t.families.iter().cloned()))
    }

    fn apply_put(&self, table: &str, op: &WriteOp) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let t = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::WriteFailed(format!("table {} not found", table)))?;

        for cell in op.cells() {
            t.check_family(table, &cell.family)?;
        }

        let now = now_millis();
        let row = t.rows.entry(op.row_key().clone()).or_default();
        for cell in op.cells() {
            let ts = cell.timestamp.unwrap_or(now);
            let key = (cell.family.clone(), cell.qualifier.clone());
            let newer_exists = row.get(&key).is_some_and(|existing| existing.timestamp > ts);
            if !newer_exists {
                row.insert(
                    key,
                    StoredCell {
                        value: cell.value.clone(),
                        timestamp: ts,
                    },
                );
            }
        }
        if row.is_empty() {
            t.rows.remove(op.row_key());
        }

        inner.stats.puts_applied += 1;
        if !op.write_to_log() {
            inner.stats.wal_skipped += 1;
        }
        Ok(())
    }

    fn apply_increment(&self, table: &str, op: &IncrementOp) -> StoreResult<Vec<CounterValue>> {
        let mut inner = self.inner.write();
        let t = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::WriteFailed(format!("table {} not found", table)))?;

        // Resolve every new value before touching the row so a bad counter
        // leaves the whole increment unapplied.
        let existing = t.rows.get(op.row_key());
        let mut updated: Vec<CounterValue> = Vec::with_capacity(op.counters().len());
        for counter in op.counters() {
            t.check_family(table, &counter.family)?;

            let key = (counter.family.clone(), counter.counter_id.clone());
            let pending = updated
                .iter()
                .rev()
                .find(|c| c.family == counter.family && c.counter_id == counter.counter_id)
                .map(|c| c.value);
            let current = match pending {
                Some(v) => v,
                None => match existing.and_then(|row| row.get(&key)) {
                    Some(cell) => decode_counter(&cell.value).ok_or_else(|| {
                        StoreError::WriteFailed(format!(
                            "cell {}:{} is not a 64-bit counter",
                            String::from_utf8_lossy(&counter.family),
                            String::from_utf8_lossy(&counter.counter_id)
                        ))
                    })?,
                    None => 0,
                },
            };

            updated.push(CounterValue {
                family: counter.family.clone(),
                counter_id: counter.counter_id.clone(),
                value: current.wrapping_add(counter.delta),
            });
        }

        if !updated.is_empty() {
            let now = now_millis();
            let row = t.rows.entry(op.row_key().clone()).or_default();
            for c in &updated {
                row.insert(
                    (c.family.clone(), c.counter_id.clone()),
                    StoredCell {
                        value: Bytes::copy_from_slice(&c.value.to_be_bytes()),
                        timestamp: now,
                    },
                );
            }
        }

        inner.stats.increments_applied += 1;
        if !op.write_to_log() {
            inner.stats.wal_skipped += 1;
        }
        Ok(updated)
    }
}

#[async_trait]
impl StoreProvider for MemoryStore {
    async fn open_table(&self, name: &str) -> StoreResult<Box<dyn TableClient>> {
        if self.failures().fail_open {
            return Err(StoreError::ConnectionFailed {
                table: name.to_string(),
                message: "injected open failure".into(),
            });
        }
        if !self.inner.read().tables.contains_key(name) {
            return Err(StoreError::ConnectionFailed {
                table: name.to_string(),
                message: "table not found".into(),
            });
        }

        info!(table = %name, "Opened in-memory table handle");
        Ok(Box::new(MemoryTableClient {
            store: self.clone(),
            table: name.to_string(),
            auto_flush: true,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            buffer: Vec::new(),
            buffered_bytes: 0,
            closed: false,
        }))
    }
}

/// Table handle onto a [`MemoryStore`].
pub struct MemoryTableClient {
    store: MemoryStore,
    table: String,
    auto_flush: bool,
    write_buffer_size: u64,
    buffer: Vec<WriteOp>,
    buffered_bytes: u64,
    closed: bool,
}

impl MemoryTableClient {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            Err(StoreError::WriteFailed(format!(
                "table handle {} is closed",
                self.table
            )))
        } else {
            Ok(())
        }
    }

    fn flush_buffer(&mut self) -> StoreResult<()> {
        if self.store.failures().fail_flush {
            return Err(StoreError::FlushFailed(format!(
                "injected flush failure on table {}",
                self.table
            )));
        }
        if self.buffer.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.buffer);
        self.buffered_bytes = 0;
        let count = pending.len();

        let mut first_error = None;
        for op in &pending {
            if let Err(e) = self.store.apply_put(&self.table, op) {
                first_error.get_or_insert(e);
            }
        }
        self.store.inner.write().stats.flushes += 1;
        debug!(table = %self.table, puts = count, "Flushed write buffer");

        match first_error {
            Some(e) => Err(StoreError::FlushFailed(e.to_string())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TableClient for MemoryTableClient {
    async fn descriptor(&self) -> StoreResult<TableDescriptor> {
        if self.store.failures().fail_descriptor {
            return Err(StoreError::ConnectionFailed {
                table: self.table.clone(),
                message: "injected descriptor failure".into(),
            });
        }
        self.store.descriptor(&self.table)
    }

    fn set_auto_flush(&mut self, auto_flush: bool) {
        self.auto_flush = auto_flush;
    }

    fn is_auto_flush(&self) -> bool {
        self.auto_flush
    }

    async fn set_write_buffer_size(&mut self, size: u64) -> StoreResult<()> {
        if self.store.failures().fail_buffer_size {
            return Err(StoreError::BufferSize(format!(
                "injected failure setting {} bytes",
                size
            )));
        }
        self.write_buffer_size = size;
        if self.buffered_bytes >= self.write_buffer_size {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn write_buffer_size(&self) -> u64 {
        self.write_buffer_size
    }

    async fn put(&mut self, op: WriteOp) -> StoreResult<()> {
        self.ensure_open()?;
        if self.store.failures().fail_put {
            return Err(StoreError::WriteFailed("injected put failure".into()));
        }

        if self.auto_flush {
            return self.store.apply_put(&self.table, &op);
        }

        self.buffered_bytes += op.heap_size() as u64;
        self.buffer.push(op);
        if self.buffered_bytes >= self.write_buffer_size {
            self.flush_buffer()
                .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        }
        Ok(())
    }

    async fn increment(&mut self, op: IncrementOp) -> StoreResult<Vec<CounterValue>> {
        self.ensure_open()?;
        if self.store.failures().fail_increment {
            return Err(StoreError::WriteFailed("injected increment failure".into()));
        }
        self.store.apply_increment(&self.table, &op)
    }

    async fn flush_commits(&mut self) -> StoreResult<()> {
        self.ensure_open()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        self.flush_buffer()
    }

    async fn close(&mut self) -> StoreResult<()> {
        if self.closed {
            return Ok(());
        }
        let flushed = self.flush_buffer();
        self.closed = true;

        flushed.map_err(|e| StoreError::CloseFailed(e.to_string()))?;
        if self.store.failures().fail_close {
            return Err(StoreError::CloseFailed(format!(
                "injected close failure on table {}",
                self.table
            )));
        }
        debug!(table = %self.table, "Closed in-memory table handle");
        Ok(())
    }
}

fn decode_counter(value: &[u8]) -> Option<i64> {
    let raw: [u8; 8] = value.try_into().ok()?;
    Some(i64::from_be_bytes(raw))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_events() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("events", ["data", "counters"]);
        store
    }

    fn put_op(row: &'static str, value: &'static str, ts: Option<i64>) -> WriteOp {
        let mut op = WriteOp::new(row);
        op.add_cell("data", "payload", value, ts);
        op
    }

    #[tokio::test]
    async fn test_open_unknown_table_fails() {
        let store = MemoryStore::new();
        let result = store.open_table("missing").await;
        assert!(matches!(
            result,
            Err(StoreError::ConnectionFailed { ref table, .. }) if table == "missing"
        ));
    }

    #[tokio::test]
    async fn test_descriptor_reports_families() {
        let store = store_with_events();
        let client = store.open_table("events").await.unwrap();

        let desc = client.descriptor().await.unwrap();
        assert!(desc.has_family("data"));
        assert!(desc.has_family("counters"));
        assert!(!desc.has_family("meta"));
    }

    #[tokio::test]
    async fn test_immediate_put() {
        let store = store_with_events();
        let mut client = store.open_table("events").await.unwrap();

        client.put(put_op("row1", "hello", Some(1000))).await.unwrap();

        let cell = store.get("events", b"row1", b"data", b"payload").unwrap();
        assert_eq!(cell.value.as_ref(), b"hello");
        assert_eq!(cell.timestamp, 1000);
        assert_eq!(store.stats().puts_applied, 1);
    }

    #[tokio::test]
    async fn test_put_without_timestamp_uses_wall_clock() {
        let store = store_with_events();
        let mut client = store.open_table("events").await.unwrap();
        let before = now_millis();

        client.put(put_op("row1", "hello", None)).await.unwrap();

        let cell = store.get("events", b"row1", b"data", b"payload").unwrap();
        assert!(cell.timestamp >= before);
    }

    #[tokio::test]
    async fn test_older_version_does_not_overwrite() {
        let store = store_with_events();
        let mut client = store.open_table("events").await.unwrap();

        client.put(put_op("row1", "new", Some(2000))).await.unwrap();
        client.put(put_op("row1", "old", Some(1000))).await.unwrap();

        let cell = store.get("events", b"row1", b"data", b"payload").unwrap();
        assert_eq!(cell.value.as_ref(), b"new");
    }

    #[tokio::test]
    async fn test_put_unknown_family_fails() {
        let store = store_with_events();
        let mut client = store.open_table("events").await.unwrap();
        let mut op = WriteOp::new("row1");
        op.add_cell("meta", "x", "y", None);

        let err = client.put(op).await.unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed(_)));
        assert_eq!(store.row_count("events"), 0);
    }

    #[tokio::test]
    async fn test_buffered_puts_wait_for_flush() {
        let store = store_with_events();
        let mut client = store.open_table("events").await.unwrap();
        client.set_auto_flush(false);

        client.put(put_op("row1", "hello", None)).await.unwrap();
        assert!(store.get("events", b"row1", b"data", b"payload").is_none());

        client.flush_commits().await.unwrap();
        assert!(store.get("events", b"row1", b"data", b"payload").is_some());
        assert_eq!(store.stats().flushes, 1);
    }

    #[tokio::test]
    async fn test_full_buffer_flushes_itself() {
        let store = store_with_events();
        let mut client = store.open_table("events").await.unwrap();
        client.set_auto_flush(false);
        client.set_write_buffer_size(1).await.unwrap();

        client.put(put_op("row1", "hello", None)).await.unwrap();
        assert!(store.get("events", b"row1", b"data", b"payload").is_some());
    }

    #[tokio::test]
    async fn test_increment_counters() {
        let store = store_with_events();
        let mut client = store.open_table("events").await.unwrap();

        let mut op = IncrementOp::new("row3");
        op.add_counter("counters", "clicks", 5);
        let values = client.increment(op.clone()).await.unwrap();
        assert_eq!(values[0].value, 5);

        let values = client.increment(op).await.unwrap();
        assert_eq!(values[0].value, 10);
        assert_eq!(store.counter("events", b"row3", b"counters", b"clicks"), Some(10));
    }

    #[tokio::test]
    async fn test_increment_same_counter_twice_in_one_op() {
        let store = store_with_events();
        let mut client = store.open_table("events").await.unwrap();

        let mut op = IncrementOp::new("row3");
        op.add_counter("counters", "clicks", 2);
        op.add_counter("counters", "clicks", 3);
        client.increment(op).await.unwrap();

        assert_eq!(store.counter("events", b"row3", b"counters", b"clicks"), Some(5));
    }

    #[tokio::test]
    async fn test_increment_non_counter_cell_fails() {
        let store = store_with_events();
        let mut client = store.open_table("events").await.unwrap();
        let mut put = WriteOp::new("row3");
        put.add_cell("counters", "clicks", "abc", None);
        client.put(put).await.unwrap();

        let mut op = IncrementOp::new("row3");
        op.add_counter("counters", "clicks", 1);
        let err = client.increment(op).await.unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed(_)));
    }

    #[tokio::test]
    async fn test_wal_skipped_counted() {
        let store = store_with_events();
        let mut client = store.open_table("events").await.unwrap();
        let mut op = put_op("row1", "hello", None);
        op.set_write_to_log(false);

        client.put(op).await.unwrap();
        assert_eq!(store.stats().wal_skipped, 1);
    }

    #[tokio::test]
    async fn test_close_flushes_and_rejects_writes() {
        let store = store_with_events();
        let mut client = store.open_table("events").await.unwrap();
        client.set_auto_flush(false);
        client.put(put_op("row1", "hello", None)).await.unwrap();

        client.close().await.unwrap();
        assert!(store.get("events", b"row1", b"data", b"payload").is_some());
        assert!(client.put(put_op("row2", "x", None)).await.is_err());
        assert!(client.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = store_with_events();
        let mut client = store.open_table("events").await.unwrap();
        store.set_failures(FailurePlan {
            fail_put: true,
            fail_flush: true,
            fail_buffer_size: true,
            ..Default::default()
        });

        assert!(client.put(put_op("row1", "x", None)).await.is_err());
        assert!(matches!(
            client.flush_commits().await,
            Err(StoreError::FlushFailed(_))
        ));
        assert!(matches!(
            client.set_write_buffer_size(10).await,
            Err(StoreError::BufferSize(_))
        ));
    }
}
