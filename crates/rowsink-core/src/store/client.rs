//! Store client seam.
//!
//! The connector never talks to a store directly. A [`StoreProvider`] opens
//! table handles using whatever connection discovery the backend needs, and
//! each handle implements [`TableClient`].

use crate::mapping::{IncrementOp, WriteOp};
use crate::StoreError;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeSet;

/// Result type for store client calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Live schema of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Table name
    pub name: String,
    /// Column families defined on the table
    pub families: BTreeSet<String>,
}

impl TableDescriptor {
    /// Create a descriptor from a table name and its families.
    pub fn new<I, S>(name: impl Into<String>, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            families: families.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if the table contains the given column family.
    pub fn has_family(&self, family: &str) -> bool {
        self.families.contains(family)
    }
}

/// Counter value reported by the store after an increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterValue {
    pub family: Bytes,
    pub counter_id: Bytes,
    pub value: i64,
}

/// Opens table handles.
///
/// Implementations own host and cluster discovery.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    /// Open a handle to the named table.
    async fn open_table(&self, name: &str) -> StoreResult<Box<dyn TableClient>>;
}

/// A single open table handle.
///
/// Handles are single-owner; callers sharing one across tasks must
/// synchronize externally.
#[async_trait]
pub trait TableClient: Send {
    /// Fetch the table's live schema.
    async fn descriptor(&self) -> StoreResult<TableDescriptor>;

    /// Toggle auto-flush. With auto-flush off, puts accumulate in a
    /// client-side buffer until it fills or [`TableClient::flush_commits`]
    /// is called.
    fn set_auto_flush(&mut self, auto_flush: bool);

    /// Whether puts are sent immediately.
    fn is_auto_flush(&self) -> bool;

    /// Override the client-side write buffer size in bytes.
    async fn set_write_buffer_size(&mut self, size: u64) -> StoreResult<()>;

    /// Current client-side write buffer size in bytes.
    fn write_buffer_size(&self) -> u64;

    /// Submit a row write, buffered or immediate depending on auto-flush.
    async fn put(&mut self, op: WriteOp) -> StoreResult<()>;

    /// Apply an increment immediately, returning the resulting counter values.
    async fn increment(&mut self, op: IncrementOp) -> StoreResult<Vec<CounterValue>>;

    /// Send all buffered puts.
    async fn flush_commits(&mut self) -> StoreResult<()>;

    /// Release the handle. Buffered puts are flushed first.
    async fn close(&mut self) -> StoreResult<()>;
}
