//! Record-to-row mapping for a single table.
//!
//! ## Field Mapping
//!
//! - Row key: string value of the configured row-key field
//! - Cells: one per registered `(family, qualifier)`, valued from the record
//!   field named after the qualifier
//! - Timestamp: optional integer field; only positive values are applied
//!
//! ## Increment Counters
//!
//! For increments the qualifier's record field supplies the *counter name*.
//! When the record has no such field the qualifier name itself is used.
//! Writes have no such fallback and fail on a missing qualifier field.

use crate::mapping::operation::{IncrementOp, WriteOp};
use crate::mapping::record::Record;
use crate::MappingError;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Mapping from record fields to cells of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapping {
    table_name: String,
    row_key_field: String,
    timestamp_field: String,
    column_families: BTreeMap<String, BTreeSet<String>>,
    batch: bool,
    write_to_log: bool,
    write_buffer_size: u64,
}

impl TableMapping {
    /// Create a mapping without a timestamp field.
    pub fn new(table_name: impl Into<String>, row_key_field: impl Into<String>) -> Self {
        Self::with_timestamp_field(table_name, row_key_field, "")
    }

    /// Create a mapping whose cells are versioned from `timestamp_field`.
    pub fn with_timestamp_field(
        table_name: impl Into<String>,
        row_key_field: impl Into<String>,
        timestamp_field: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            row_key_field: row_key_field.into(),
            timestamp_field: timestamp_field.into(),
            column_families: BTreeMap::new(),
            batch: true,
            write_to_log: true,
            write_buffer_size: 0,
        }
    }

    /// Register a qualifier to be populated from the record field of the same name.
    ///
    /// Re-adding an existing pair is a no-op.
    pub fn add_column(&mut self, family: impl Into<String>, qualifier: impl Into<String>) {
        self.column_families
            .entry(family.into())
            .or_default()
            .insert(qualifier.into());
    }

    /// Enable or disable client-side write buffering. Enabled by default.
    pub fn set_batch(&mut self, batch: bool) {
        self.batch = batch;
    }

    /// Whether writes go to the store's durability log. Enabled by default.
    ///
    /// Disabling trades durability of unflushed store memory for throughput.
    pub fn set_write_to_log(&mut self, write_to_log: bool) {
        self.write_to_log = write_to_log;
    }

    /// Override the client-side write buffer size in bytes. `0` keeps the
    /// store default.
    pub fn set_write_buffer_size(&mut self, write_buffer_size: u64) {
        self.write_buffer_size = write_buffer_size;
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn row_key_field(&self) -> &str {
        &self.row_key_field
    }

    /// The timestamp field, if one is configured.
    pub fn timestamp_field(&self) -> Option<&str> {
        if self.timestamp_field.is_empty() {
            None
        } else {
            Some(&self.timestamp_field)
        }
    }

    pub fn is_batch(&self) -> bool {
        self.batch
    }

    pub fn write_to_log(&self) -> bool {
        self.write_to_log
    }

    pub fn write_buffer_size(&self) -> u64 {
        self.write_buffer_size
    }

    /// Configured column family names.
    pub fn column_families(&self) -> impl Iterator<Item = &str> {
        self.column_families.keys().map(String::as_str)
    }

    /// Configured qualifiers of one family.
    pub fn qualifiers(&self, family: &str) -> Option<&BTreeSet<String>> {
        self.column_families.get(family)
    }

    /// All configured `(family, qualifier)` pairs.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.column_families
            .iter()
            .flat_map(|(cf, cqs)| cqs.iter().map(move |cq| (cf.as_str(), cq.as_str())))
    }

    /// Build a row write from a record.
    pub fn build_write_operation<R: Record + ?Sized>(
        &self,
        record: &R,
    ) -> Result<WriteOp, MappingError> {
        let row_key = self.row_key(record)?;
        let ts = self.timestamp(record)?;

        let mut op = WriteOp::new(row_key);
        op.set_write_to_log(self.write_to_log);

        for (cf, cq) in self.columns() {
            let value = record.get_string(cq)?;
            op.add_cell(cf.to_string(), cq.to_string(), value, ts);
        }

        trace!(table = %self.table_name, cells = op.cells().len(), "Built write operation");
        Ok(op)
    }

    /// Build a counter increment from a record, adding `delta` to every
    /// configured counter.
    pub fn build_increment_operation<R: Record + ?Sized>(
        &self,
        record: &R,
        delta: i64,
    ) -> Result<IncrementOp, MappingError> {
        let row_key = self.row_key(record)?;

        let mut op = IncrementOp::new(row_key);
        op.set_write_to_log(self.write_to_log);

        for (cf, cq) in self.columns() {
            let counter_id = match record.get_string(cq) {
                Ok(value) => value,
                Err(e) if e.is_not_found() => cq.to_string(),
                Err(e) => return Err(e),
            };
            op.add_counter(cf.to_string(), counter_id, delta);
        }

        trace!(table = %self.table_name, counters = op.counters().len(), "Built increment operation");
        Ok(op)
    }

    fn row_key<R: Record + ?Sized>(&self, record: &R) -> Result<String, MappingError> {
        record.get_string(&self.row_key_field)
    }

    /// Explicit timestamp for this record, if any. Non-positive values and
    /// a missing field both mean "let the store decide".
    fn timestamp<R: Record + ?Sized>(&self, record: &R) -> Result<Option<i64>, MappingError> {
        let Some(field) = self.timestamp_field() else {
            return Ok(None);
        };

        match record.get_i64(field) {
            Ok(ts) if ts > 0 => Ok(Some(ts)),
            Ok(_) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
