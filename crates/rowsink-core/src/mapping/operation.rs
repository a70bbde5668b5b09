//! Row-level store operations built from records.
//!
//! Both operation kinds target exactly one row and carry the durability flag
//! chosen by the mapping. Names and values are raw bytes, as the store sees
//! them.

use bytes::Bytes;
use serde_json::{json, Value};

/// A single cell write within a [`WriteOp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Column family
    pub family: Bytes,
    /// Column qualifier
    pub qualifier: Bytes,
    /// Cell value
    pub value: Bytes,
    /// Explicit version timestamp; `None` lets the store assign one
    pub timestamp: Option<i64>,
}

/// Write of zero or more cells to one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    row_key: Bytes,
    write_to_log: bool,
    cells: Vec<Cell>,
}

impl WriteOp {
    /// Create an empty write for the given row.
    pub fn new(row_key: impl Into<Bytes>) -> Self {
        Self {
            row_key: row_key.into(),
            write_to_log: true,
            cells: Vec::new(),
        }
    }

    /// Set whether the store should record this write in its durability log.
    pub fn set_write_to_log(&mut self, write_to_log: bool) {
        self.write_to_log = write_to_log;
    }

    /// Append a cell.
    pub fn add_cell(
        &mut self,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        value: impl Into<Bytes>,
        timestamp: Option<i64>,
    ) {
        self.cells.push(Cell {
            family: family.into(),
            qualifier: qualifier.into(),
            value: value.into(),
            timestamp,
        });
    }

    pub fn row_key(&self) -> &Bytes {
        &self.row_key
    }

    pub fn write_to_log(&self) -> bool {
        self.write_to_log
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Whether the write carries no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Approximate payload size, used for client-side buffer accounting.
    pub fn heap_size(&self) -> usize {
        self.row_key.len()
            + self
                .cells
                .iter()
                .map(|c| c.family.len() + c.qualifier.len() + c.value.len() + 8)
                .sum::<usize>()
    }

    /// Render as JSON for logs and dry runs. Byte strings are decoded lossily.
    pub fn describe(&self) -> Value {
        let cells: Vec<Value> = self
            .cells
            .iter()
            .map(|c| {
                json!({
                    "family": lossy(&c.family),
                    "qualifier": lossy(&c.qualifier),
                    "value": lossy(&c.value),
                    "timestamp": c.timestamp,
                })
            })
            .collect();

        json!({
            "op": "put",
            "row_key": lossy(&self.row_key),
            "write_to_log": self.write_to_log,
            "cells": cells,
        })
    }
}

/// One counter targeted by an [`IncrementOp`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterUpdate {
    /// Column family
    pub family: Bytes,
    /// Counter identifier (the qualifier the counter lives under)
    pub counter_id: Bytes,
    /// Amount to add
    pub delta: i64,
}

/// Atomic increment of one or more counters in one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementOp {
    row_key: Bytes,
    write_to_log: bool,
    counters: Vec<CounterUpdate>,
}

impl IncrementOp {
    /// Create an empty increment for the given row.
    pub fn new(row_key: impl Into<Bytes>) -> Self {
        Self {
            row_key: row_key.into(),
            write_to_log: true,
            counters: Vec::new(),
        }
    }

    /// Set whether the store should record this increment in its durability log.
    pub fn set_write_to_log(&mut self, write_to_log: bool) {
        self.write_to_log = write_to_log;
    }

    /// Append a counter update.
    pub fn add_counter(
        &mut self,
        family: impl Into<Bytes>,
        counter_id: impl Into<Bytes>,
        delta: i64,
    ) {
        self.counters.push(CounterUpdate {
            family: family.into(),
            counter_id: counter_id.into(),
            delta,
        });
    }

    pub fn row_key(&self) -> &Bytes {
        &self.row_key
    }

    pub fn write_to_log(&self) -> bool {
        self.write_to_log
    }

    pub fn counters(&self) -> &[CounterUpdate] {
        &self.counters
    }

    /// Whether the increment targets no counters.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Render as JSON for logs and dry runs. Byte strings are decoded lossily.
    pub fn describe(&self) -> Value {
        let counters: Vec<Value> = self
            .counters
            .iter()
            .map(|c| {
                json!({
                    "family": lossy(&c.family),
                    "counter": lossy(&c.counter_id),
                    "delta": c.delta,
                })
            })
            .collect();

        json!({
            "op": "increment",
            "row_key": lossy(&self.row_key),
            "write_to_log": self.write_to_log,
            "counters": counters,
        })
    }
}

fn lossy(bytes: &Bytes) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
