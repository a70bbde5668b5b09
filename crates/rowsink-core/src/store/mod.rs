//! Wide-column store access.
//!
//! - [`client`]: provider and table handle traits every backend implements
//! - [`memory`]: bundled in-process backend
//! - [`connector`]: single-table connector that submits built operations

pub mod client;
mod connector;
pub mod memory;

pub use client::{CounterValue, StoreProvider, StoreResult, TableClient, TableDescriptor};
pub use connector::{ConnectorStats, TableConnector};
pub use memory::{FailurePlan, MemoryStore, MemoryStoreStats, MemoryTableClient, StoredCell};
