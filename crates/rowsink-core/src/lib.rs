//! rowsink core - stream records to wide-column rows
//!
//! This library turns structured records into row writes and counter
//! increments against a wide-column store:
//!
//! - Declarative field mapping (row key, column family/qualifier, timestamp)
//! - Pure operation builders, testable without a store
//! - Single-table connector with schema verification and client-side buffering
//! - Record sink for put or counter workloads

pub mod config;
pub mod error;
pub mod mapping;
pub mod sink;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use error::{MappingError, StoreError};
pub use mapping::{IncrementOp, Record, TableMapping, WriteOp};
pub use sink::{RecordSink, SinkMode};
pub use store::{MemoryStore, StoreProvider, TableConnector};
