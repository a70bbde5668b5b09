//! Table connector.
//!
//! Owns exactly one table handle and submits built operations through it.
//!
//! ## Lifecycle
//!
//! 1. Open the table through a [`StoreProvider`]
//! 2. Enable client-side buffering when the mapping asks for batching
//! 3. Apply the write buffer size override (best effort)
//! 4. Verify every configured column family exists in the live schema
//!
//! After that the connector accepts puts and increments until [`TableConnector::close`]
//! consumes it.
//!
//! Flush and close are lenient: failures are logged, not returned. Use
//! [`TableConnector::try_flush`] and [`TableConnector::try_close`] to observe them.

use crate::mapping::{IncrementOp, TableMapping, WriteOp};
use crate::store::client::{StoreProvider, TableClient};
use crate::{Result, StoreError};
use tracing::{debug, error, info};

/// Operation counts for one connector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorStats {
    /// Puts accepted by the handle
    pub puts: u64,
    /// Increments applied
    pub increments: u64,
    /// Flushes that completed
    pub flushes: u64,
    /// Flushes that failed
    pub flush_failures: u64,
}

/// Single-owner connection to one table.
pub struct TableConnector {
    table: Box<dyn TableClient>,
    table_name: String,
    stats: ConnectorStats,
}

impl std::fmt::Debug for TableConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableConnector")
            .field("table_name", &self.table_name)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl TableConnector {
    /// Open and validate a connection to the mapping's table.
    pub async fn connect(provider: &dyn StoreProvider, mapping: &TableMapping) -> Result<Self> {
        let table_name = mapping.table_name().to_string();

        info!(table = %table_name, "Initializing connection to table");

        let mut table = provider
            .open_table(&table_name)
            .await
            .map_err(|e| into_connection_error(&table_name, e))?;

        if mapping.is_batch() {
            table.set_auto_flush(false);
            info!(table = %table_name, "Enabled client-side write buffer");
        }

        let buffer_size = mapping.write_buffer_size();
        if buffer_size > 0 {
            match table.set_write_buffer_size(buffer_size).await {
                Ok(()) => {
                    info!(table = %table_name, bytes = buffer_size, "Set client-side write buffer size");
                }
                Err(e) => {
                    error!(
                        table = %table_name,
                        bytes = buffer_size,
                        error = %e,
                        "Unable to set client-side write buffer size"
                    );
                }
            }
        }

        let descriptor = table
            .descriptor()
            .await
            .map_err(|e| into_connection_error(&table_name, e))?;
        for family in mapping.column_families() {
            if !descriptor.has_family(family) {
                return Err(StoreError::SchemaMismatch {
                    table: table_name,
                    family: family.to_string(),
                }
                .into());
            }
        }

        debug!(
            table = %table_name,
            families = ?descriptor.families,
            auto_flush = table.is_auto_flush(),
            write_buffer_size = table.write_buffer_size(),
            "Table connection ready"
        );

        Ok(Self {
            table,
            table_name,
            stats: ConnectorStats::default(),
        })
    }

    /// Name of the connected table.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Operation counts so far.
    pub fn stats(&self) -> &ConnectorStats {
        &self.stats
    }

    /// Whether puts are held in the client-side buffer.
    pub fn is_buffered(&self) -> bool {
        !self.table.is_auto_flush()
    }

    /// Submit a row write.
    ///
    /// With buffering enabled the write may not be visible in the store
    /// until the buffer fills or [`TableConnector::flush`] is called.
    pub async fn put(&mut self, op: WriteOp) -> Result<()> {
        self.table.put(op).await.map_err(into_write_error)?;
        self.stats.puts += 1;
        Ok(())
    }

    /// Apply a counter increment. Increments are never buffered.
    pub async fn increment(&mut self, op: IncrementOp) -> Result<()> {
        self.table.increment(op).await.map_err(into_write_error)?;
        self.stats.increments += 1;
        Ok(())
    }

    /// Send buffered puts, logging any failure.
    pub async fn flush(&mut self) {
        if let Err(e) = self.try_flush().await {
            error!(table = %self.table_name, error = %e, "Unable to flush write buffer");
        }
    }

    /// Send buffered puts, returning any failure.
    pub async fn try_flush(&mut self) -> Result<()> {
        match self.table.flush_commits().await {
            Ok(()) => {
                self.stats.flushes += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.flush_failures += 1;
                Err(match e {
                    StoreError::FlushFailed(_) => e,
                    other => StoreError::FlushFailed(other.to_string()),
                }
                .into())
            }
        }
    }

    /// Close the table handle, logging any failure.
    pub async fn close(self) {
        let table_name = self.table_name.clone();
        if let Err(e) = self.try_close().await {
            error!(table = %table_name, error = %e, "Unable to close connection to table");
        }
    }

    /// Close the table handle, returning any failure.
    pub async fn try_close(mut self) -> Result<()> {
        self.table.close().await.map_err(|e| match e {
            StoreError::CloseFailed(_) => e,
            other => StoreError::CloseFailed(other.to_string()),
        })?;
        info!(table = %self.table_name, stats = ?self.stats, "Closed table connection");
        Ok(())
    }
}

fn into_connection_error(table: &str, e: StoreError) -> StoreError {
    match e {
        StoreError::ConnectionFailed { .. } => e,
        other => StoreError::ConnectionFailed {
            table: table.to_string(),
            message: other.to_string(),
        },
    }
}

fn into_write_error(e: StoreError) -> StoreError {
    match e {
        StoreError::WriteFailed(_) => e,
        other => StoreError::WriteFailed(other.to_string()),
    }
}
