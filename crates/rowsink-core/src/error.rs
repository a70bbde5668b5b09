//! Error types for rowsink core library.
//!
//! Uses hierarchical domain-specific errors following the thiserror pattern.

use thiserror::Error;

/// Result type alias for rowsink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for rowsink.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record-to-operation mapping error
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Store-related error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading fields off an input record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// The record has no field with this name
    #[error("Field not found: {field}")]
    FieldNotFound { field: String },

    /// The field exists but cannot be read as the requested type
    #[error("Field '{field}' is not convertible to {expected}")]
    FieldTypeMismatch {
        field: String,
        expected: &'static str,
    },
}

/// Store-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Table handle could not be opened
    #[error("Unable to establish connection to table {table}: {message}")]
    ConnectionFailed { table: String, message: String },

    /// A configured column family is missing from the live schema
    #[error("Table '{table}' does not have column family '{family}'")]
    SchemaMismatch { table: String, family: String },

    /// Put or increment rejected by the store
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Buffered writes could not be sent
    #[error("Flush failed: {0}")]
    FlushFailed(String),

    /// Table handle could not be closed cleanly
    #[error("Close failed: {0}")]
    CloseFailed(String),

    /// Write buffer size override rejected
    #[error("Write buffer size rejected: {0}")]
    BufferSize(String),
}

impl MappingError {
    /// Whether this error means the field is absent (as opposed to mistyped).
    pub fn is_not_found(&self) -> bool {
        matches!(self, MappingError::FieldNotFound { .. })
    }
}

// Conversion implementations for external error types

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
