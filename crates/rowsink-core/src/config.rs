//! Configuration structures for rowsink.
//!
//! Configuration is loaded from TOML files and can be overridden via CLI flags.

use crate::mapping::TableMapping;
use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Target table and field mapping
    pub table: TableConfig,

    /// Record sink configuration
    #[serde(default)]
    pub sink: SinkConfig,

    /// Store backend configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Monitoring configuration
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Table mapping configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableConfig {
    /// Target table name
    pub name: String,

    /// Record field supplying the row key
    pub row_key_field: String,

    /// Record field supplying cell timestamps (empty = store assigns)
    #[serde(default)]
    pub timestamp_field: String,

    /// Enable the client-side write buffer
    #[serde(default = "default_enabled")]
    pub batch: bool,

    /// Record writes in the store's durability log
    #[serde(default = "default_enabled")]
    pub write_to_log: bool,

    /// Client-side write buffer size in bytes (0 = store default)
    #[serde(default)]
    pub write_buffer_size: u64,

    /// Columns to populate from each record
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
}

/// Qualifiers of one column family.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnConfig {
    /// Column family name
    pub family: String,

    /// Qualifier names, each read from the record field of the same name
    #[serde(default)]
    pub qualifiers: Vec<String>,
}

/// How records are written.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    /// Put rows or increment counters
    #[serde(default)]
    pub mode: SinkModeConfig,

    /// Increment amount (increment mode only)
    #[serde(default = "default_delta")]
    pub delta: i64,

    /// Flush after this many submitted records (0 = never)
    #[serde(default)]
    pub flush_every: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            mode: SinkModeConfig::default(),
            delta: default_delta(),
            flush_every: 0,
        }
    }
}

/// Sink mode.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkModeConfig {
    /// Write one row per record (default)
    #[default]
    Put,
    /// Increment counters per record
    Increment,
}

/// Store backend configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Backend type
    #[serde(default)]
    pub backend: StoreBackend,

    /// Tables to create (memory backend only)
    #[serde(default)]
    pub tables: Vec<TableSchemaConfig>,
}

/// Store backend type.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store (default)
    #[default]
    Memory,
}

/// Table schema for backends that are provisioned from configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableSchemaConfig {
    /// Table name
    pub name: String,

    /// Column families
    #[serde(default)]
    pub families: Vec<String>,
}

/// Monitoring configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl LogLevel {
    /// Directive string for an env filter.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Plain text format
    Text,
}

// Default value functions
fn default_enabled() -> bool {
    true
}
fn default_delta() -> i64 {
    1
}

impl TableConfig {
    /// Build the record mapping described by this section.
    pub fn to_mapping(&self) -> TableMapping {
        let mut mapping = TableMapping::with_timestamp_field(
            &self.name,
            &self.row_key_field,
            &self.timestamp_field,
        );
        mapping.set_batch(self.batch);
        mapping.set_write_to_log(self.write_to_log);
        mapping.set_write_buffer_size(self.write_buffer_size);

        for column in &self.columns {
            for qualifier in &column.qualifiers {
                mapping.add_column(&column.family, qualifier);
            }
        }
        mapping
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.table.name.is_empty() {
            return Err(crate::Error::Config("Table name is required".into()));
        }

        if self.table.row_key_field.is_empty() {
            return Err(crate::Error::Config("Row key field is required".into()));
        }

        for column in &self.table.columns {
            if column.family.is_empty() {
                return Err(crate::Error::Config(
                    "Column family name must not be empty".into(),
                ));
            }
            if column.qualifiers.iter().any(String::is_empty) {
                return Err(crate::Error::Config(format!(
                    "Column family '{}' has an empty qualifier",
                    column.family
                )));
            }
            if column.qualifiers.is_empty() {
                tracing::warn!(
                    family = %column.family,
                    "Column family lists no qualifiers and will not be checked against the table schema"
                );
            }
        }

        if self.sink.mode == SinkModeConfig::Put && self.sink.delta != default_delta() {
            tracing::warn!(delta = self.sink.delta, "Increment delta is ignored in put mode");
        }

        Ok(())
    }
}
