//! Ingest command implementation.

use super::check_failures;
use super::input::read_records;
use anyhow::Result;
use rowsink_core::config::{StoreBackend, StoreConfig};
use rowsink_core::{Config, MemoryStore, RecordSink, SinkMode, TableMapping};
use serde_json::json;
use tracing::{info, warn};

/// Write records to the configured store and print a JSON summary.
pub async fn run(
    mut config: Config,
    input: Option<std::path::PathBuf>,
    table: Option<String>,
) -> Result<()> {
    // Apply CLI overrides
    if let Some(t) = table {
        config.table.name = t;
    }

    let mapping = config.table.to_mapping();
    let mode = SinkMode::from(&config.sink);

    info!(
        table = %mapping.table_name(),
        mode = ?mode,
        backend = ?config.store.backend,
        "Starting ingest"
    );

    let store = match config.store.backend {
        StoreBackend::Memory => provision_memory_store(&config.store, &mapping),
    };

    let mut sink = RecordSink::connect(&store, mapping.clone(), mode)
        .await?
        .with_flush_every(config.sink.flush_every);

    let mut unparseable = 0u64;
    let mut first_error: Option<anyhow::Error> = None;
    for line in read_records(input.as_deref())? {
        match line.record {
            Ok(record) => {
                // Failures are counted in the sink metrics and logged there
                if let Err(e) = sink.process(&record).await {
                    first_error.get_or_insert_with(|| e.into());
                }
            }
            Err(e) => {
                warn!(line = line.line_no, error = %e, "Skipping unparseable record");
                unparseable += 1;
                first_error.get_or_insert_with(|| e.into());
            }
        }
    }

    let (metrics, stats) = sink.shutdown().await;
    let store_stats = store.stats();

    let summary = json!({
        "table": mapping.table_name(),
        "records_processed": metrics.records_processed,
        "records_failed": metrics.records_failed,
        "records_unparseable": unparseable,
        "flushes_triggered": metrics.flushes_triggered,
        "puts": stats.puts,
        "increments": stats.increments,
        "flush_failures": stats.flush_failures,
        "rows": store.row_count(mapping.table_name()),
        "wal_skipped": store_stats.wal_skipped,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    info!("Ingest complete");
    let failed = metrics.records_failed + unparseable;
    check_failures(failed, metrics.records_processed + failed, first_error)
}

/// Create the tables listed in the store section. Without any, the target
/// table is created with exactly the mapped families.
fn provision_memory_store(store_config: &StoreConfig, mapping: &TableMapping) -> MemoryStore {
    let store = MemoryStore::new();

    if store_config.tables.is_empty() {
        info!(table = %mapping.table_name(), "No tables configured, provisioning target table");
        store.create_table(mapping.table_name(), mapping.column_families());
    } else {
        for table in &store_config.tables {
            store.create_table(&table.name, table.families.iter().cloned());
        }
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowsink_core::config::TableSchemaConfig;
    use rowsink_core::{MappingError, TableConnector};
    use std::io::Write;

    fn config() -> Config {
        Config::from_toml(
            r#"
[table]
name = "events"
row_key_field = "id"

[[table.columns]]
family = "counters"
qualifiers = ["clicks"]

[sink]
mode = "increment"
"#,
        )
        .unwrap()
    }

    fn input(lines: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(lines.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_run_succeeds_when_every_record_lands() {
        let file = input("{\"id\": \"site\"}\n{\"id\": \"site\", \"clicks\": \"home\"}\n");
        let result = run(config(), Some(file.path().to_path_buf()), None).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_reports_mapping_failures() {
        let file = input("{\"clicks\": \"home\"}\n{\"id\": \"site\"}\n");

        let err = run(config(), Some(file.path().to_path_buf()), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 records failed");
        assert!(matches!(
            err.downcast_ref::<rowsink_core::Error>(),
            Some(rowsink_core::Error::Mapping(MappingError::FieldNotFound { ref field }))
                if field == "id"
        ));
    }

    #[tokio::test]
    async fn test_run_reports_unparseable_lines() {
        let file = input("not json\n{\"id\": \"site\"}\n");

        let err = run(config(), Some(file.path().to_path_buf()), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 records failed");
        assert!(err.downcast_ref::<rowsink_core::Error>().is_none());
        assert!(err.downcast_ref::<serde_json::Error>().is_some());
    }

    #[tokio::test]
    async fn test_provision_from_mapping() {
        let mut mapping = TableMapping::new("events", "id");
        mapping.add_column("data", "payload");

        let store = provision_memory_store(&StoreConfig::default(), &mapping);
        assert!(TableConnector::connect(&store, &mapping).await.is_ok());
    }

    #[tokio::test]
    async fn test_provision_from_config_keeps_schema_check() {
        let mut mapping = TableMapping::new("events", "id");
        mapping.add_column("data", "payload");
        let store_config = StoreConfig {
            backend: StoreBackend::Memory,
            tables: vec![TableSchemaConfig {
                name: "events".into(),
                families: vec!["counters".into()],
            }],
        };

        let store = provision_memory_store(&store_config, &mapping);
        assert!(TableConnector::connect(&store, &mapping).await.is_err());
    }
}
