//! Plan command implementation.

use super::check_failures;
use super::input::read_records;
use anyhow::Result;
use rowsink_core::{Config, MappingError, Record, SinkMode, TableMapping};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// Print the operation each record maps to, one JSON document per line.
pub fn run(config: Config, input: Option<PathBuf>) -> Result<()> {
    let mapping = config.table.to_mapping();
    let mode = SinkMode::from(&config.sink);
    let lines = read_records(input.as_deref())?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut planned = 0u64;
    let mut failed = 0u64;
    let mut first_error: Option<anyhow::Error> = None;

    for line in lines {
        let record = match line.record {
            Ok(record) => record,
            Err(e) => {
                warn!(line = line.line_no, error = %e, "Skipping unparseable record");
                failed += 1;
                first_error.get_or_insert_with(|| e.into());
                continue;
            }
        };

        match describe(&mapping, mode, &record) {
            Ok(op) => {
                writeln!(out, "{}", op)?;
                planned += 1;
            }
            Err(e) => {
                warn!(line = line.line_no, error = %e, "Record does not map");
                failed += 1;
                first_error.get_or_insert_with(|| rowsink_core::Error::from(e).into());
            }
        }
    }

    info!(planned, failed, table = %mapping.table_name(), "Plan complete");
    check_failures(failed, planned + failed, first_error)
}

fn describe<R: Record + ?Sized>(
    mapping: &TableMapping,
    mode: SinkMode,
    record: &R,
) -> std::result::Result<Value, MappingError> {
    Ok(match mode {
        SinkMode::Put => mapping.build_write_operation(record)?.describe(),
        SinkMode::Increment { delta } => mapping
            .build_increment_operation(record, delta)?
            .describe(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Config {
        Config::from_toml(
            r#"
[table]
name = "events"
row_key_field = "id"

[[table.columns]]
family = "data"
qualifiers = ["payload"]
"#,
        )
        .unwrap()
    }

    fn input(lines: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(lines.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_run_all_records_map() {
        let file = input("{\"id\": \"row1\", \"payload\": \"a\"}\n");
        assert!(run(config(), Some(file.path().to_path_buf())).is_ok());
    }

    #[test]
    fn test_run_reports_unmappable_records() {
        let file = input("{\"id\": \"row1\"}\n{\"payload\": \"b\"}\n");

        let err = run(config(), Some(file.path().to_path_buf())).unwrap_err();
        assert_eq!(err.to_string(), "2 of 2 records failed");
        assert!(matches!(
            err.downcast_ref::<rowsink_core::Error>(),
            Some(rowsink_core::Error::Mapping(MappingError::FieldNotFound { ref field }))
                if field == "payload"
        ));
    }

    #[test]
    fn test_describe_put() {
        let mut mapping = TableMapping::with_timestamp_field("events", "id", "ts");
        mapping.add_column("data", "payload");

        let op = describe(
            &mapping,
            SinkMode::Put,
            &json!({"id": "row1", "ts": 1000, "payload": "hello"}),
        )
        .unwrap();
        assert_eq!(op["op"], "put");
        assert_eq!(op["cells"][0]["timestamp"], 1000);
    }

    #[test]
    fn test_describe_increment() {
        let mut mapping = TableMapping::new("events", "id");
        mapping.add_column("counters", "clicks");

        let op = describe(
            &mapping,
            SinkMode::Increment { delta: 5 },
            &json!({"id": "row3"}),
        )
        .unwrap();
        assert_eq!(op["counters"][0]["counter"], "clicks");
        assert_eq!(op["counters"][0]["delta"], 5);
    }

    #[test]
    fn test_describe_missing_row_key() {
        let mapping = TableMapping::new("events", "id");
        let err = describe(&mapping, SinkMode::Put, &json!({})).unwrap_err();
        assert!(err.is_not_found());
    }
}
