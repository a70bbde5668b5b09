//! CLI subcommands.

pub mod ingest;
mod input;
pub mod plan;

/// Turn a run that left records behind into an error carrying the first
/// failure, so the exit code reflects what went wrong.
fn check_failures(failed: u64, total: u64, first: Option<anyhow::Error>) -> anyhow::Result<()> {
    match first {
        Some(e) if failed > 0 => Err(e.context(format!("{} of {} records failed", failed, total))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowsink_core::MappingError;

    #[test]
    fn test_no_failures() {
        assert!(check_failures(0, 10, None).is_ok());
    }

    #[test]
    fn test_failure_keeps_core_error() {
        let first = anyhow::Error::from(rowsink_core::Error::from(MappingError::FieldNotFound {
            field: "id".into(),
        }));

        let err = check_failures(2, 5, Some(first)).unwrap_err();
        assert_eq!(err.to_string(), "2 of 5 records failed");
        assert!(matches!(
            err.downcast_ref::<rowsink_core::Error>(),
            Some(rowsink_core::Error::Mapping(_))
        ));
    }
}
