//! rowsink CLI - map JSON records onto wide-column writes.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rowsink_core::config::LogFormat;
use rowsink_core::Config;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit codes for CLI operations.
///
/// Following Unix conventions:
/// - 0: Success
/// - 1-127: Application errors
#[repr(i32)]
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// Configuration error (invalid config file, missing required fields)
    ConfigError = 1,
    /// Record mapping error (missing or mistyped field)
    MappingError = 2,
    /// Store error (connection, schema, write)
    StoreError = 3,
    /// General runtime error
    RuntimeError = 10,
}

impl ExitCode {
    /// Convert an error to an exit code.
    fn from_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<rowsink_core::Error>() {
            Some(rowsink_core::Error::Config(_)) => return ExitCode::ConfigError,
            Some(rowsink_core::Error::Mapping(_)) => return ExitCode::MappingError,
            Some(rowsink_core::Error::Store(_)) => return ExitCode::StoreError,
            _ => {}
        }

        let error_str = error.to_string().to_lowercase();
        if error_str.contains("config") || error_str.contains("toml") {
            ExitCode::ConfigError
        } else {
            ExitCode::RuntimeError
        }
    }
}

mod commands;

#[derive(Parser)]
#[command(name = "rowsink")]
#[command(about = "Map JSON records onto wide-column row writes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the operation built for each record without writing it
    Plan {
        /// Newline-delimited JSON records (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Write records to the configured store
    Ingest {
        /// Newline-delimited JSON records (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Override the target table
        #[arg(long)]
        table: Option<String>,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() {
    let exit_code = run_cli().await;
    std::process::exit(exit_code as i32);
}

/// Main CLI execution logic with proper error handling.
async fn run_cli() -> ExitCode {
    let cli = Cli::parse();

    // Logging settings come from the config when it parses; JSON/info otherwise
    let monitoring = cli
        .config
        .as_ref()
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| toml::from_str::<Config>(&content).ok())
        .map(|config| config.monitoring)
        .unwrap_or_default();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new(monitoring.log_level.as_str()),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Logs go to stderr so command output on stdout stays machine-readable
    match monitoring.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }

    match execute_command(cli).await {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::from_error(&e)
        }
    }
}

/// Execute the CLI command.
async fn execute_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Plan { input } => {
            let config = load_config(&cli.config)?;
            commands::plan::run(config, input)?;
        }

        Commands::Ingest { input, table } => {
            let config = load_config(&cli.config)?;
            commands::ingest::run(config, input, table).await?;
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;
            println!(
                "Configuration is valid: table '{}', {} column(s)",
                config.table.name,
                config.table.to_mapping().columns().count()
            );
        }
    }

    Ok(())
}

fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    let path = path.clone().unwrap_or_else(|| PathBuf::from("rowsink.toml"));
    Ok(Config::from_file(&path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowsink_core::{MappingError, StoreError};

    #[test]
    fn test_exit_code_for_failed_records() {
        let mapping = anyhow::Error::from(rowsink_core::Error::from(MappingError::FieldNotFound {
            field: "id".into(),
        }))
        .context("3 of 4 records failed");
        assert_eq!(ExitCode::from_error(&mapping) as i32, 2);

        let store = anyhow::Error::from(rowsink_core::Error::from(StoreError::WriteFailed(
            "injected put failure".into(),
        )))
        .context("1 of 4 records failed");
        assert_eq!(ExitCode::from_error(&store) as i32, 3);

        let unparseable = anyhow::anyhow!("expected value at line 1 column 1")
            .context("1 of 1 records failed");
        assert_eq!(ExitCode::from_error(&unparseable) as i32, 10);
    }
}
