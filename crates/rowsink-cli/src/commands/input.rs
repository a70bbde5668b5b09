//! Newline-delimited JSON record input.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One input line: its 1-based line number and the parsed record.
pub struct InputLine {
    pub line_no: usize,
    pub record: std::result::Result<Value, serde_json::Error>,
}

/// Read records from a file, or stdin when no path is given.
///
/// Blank lines are skipped. Lines that fail to parse are returned as errors
/// rather than aborting the whole read.
pub fn read_records(path: Option<&Path>) -> Result<Vec<InputLine>> {
    let reader: Box<dyn BufRead> = match path {
        Some(p) => Box::new(BufReader::new(
            File::open(p).with_context(|| format!("Failed to open input {}", p.display()))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    };
    parse_lines(reader)
}

fn parse_lines(reader: impl BufRead) -> Result<Vec<InputLine>> {
    let mut lines = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        lines.push(InputLine {
            line_no: idx + 1,
            record: serde_json::from_str(&line),
        });
    }
    Ok(lines)
}
