//! JSON-lines I/O for the CLI
//!
//! - Input: one JSON document per line (stdin or a file); blank lines are skipped
//! - Output: one JSON response per line on stdout
//! - UTF-8 only

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Parses JSON-lines from any reader. Each item is one document or the
/// error for its line.
pub fn read_lines<R: BufRead>(reader: R) -> impl Iterator<Item = CliResult<Value>> {
    reader.lines().enumerate().filter_map(|(index, line)| {
        let line = match line {
            Ok(line) => line,
            Err(e) => return Some(Err(CliError::from(e))),
        };
        if line.trim().is_empty() {
            return None;
        }
        Some(serde_json::from_str(&line).map_err(|e| {
            CliError::io_error(format!("line {}: invalid JSON: {}", index + 1, e))
        }))
    })
}

/// Read documents from stdin
pub fn read_documents() -> impl Iterator<Item = CliResult<Value>> {
    read_lines(io::stdin().lock())
}

/// Read every document of a JSON-lines file. Fails on the first bad line.
pub fn read_document_file(path: &Path) -> CliResult<Vec<Value>> {
    let file = File::open(path)
        .map_err(|e| CliError::io_error(format!("failed to open {}: {}", path.display(), e)))?;
    read_lines(BufReader::new(file)).collect()
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_json(&serde_json::json!({
        "status": "ok",
        "data": data
    }))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_json(&serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    }))
}

/// Write one JSON value as a line on stdout
pub fn write_json(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
