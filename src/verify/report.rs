//! CSV verification reports
//!
//! One file per verification strategy, written as
//! `<dir>/<yyyy-MM-dd_HH-mm-ss>_<name>.csv` with a header row followed by
//! one row per collection.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use super::compare::CompareReport;
use super::count::{CountOutcome, CountReport};
use crate::observability::Event;

/// Report name of the count strategy
pub const COUNT_REPORT: &str = "count";
/// Report name of the document comparison strategy
pub const DOC_COMPARE_REPORT: &str = "doc_compare";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create report directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write report {path}: {source}")]
    Write { path: PathBuf, source: csv::Error },
}

/// Row of the count report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountRow {
    #[serde(rename = "Database")]
    pub database: String,
    #[serde(rename = "Collection")]
    pub collection: String,
    #[serde(rename = "Source Count")]
    pub source_count: u64,
    #[serde(rename = "Target Count")]
    pub target_count: u64,
    #[serde(rename = "Result")]
    pub result: &'static str,
}

impl CountRow {
    pub fn new(namespace: &Namespace, report: &CountReport) -> Self {
        let result = match report.outcome {
            CountOutcome::Valid => "Match",
            CountOutcome::Invalid => "Mismatch",
            CountOutcome::Skipped => "Skipped",
        };
        Self {
            database: namespace.database.clone(),
            collection: namespace.collection.clone(),
            source_count: report.source,
            target_count: report.target,
            result,
        }
    }
}

/// Row of the document comparison report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocCompareRow {
    #[serde(rename = "Database")]
    pub database: String,
    #[serde(rename = "Collection")]
    pub collection: String,
    #[serde(rename = "Total Source Documents")]
    pub source_total: usize,
    #[serde(rename = "Comparison Result")]
    pub result: &'static str,
}

impl DocCompareRow {
    pub fn new(namespace: &Namespace, report: &CompareReport) -> Self {
        Self {
            database: namespace.database.clone(),
            collection: namespace.collection.clone(),
            source_total: report.source_total(),
            result: if report.is_valid() { "Match" } else { "Mismatch" },
        }
    }
}

/// Database and collection a report row describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    /// Splits `<db>.<collection>` at the first dot. A name without a dot
    /// is a collection in an unnamed database.
    pub fn parse(namespace: &str) -> Self {
        match namespace.split_once('.') {
            Some((database, collection)) => Self {
                database: database.to_string(),
                collection: collection.to_string(),
            },
            None => Self {
                database: String::new(),
                collection: namespace.to_string(),
            },
        }
    }
}

/// A named CSV report
#[derive(Debug, Clone)]
pub struct ValidationReport<R> {
    name: String,
    rows: Vec<R>,
}

impl<R: Serialize> ValidationReport<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(mut self, row: R) -> Self {
        self.rows.push(row);
        self
    }

    /// File name for a report generated at `at`.
    pub fn file_name(&self, at: DateTime<Local>) -> String {
        format!("{}_{}.csv", at.format(TIMESTAMP_FORMAT), self.name)
    }

    /// Writes the report into `dir`, creating it if needed, and returns the
    /// path of the new file.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(dir).map_err(|source| ReportError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(self.file_name(Local::now()));
        let write_err = |source: csv::Error| ReportError::Write {
            path: path.clone(),
            source,
        };

        let mut writer = csv::Writer::from_path(&path).map_err(write_err)?;
        for row in &self.rows {
            writer.serialize(row).map_err(write_err)?;
        }
        writer.flush().map_err(|e| write_err(e.into()))?;

        tracing::info!(
            event = %Event::ReportWritten,
            report = %self.name,
            path = %path.display(),
            rows = self.rows.len(),
            "report written"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::{compare_counts, CountOptions};
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_namespace_split() {
        assert_eq!(
            Namespace::parse("app.users.archive"),
            Namespace {
                database: "app".into(),
                collection: "users.archive".into()
            }
        );
        assert_eq!(Namespace::parse("users").database, "");
    }

    #[test]
    fn test_file_name_format() {
        let report: ValidationReport<CountRow> = ValidationReport::new(COUNT_REPORT);
        let at = Local.with_ymd_and_hms(2024, 5, 1, 9, 3, 7).unwrap();
        assert_eq!(report.file_name(at), "2024-05-01_09-03-07_count.csv");
    }

    #[test]
    fn test_count_report_written() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("reports");
        let namespace = Namespace::parse("app.users");

        let path = ValidationReport::new(COUNT_REPORT)
            .add_row(CountRow::new(&namespace, &compare_counts(5, 4, CountOptions::default())))
            .write_to(&dir)
            .unwrap();

        assert!(path.starts_with(&dir));
        assert!(path.file_name().unwrap().to_str().unwrap().ends_with("_count.csv"));

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Database,Collection,Source Count,Target Count,Result");
        assert_eq!(lines[1], "app,users,5,4,Mismatch");
    }

    #[test]
    fn test_doc_compare_row() {
        let namespace = Namespace::parse("app.users");
        let row = DocCompareRow::new(&namespace, &CompareReport::default());
        assert_eq!(row.source_total, 0);
        assert_eq!(row.result, "Match");
    }
}
