//! CLI module for fieldseal
//!
//! Provides command-line interface for:
//! - check: Summarise the schema file
//! - define: Add a collection definition
//! - validate / annotate / encrypt / decrypt: JSON-lines document filters
//! - compare: Verify a migrated document set and write CSV reports

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    annotate_documents, check, compare, decrypt, define, encrypt, run, run_command, validate,
    CompareRequest,
};
pub use config::Config;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_document_file, read_lines, write_error, write_response};
