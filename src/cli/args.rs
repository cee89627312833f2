//! CLI argument definitions using clap
//!
//! Commands:
//! - fieldseal check --config <path>
//! - fieldseal define --namespace <ns> --schema <file>
//! - fieldseal validate --namespace <ns>
//! - fieldseal annotate --namespace <ns>
//! - fieldseal encrypt --namespace <ns>
//! - fieldseal decrypt
//! - fieldseal compare --source <file> --target <file> [--decrypt]
//!   [--namespace <ns>] [--report <dir>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fieldseal - field-level validation and encryption for document collections
#[derive(Parser, Debug)]
#[command(name = "fieldseal")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the schema file and summarise each collection
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./fieldseal.json")]
        config: PathBuf,
    },

    /// Add a collection definition to the schema file
    Define {
        /// Path to configuration file
        #[arg(long, default_value = "./fieldseal.json")]
        config: PathBuf,

        /// Namespace in the form <db>.<collection>
        #[arg(long)]
        namespace: String,

        /// JSON file holding the collection definition
        #[arg(long)]
        schema: PathBuf,
    },

    /// Validate JSON-lines documents read from stdin
    Validate {
        /// Path to configuration file
        #[arg(long, default_value = "./fieldseal.json")]
        config: PathBuf,

        #[arg(long)]
        namespace: String,
    },

    /// Print the encryption plan of each document read from stdin
    Annotate {
        /// Path to configuration file
        #[arg(long, default_value = "./fieldseal.json")]
        config: PathBuf,

        #[arg(long)]
        namespace: String,
    },

    /// Validate and encrypt documents read from stdin
    Encrypt {
        /// Path to configuration file
        #[arg(long, default_value = "./fieldseal.json")]
        config: PathBuf,

        #[arg(long)]
        namespace: String,
    },

    /// Decrypt every encrypted value in documents read from stdin
    Decrypt {
        /// Path to configuration file
        #[arg(long, default_value = "./fieldseal.json")]
        config: PathBuf,
    },

    /// Compare a source document set with its migrated target
    Compare {
        /// Path to configuration file
        #[arg(long, default_value = "./fieldseal.json")]
        config: PathBuf,

        /// JSON-lines file of source documents
        #[arg(long)]
        source: PathBuf,

        /// JSON-lines file of target documents
        #[arg(long)]
        target: PathBuf,

        /// Decrypt both sides before comparing
        #[arg(long)]
        decrypt: bool,

        /// Namespace named in the report; defaults to the source file stem
        #[arg(long)]
        namespace: Option<String>,

        /// Directory to write CSV reports into
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

impl Command {
    /// Configuration file every command takes
    pub fn config_path(&self) -> &PathBuf {
        match self {
            Command::Check { config }
            | Command::Define { config, .. }
            | Command::Validate { config, .. }
            | Command::Annotate { config, .. }
            | Command::Encrypt { config, .. }
            | Command::Decrypt { config }
            | Command::Compare { config, .. } => config,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
