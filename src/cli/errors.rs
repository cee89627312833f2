//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero exit. Per-document
//! rejections are not CLI errors; they are written to stdout as error
//! responses and processing continues.

use std::fmt;
use std::io;

use crate::encryption::CryptoError;
use crate::schema::{SchemaError, SchemaErrorCode};
use crate::verify::ReportError;

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdin/stdout)
    IoError,
    /// Schema file or namespace error
    SchemaError,
    /// Key file or cipher error
    CryptoError,
    /// Source and target did not match
    VerificationFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "FIELDSEAL_CLI_CONFIG_ERROR",
            Self::IoError => "FIELDSEAL_CLI_IO_ERROR",
            Self::SchemaError => "FIELDSEAL_CLI_SCHEMA_ERROR",
            Self::CryptoError => "FIELDSEAL_CLI_CRYPTO_ERROR",
            Self::VerificationFailed => "FIELDSEAL_CLI_VERIFICATION_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn verification_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::VerificationFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<SchemaError> for CliError {
    fn from(e: SchemaError) -> Self {
        let code = match e.code() {
            SchemaErrorCode::Io => CliErrorCode::IoError,
            _ => CliErrorCode::SchemaError,
        };
        Self::new(code, format!("{}: {}", e.code(), e))
    }
}

impl From<CryptoError> for CliError {
    fn from(e: CryptoError) -> Self {
        Self::new(CliErrorCode::CryptoError, format!("{}: {}", e.code(), e))
    }
}

impl From<ReportError> for CliError {
    fn from(e: ReportError) -> Self {
        Self::io_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
