//! Schema error types
//!
//! Error codes:
//! - FIELDSEAL_MISSING_REQUIRED_FIELD (REJECT)
//! - FIELDSEAL_TYPE_MISMATCH (REJECT)
//! - FIELDSEAL_UNKNOWN_FIELD (REJECT)
//! - FIELDSEAL_UNKNOWN_ALGORITHM (FATAL when raised while loading)
//! - FIELDSEAL_MALFORMED_SCHEMA (FATAL)
//! - FIELDSEAL_UNKNOWN_NAMESPACE (REJECT)
//! - FIELDSEAL_NAMESPACE_EXISTS (REJECT)
//! - FIELDSEAL_SCHEMA_IO (FATAL)

use std::fmt;

use thiserror::Error;

/// Severity levels for schema errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The document or request is rejected; the schema stays usable
    Reject,
    /// The schema itself is unusable
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Stable machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    MissingRequiredField,
    TypeMismatch,
    UnknownField,
    UnknownAlgorithm,
    MalformedSchema,
    UnknownNamespace,
    NamespaceExists,
    Io,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::MissingRequiredField => "FIELDSEAL_MISSING_REQUIRED_FIELD",
            SchemaErrorCode::TypeMismatch => "FIELDSEAL_TYPE_MISMATCH",
            SchemaErrorCode::UnknownField => "FIELDSEAL_UNKNOWN_FIELD",
            SchemaErrorCode::UnknownAlgorithm => "FIELDSEAL_UNKNOWN_ALGORITHM",
            SchemaErrorCode::MalformedSchema => "FIELDSEAL_MALFORMED_SCHEMA",
            SchemaErrorCode::UnknownNamespace => "FIELDSEAL_UNKNOWN_NAMESPACE",
            SchemaErrorCode::NamespaceExists => "FIELDSEAL_NAMESPACE_EXISTS",
            SchemaErrorCode::Io => "FIELDSEAL_SCHEMA_IO",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            SchemaErrorCode::MalformedSchema
            | SchemaErrorCode::UnknownAlgorithm
            | SchemaErrorCode::Io => Severity::Fatal,
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema and document validation errors.
///
/// Field paths are dotted for nested objects (`address.city`); `$root`
/// names the document itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("missing required field '{field}'")]
    MissingRequiredField { field: String },

    #[error("field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("field '{field}' is not declared in the schema")]
    UnknownField { field: String },

    #[error("field '{field}': unknown encryption algorithm '{algorithm}'")]
    UnknownAlgorithm { field: String, algorithm: String },

    #[error("malformed schema '{origin}': {reason}")]
    MalformedSchema { origin: String, reason: String },

    #[error("no schema defined for namespace '{namespace}'")]
    UnknownNamespace { namespace: String },

    #[error("namespace '{namespace}' already has a schema")]
    NamespaceExists { namespace: String },

    #[error("schema file '{path}': {reason}")]
    Io { path: String, reason: String },
}

impl SchemaError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        SchemaError::MissingRequiredField {
            field: field.into(),
        }
    }

    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        SchemaError::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn unknown_field(field: impl Into<String>) -> Self {
        SchemaError::UnknownField {
            field: field.into(),
        }
    }

    pub fn unknown_algorithm(field: impl Into<String>, algorithm: impl Into<String>) -> Self {
        SchemaError::UnknownAlgorithm {
            field: field.into(),
            algorithm: algorithm.into(),
        }
    }

    pub fn malformed(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::MalformedSchema {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// Schema file could not be read or written
    pub fn io(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::Io {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        match self {
            SchemaError::MissingRequiredField { .. } => SchemaErrorCode::MissingRequiredField,
            SchemaError::TypeMismatch { .. } => SchemaErrorCode::TypeMismatch,
            SchemaError::UnknownField { .. } => SchemaErrorCode::UnknownField,
            SchemaError::UnknownAlgorithm { .. } => SchemaErrorCode::UnknownAlgorithm,
            SchemaError::MalformedSchema { .. } => SchemaErrorCode::MalformedSchema,
            SchemaError::UnknownNamespace { .. } => SchemaErrorCode::UnknownNamespace,
            SchemaError::NamespaceExists { .. } => SchemaErrorCode::NamespaceExists,
            SchemaError::Io { .. } => SchemaErrorCode::Io,
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code().severity()
    }

    /// Returns the offending field path, if the error concerns a field
    pub fn field(&self) -> Option<&str> {
        match self {
            SchemaError::MissingRequiredField { field }
            | SchemaError::TypeMismatch { field, .. }
            | SchemaError::UnknownField { field }
            | SchemaError::UnknownAlgorithm { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Returns whether this error makes the schema itself unusable
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SchemaError::missing_field("username").code().code(),
            "FIELDSEAL_MISSING_REQUIRED_FIELD"
        );
        assert_eq!(
            SchemaError::unknown_field("x").code().code(),
            "FIELDSEAL_UNKNOWN_FIELD"
        );
        assert_eq!(
            SchemaError::malformed("schema.json", "bad").code().code(),
            "FIELDSEAL_MALFORMED_SCHEMA"
        );
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(SchemaErrorCode::TypeMismatch.severity(), Severity::Reject);
        assert_eq!(SchemaErrorCode::MalformedSchema.severity(), Severity::Fatal);
        assert!(SchemaError::unknown_algorithm("ssn", "rot13").is_fatal());
        assert!(!SchemaError::missing_field("username").is_fatal());
    }

    #[test]
    fn test_display_names_field() {
        let err = SchemaError::type_mismatch("username", "string", "int");
        let display = err.to_string();
        assert!(display.contains("username"));
        assert!(display.contains("string"));
        assert!(display.contains("int"));
        assert_eq!(err.field(), Some("username"));
    }
}
