//! Observable events
//!
//! Every log line carries an `event` field naming one of these, so
//! JSON logs can be filtered without parsing messages.

use std::fmt;

use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,
    /// Schema registry loaded from disk
    SchemasLoaded,
    /// A schema definition failed to load
    SchemaRejected,
    /// A collection schema was defined
    CollectionDefined,
    /// Schema registry written to disk
    RegistrySaved,

    // Validation
    /// Document passed validation
    DocumentAccepted,
    /// Document rejected by validation
    DocumentRejected,
    /// Violation tolerated because the validation action is `warn`
    ValidationWarning,

    // Encryption
    /// Derived encrypted document produced
    DocumentEncrypted,
    /// Derived decrypted document produced
    DocumentDecrypted,

    // Verification
    /// Source and target documents match
    DocumentMatched,
    /// Source document absent from target
    DocumentMissing,
    /// Source and target documents differ
    DocumentMismatched,
    /// Target document with no source counterpart
    DocumentUnexpected,
    /// `_id` occurring more than once on one side
    DuplicateId,
    /// CSV verification report written
    ReportWritten,
    /// Document comparison finished
    CompareComplete,
    /// Count comparison finished
    CountCompared,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SchemasLoaded => "SCHEMAS_LOADED",
            Event::SchemaRejected => "SCHEMA_REJECTED",
            Event::CollectionDefined => "COLLECTION_DEFINED",
            Event::RegistrySaved => "REGISTRY_SAVED",

            Event::DocumentAccepted => "DOCUMENT_ACCEPTED",
            Event::DocumentRejected => "DOCUMENT_REJECTED",
            Event::ValidationWarning => "VALIDATION_WARNING",

            Event::DocumentEncrypted => "DOCUMENT_ENCRYPTED",
            Event::DocumentDecrypted => "DOCUMENT_DECRYPTED",

            Event::DocumentMatched => "DOCUMENT_MATCHED",
            Event::DocumentMissing => "DOCUMENT_MISSING",
            Event::DocumentMismatched => "DOCUMENT_MISMATCHED",
            Event::DocumentUnexpected => "DOCUMENT_UNEXPECTED",
            Event::DuplicateId => "DUPLICATE_ID",
            Event::ReportWritten => "REPORT_WRITTEN",
            Event::CompareComplete => "COMPARE_COMPLETE",
            Event::CountCompared => "COUNT_COMPARED",
        }
    }

    /// Level the event is logged at
    pub fn level(&self) -> Level {
        match self {
            Event::SchemaRejected
            | Event::DocumentRejected
            | Event::ValidationWarning
            | Event::DocumentMissing
            | Event::DocumentMismatched
            | Event::DocumentUnexpected
            | Event::DuplicateId => Level::WARN,
            Event::DocumentAccepted
            | Event::DocumentEncrypted
            | Event::DocumentDecrypted
            | Event::DocumentMatched => Level::DEBUG,
            _ => Level::INFO,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
