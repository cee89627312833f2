//! Schema subsystem
//!
//! A collection schema declares field types, which fields are mandatory,
//! and which fields are encrypted and how. Schemas are checked once at load
//! time and are immutable afterwards.
//!
//! # Design Principles
//!
//! - Malformed schemas are rejected at load, never at validation time
//! - Validation is pure and deterministic
//! - A document is accepted or rejected as a whole

mod errors;
mod loader;
mod parse;
mod types;
mod validator;

pub use errors::{SchemaError, SchemaErrorCode, SchemaResult, Severity};
pub use loader::SchemaRegistry;
pub use parse::parse_key_id;
pub use types::{
    bson_type_of, join_path, Algorithm, BsonType, EncryptMetadata, EncryptedField, FieldSpec,
    KeyId, ObjectSchema, PlainField, SchemaDefinition, ValidationAction, ValidationLevel,
};
pub use validator::{validate, SchemaValidator, ValidatedDocument};
