//! fieldseal - field-level validation and encryption schemas for document
//! collections
//!
//! - `schema`: schema model, loader, registry and document validator
//! - `encryption`: encryption plans, envelopes and field ciphers
//! - `collection`: the write/read gate combining both
//! - `verify`: source/target comparison for migrations

pub mod cli;
pub mod collection;
pub mod encryption;
pub mod observability;
pub mod schema;
pub mod verify;

pub use collection::{CollectionGuard, PreparedDocument};
