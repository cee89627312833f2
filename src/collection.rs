//! Collection write/read gate
//!
//! Write path: validate → annotate → encrypt.
//! Read path: decrypt.
//!
//! Any error rejects the whole document; nothing is partially applied.

use std::sync::Arc;

use serde_json::Value;

use crate::encryption::{self, annotate, CryptoResult, EncryptionPlan, FieldCipher};
use crate::observability::Event;
use crate::schema::{SchemaDefinition, SchemaError, SchemaValidator};

/// A document ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedDocument {
    /// Document with every planned field encrypted
    pub document: Value,
    pub plan: EncryptionPlan,
    /// Violations tolerated by a `warn` validation action
    pub warnings: Vec<SchemaError>,
}

/// Applies one collection's schema to documents crossing the storage
/// boundary.
pub struct CollectionGuard<C: FieldCipher + ?Sized> {
    namespace: String,
    schema: Arc<SchemaDefinition>,
    cipher: Arc<C>,
}

impl<C: FieldCipher + ?Sized> CollectionGuard<C> {
    pub fn new(namespace: impl Into<String>, schema: Arc<SchemaDefinition>, cipher: Arc<C>) -> Self {
        Self {
            namespace: namespace.into(),
            schema,
            cipher,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    /// Validates, annotates and encrypts a document for insertion.
    pub fn prepare_insert(&self, document: &Value) -> CryptoResult<PreparedDocument> {
        match self.prepare(document) {
            Ok(prepared) => {
                tracing::debug!(
                    event = %Event::DocumentEncrypted,
                    namespace = %self.namespace,
                    fields = prepared.plan.encrypted().count(),
                    "document prepared"
                );
                Ok(prepared)
            }
            Err(err) => {
                tracing::warn!(
                    event = %Event::DocumentRejected,
                    namespace = %self.namespace,
                    code = err.code(),
                    "{}",
                    err
                );
                Err(err)
            }
        }
    }

    /// Decrypts a stored document.
    pub fn open_read(&self, document: &Value) -> CryptoResult<Value> {
        let opened = encryption::decrypt_document(document, self.cipher.as_ref())?;
        tracing::debug!(event = %Event::DocumentDecrypted, namespace = %self.namespace, "document opened");
        Ok(opened)
    }

    fn prepare(&self, document: &Value) -> CryptoResult<PreparedDocument> {
        let validated = SchemaValidator::new(&self.schema).validate_document(document)?;
        let warnings = validated.warnings().to_vec();

        let plan = annotate(document, &self.schema)?;
        let sealed = encryption::encrypt_document(document, &plan, self.cipher.as_ref())?;

        Ok(PreparedDocument {
            document: sealed,
            plan,
            warnings,
        })
    }
}
