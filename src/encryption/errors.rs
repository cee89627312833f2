//! Encryption error types

use thiserror::Error;

use crate::schema::{KeyId, SchemaError};

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("no key loaded for key id {key_id}")]
    UnknownKey { key_id: KeyId },

    #[error("malformed encrypted payload: {reason}")]
    MalformedEnvelope { reason: String },

    #[error("encryption of '{field}' failed: {reason}")]
    Encrypt { field: String, reason: String },

    #[error("decryption of '{field}' failed: {reason}")]
    Decrypt { field: String, reason: String },

    #[error("invalid key material: {reason}")]
    InvalidKey { reason: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl CryptoError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        CryptoError::MalformedEnvelope {
            reason: reason.into(),
        }
    }

    pub fn encrypt(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CryptoError::Encrypt {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn decrypt(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CryptoError::Decrypt {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_key(reason: impl Into<String>) -> Self {
        CryptoError::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            CryptoError::UnknownKey { .. } => "FIELDSEAL_UNKNOWN_KEY",
            CryptoError::MalformedEnvelope { .. } => "FIELDSEAL_MALFORMED_ENVELOPE",
            CryptoError::Encrypt { .. } => "FIELDSEAL_ENCRYPT_FAILED",
            CryptoError::Decrypt { .. } => "FIELDSEAL_DECRYPT_FAILED",
            CryptoError::InvalidKey { .. } => "FIELDSEAL_INVALID_KEY",
            CryptoError::Schema(err) => err.code().code(),
        }
    }
}

/// Result type for encryption operations
pub type CryptoResult<T> = Result<T, CryptoError>;
