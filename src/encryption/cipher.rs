//! Crypto provider seam
//!
//! Key storage, key vaults and KMS access live behind this trait. The
//! crate only decides which fields are sealed and how the result is framed.

use super::errors::{CryptoError, CryptoResult};
use crate::schema::{Algorithm, BsonType, KeyId};

/// Everything a sealed value is bound to. Its associated data is the
/// envelope header, so none of the header bytes can be altered without
/// the value failing to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealContext {
    pub key_id: KeyId,
    pub algorithm: Algorithm,
    /// Type of the plaintext value
    pub bson_type: BsonType,
}

impl SealContext {
    pub fn new(key_id: KeyId, algorithm: Algorithm, bson_type: BsonType) -> Self {
        Self {
            key_id,
            algorithm,
            bson_type,
        }
    }

    /// Header bytes: [ algorithm (1) | key id (16) | plaintext BSON type (1) ]
    pub fn associated_data(&self) -> CryptoResult<Vec<u8>> {
        let type_byte = self.bson_type.type_byte().ok_or_else(|| {
            CryptoError::malformed(format!("{} is not a concrete type", self.bson_type))
        })?;

        let mut out = Vec::with_capacity(18);
        out.push(self.algorithm.envelope_byte());
        out.extend_from_slice(self.key_id.as_bytes());
        out.push(type_byte);
        Ok(out)
    }
}

/// Seals and opens field plaintexts under a data key.
///
/// `Deterministic` sealing must be a pure function of (key, context,
/// plaintext) so equality queries keep working; `Random` sealing must
/// differ on every call. Implementations must authenticate
/// `context.associated_data()`.
pub trait FieldCipher: Send + Sync {
    fn seal(&self, context: &SealContext, plaintext: &[u8]) -> CryptoResult<Vec<u8>>;

    fn open(&self, context: &SealContext, sealed: &[u8]) -> CryptoResult<Vec<u8>>;
}
