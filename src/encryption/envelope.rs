//! Encrypted value framing
//!
//! An encrypted value is stored as BSON binary subtype 6:
//!
//! ```json
//! { "$binary": { "base64": "...", "subType": "06" } }
//! ```
//!
//! Payload layout:
//!   [ algorithm (1) | key id (16) | plaintext BSON type (1) | sealed bytes ]

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};

use super::cipher::SealContext;
use super::errors::{CryptoError, CryptoResult};
use crate::schema::{Algorithm, BsonType, KeyId};

/// BSON binary subtype for encrypted values
pub const ENCRYPTED_SUBTYPE: &str = "06";

const HEADER_LEN: usize = 1 + 16 + 1;

/// A decoded encrypted value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub algorithm: Algorithm,
    pub key_id: KeyId,
    /// Type of the plaintext value
    pub bson_type: BsonType,
    /// Cipher output
    pub sealed: Vec<u8>,
}

impl Envelope {
    /// What the sealed bytes are bound to
    pub fn context(&self) -> SealContext {
        SealContext::new(self.key_id, self.algorithm, self.bson_type)
    }

    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        let mut out = self.context().associated_data()?;
        out.reserve(self.sealed.len());
        out.extend_from_slice(&self.sealed);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() <= HEADER_LEN {
            return Err(CryptoError::malformed("payload too short"));
        }

        let algorithm = Algorithm::from_envelope_byte(bytes[0])
            .ok_or_else(|| CryptoError::malformed(format!("unknown algorithm byte {}", bytes[0])))?;

        let mut key = [0u8; 16];
        key.copy_from_slice(&bytes[1..17]);

        let bson_type = BsonType::from_type_byte(bytes[17])
            .ok_or_else(|| CryptoError::malformed(format!("unknown type byte {:#04x}", bytes[17])))?;

        Ok(Self {
            algorithm,
            key_id: KeyId::from_bytes(key),
            bson_type,
            sealed: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Extended JSON form
    pub fn to_value(&self) -> CryptoResult<Value> {
        Ok(json!({
            "$binary": {
                "base64": BASE64.encode(self.to_bytes()?),
                "subType": ENCRYPTED_SUBTYPE,
            }
        }))
    }

    /// Decodes an encrypted value. Fails if `value` is not one.
    pub fn from_value(value: &Value) -> CryptoResult<Self> {
        let encoded = encrypted_payload(value)
            .ok_or_else(|| CryptoError::malformed("value is not binary subtype 06"))?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::malformed(format!("invalid base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }
}

/// Returns whether `value` is an encrypted payload.
pub fn is_encrypted(value: &Value) -> bool {
    encrypted_payload(value).is_some()
}

fn encrypted_payload(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    let binary = map.get("$binary")?.as_object()?;
    if binary.get("subType")?.as_str()? != ENCRYPTED_SUBTYPE {
        return None;
    }
    binary.get("base64")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope {
            algorithm: Algorithm::Deterministic,
            key_id: "d1594b63-65c2-40b0-82ca-adfa1529cc7d".parse().unwrap(),
            bson_type: BsonType::String,
            sealed: vec![7; 40],
        }
    }

    #[test]
    fn test_value_form() {
        let value = sample().to_value().unwrap();
        assert_eq!(value["$binary"]["subType"], "06");
        assert!(is_encrypted(&value));
        assert_eq!(Envelope::from_value(&value).unwrap(), sample());
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample().to_bytes().unwrap();
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..17], sample().key_id.as_bytes());
        assert_eq!(bytes[17], 0x02);
        assert_eq!(bytes.len(), 18 + 40);
    }

    #[test]
    fn test_other_binary_subtypes_are_plain() {
        let value = json!({ "$binary": { "base64": "AAAA", "subType": "00" } });
        assert!(!is_encrypted(&value));
        assert!(Envelope::from_value(&value).is_err());
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let value = json!({ "$binary": { "base64": BASE64.encode([1u8; 10]), "subType": "06" } });
        assert!(matches!(
            Envelope::from_value(&value),
            Err(CryptoError::MalformedEnvelope { .. })
        ));
    }
}
