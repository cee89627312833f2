//! Local field cipher
//!
//! XChaCha20-Poly1305 under a single 32-byte data key.
//! Sealed bytes: [ nonce (24 bytes) | ciphertext + tag ]
//!
//! Random sealing draws the nonce from the OS RNG. Deterministic sealing
//! derives it as HMAC-SHA256(key, label | header | plaintext) truncated
//! to 24 bytes, so equal plaintexts seal identically under one key.
//!
//! The whole envelope header (algorithm, key id and plaintext type) is
//! bound as associated data.

use std::fmt;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::cipher::{FieldCipher, SealContext};
use super::errors::{CryptoError, CryptoResult};
use crate::schema::{Algorithm, KeyId};

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 24;
const NONCE_LABEL: &[u8] = b"fieldseal-deterministic-nonce";

/// Key file contents: `{"keyId": "<uuid>", "key": "<base64 of 32 bytes>"}`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct KeyFile {
    key_id: KeyId,
    key: String,
}

/// Cipher holding one data key
pub struct LocalCipher {
    key_id: KeyId,
    key: Zeroizing<[u8; 32]>,
}

impl LocalCipher {
    pub fn new(key_id: KeyId, key: [u8; 32]) -> Self {
        Self {
            key_id,
            key: Zeroizing::new(key),
        }
    }

    /// Loads the data key from a JSON key file.
    pub fn from_key_file(path: &Path) -> CryptoResult<Self> {
        let content = Zeroizing::new(fs::read_to_string(path).map_err(|e| {
            CryptoError::invalid_key(format!("failed to read {}: {}", path.display(), e))
        })?);
        Self::from_key_json(&content)
    }

    /// Parses key file contents.
    pub fn from_key_json(content: &str) -> CryptoResult<Self> {
        let file: KeyFile = serde_json::from_str(content)
            .map_err(|e| CryptoError::invalid_key(format!("invalid key file: {}", e)))?;

        let bytes = Zeroizing::new(
            BASE64
                .decode(file.key.as_bytes())
                .map_err(|e| CryptoError::invalid_key(format!("key is not base64: {}", e)))?,
        );
        let key: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::invalid_key(format!("key must be 32 bytes, got {}", bytes.len())))?;

        Ok(Self::new(file.key_id, key))
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    fn check_key(&self, key_id: &KeyId) -> CryptoResult<()> {
        if *key_id != self.key_id {
            return Err(CryptoError::UnknownKey { key_id: *key_id });
        }
        Ok(())
    }

    fn aead(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(self.key.as_slice()))
    }

    fn deterministic_nonce(&self, aad: &[u8], plaintext: &[u8]) -> CryptoResult<[u8; NONCE_LEN]> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.key.as_slice())
            .map_err(|e| CryptoError::invalid_key(e.to_string()))?;
        mac.update(NONCE_LABEL);
        mac.update(aad);
        mac.update(plaintext);
        let digest = mac.finalize().into_bytes();

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&digest[..NONCE_LEN]);
        Ok(nonce)
    }
}

impl fmt::Debug for LocalCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCipher")
            .field("key_id", &self.key_id)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl FieldCipher for LocalCipher {
    fn seal(&self, context: &SealContext, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        self.check_key(&context.key_id)?;
        let aad = context.associated_data()?;

        let nonce = match context.algorithm {
            Algorithm::Deterministic => self.deterministic_nonce(&aad, plaintext)?,
            Algorithm::Random => {
                let mut nonce = [0u8; NONCE_LEN];
                OsRng.fill_bytes(&mut nonce);
                nonce
            }
        };

        let ciphertext = self
            .aead()
            .encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad: &aad })
            .map_err(|_| CryptoError::encrypt("<value>", "AEAD encryption failed"))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open(&self, context: &SealContext, sealed: &[u8]) -> CryptoResult<Vec<u8>> {
        self.check_key(&context.key_id)?;
        let aad = context.associated_data()?;

        if sealed.len() < NONCE_LEN {
            return Err(CryptoError::malformed("sealed value shorter than nonce"));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        self.aead()
            .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad: &aad })
            .map_err(|_| CryptoError::decrypt("<value>", "authentication failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BsonType;

    fn cipher() -> LocalCipher {
        LocalCipher::new(
            "d1594b63-65c2-40b0-82ca-adfa1529cc7d".parse().unwrap(),
            [42u8; 32],
        )
    }

    fn context(cipher: &LocalCipher, algorithm: Algorithm) -> SealContext {
        SealContext::new(cipher.key_id(), algorithm, BsonType::String)
    }

    #[test]
    fn test_deterministic_is_stable() {
        let cipher = cipher();
        let ctx = context(&cipher, Algorithm::Deterministic);
        let a = cipher.seal(&ctx, b"123-45-6789").unwrap();
        let b = cipher.seal(&ctx, b"123-45-6789").unwrap();
        let c = cipher.seal(&ctx, b"987-65-4321").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_random_differs_per_call() {
        let cipher = cipher();
        let ctx = context(&cipher, Algorithm::Random);
        let a = cipher.seal(&ctx, b"secret").unwrap();
        let b = cipher.seal(&ctx, b"secret").unwrap();

        assert_ne!(a, b);
        assert_eq!(cipher.open(&ctx, &a).unwrap(), b"secret");
        assert_eq!(cipher.open(&ctx, &b).unwrap(), b"secret");
    }

    #[test]
    fn test_wrong_key_id_rejected() {
        let cipher = cipher();
        let other: KeyId = "00000000-0000-4000-8000-000000000000".parse().unwrap();
        let ctx = SealContext::new(other, Algorithm::Random, BsonType::String);
        let result = cipher.seal(&ctx, b"x");
        assert!(matches!(result, Err(CryptoError::UnknownKey { .. })));
    }

    #[test]
    fn test_tampering_detected() {
        let cipher = cipher();
        let ctx = context(&cipher, Algorithm::Random);
        let mut sealed = cipher.seal(&ctx, b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        assert!(cipher.open(&ctx, &sealed).is_err());
    }

    #[test]
    fn test_algorithm_is_authenticated() {
        let cipher = cipher();
        let sealed = cipher
            .seal(&context(&cipher, Algorithm::Deterministic), b"secret")
            .unwrap();
        assert!(cipher.open(&context(&cipher, Algorithm::Random), &sealed).is_err());
    }

    #[test]
    fn test_plaintext_type_is_authenticated() {
        let cipher = cipher();
        let as_int = SealContext::new(cipher.key_id(), Algorithm::Random, BsonType::Int);
        let as_long = SealContext::new(cipher.key_id(), Algorithm::Random, BsonType::Long);

        let sealed = cipher.seal(&as_int, b"42").unwrap();
        assert_eq!(cipher.open(&as_int, &sealed).unwrap(), b"42");
        assert!(cipher.open(&as_long, &sealed).is_err());
    }

    #[test]
    fn test_key_file_parsing() {
        let json = format!(
            r#"{{"keyId": "d1594b63-65c2-40b0-82ca-adfa1529cc7d", "key": "{}"}}"#,
            BASE64.encode([42u8; 32])
        );
        let loaded = LocalCipher::from_key_json(&json).unwrap();
        assert_eq!(loaded.key_id(), cipher().key_id());

        let short = format!(
            r#"{{"keyId": "d1594b63-65c2-40b0-82ca-adfa1529cc7d", "key": "{}"}}"#,
            BASE64.encode([1u8; 16])
        );
        assert!(matches!(
            LocalCipher::from_key_json(&short),
            Err(CryptoError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", cipher());
        assert!(debug.contains("redacted"));
        assert!(!debug.contains("42"));
    }
}
