//! Field-level encryption
//!
//! - `plan`: which fields are encrypted and with which algorithm
//! - `envelope`: binary subtype 6 framing of encrypted values
//! - `cipher`: crypto provider seam
//! - `local`: XChaCha20-Poly1305 provider backed by a key file
//! - `document`: applies a plan to a document, and reverses it

pub mod cipher;
pub mod document;
pub mod envelope;
pub mod errors;
pub mod local;
pub mod plan;

pub use cipher::{FieldCipher, SealContext};
pub use document::{decrypt_document, decrypt_value, encrypt_document, encrypt_value};
pub use envelope::{is_encrypted, Envelope, ENCRYPTED_SUBTYPE};
pub use errors::{CryptoError, CryptoResult};
pub use local::LocalCipher;
pub use plan::{annotate, EncryptionPlan, FieldEncryption};
