//! Document encryption and decryption
//!
//! Both directions produce a derived document; the input is never mutated.
//! Plaintext bytes are the JSON encoding of the field value.

use serde_json::{Map, Value};

use super::cipher::{FieldCipher, SealContext};
use super::envelope::{self, Envelope};
use super::errors::{CryptoError, CryptoResult};
use super::plan::EncryptionPlan;
use crate::schema::{bson_type_of, join_path, Algorithm, KeyId};

/// Seals one value into its envelope form.
pub fn encrypt_value<C: FieldCipher + ?Sized>(
    value: &Value,
    key_id: &KeyId,
    algorithm: Algorithm,
    cipher: &C,
) -> CryptoResult<Value> {
    let bson_type = bson_type_of(value);
    if algorithm == Algorithm::Deterministic && !bson_type.allows_deterministic() {
        return Err(CryptoError::encrypt(
            "<value>",
            format!("deterministic encryption does not support {}", bson_type),
        ));
    }

    let plaintext = serde_json::to_vec(value)
        .map_err(|e| CryptoError::encrypt("<value>", format!("failed to encode value: {}", e)))?;
    let context = SealContext::new(*key_id, algorithm, bson_type);
    let sealed = cipher.seal(&context, &plaintext)?;

    Envelope {
        algorithm,
        key_id: *key_id,
        bson_type,
        sealed,
    }
    .to_value()
}

/// Opens one envelope back into its plaintext value.
pub fn decrypt_value<C: FieldCipher + ?Sized>(value: &Value, cipher: &C) -> CryptoResult<Value> {
    let env = Envelope::from_value(value)?;
    let plaintext = cipher.open(&env.context(), &env.sealed)?;

    let decoded: Value = serde_json::from_slice(&plaintext)
        .map_err(|e| CryptoError::decrypt("<value>", format!("plaintext is not JSON: {}", e)))?;

    let actual = bson_type_of(&decoded);
    if !env.bson_type.accepts(actual) {
        return Err(CryptoError::decrypt(
            "<value>",
            format!("envelope records {} but plaintext is {}", env.bson_type, actual),
        ));
    }
    Ok(decoded)
}

/// Returns a copy of `document` with every field the plan marks as
/// encrypted replaced by its envelope. A field that already holds an
/// envelope is kept when that envelope uses the planned algorithm and the
/// plan's key.
///
/// # Errors
///
/// - `Encrypt` if the plan needs a key but the schema declared none, a
///   planned field cannot be found, an existing envelope uses another
///   algorithm or key, or a value cannot be sealed
/// - any error raised by the cipher
pub fn encrypt_document<C: FieldCipher + ?Sized>(
    document: &Value,
    plan: &EncryptionPlan,
    cipher: &C,
) -> CryptoResult<Value> {
    let mut out = document.clone();

    for (path, algorithm) in plan.encrypted() {
        let key_id = plan
            .key_id()
            .ok_or_else(|| CryptoError::encrypt(path, "schema declares no keyId"))?;

        let slot = field_mut(&mut out, path)
            .ok_or_else(|| CryptoError::encrypt(path, "planned field not found in document"))?;

        if envelope::is_encrypted(slot) {
            let existing = Envelope::from_value(slot).map_err(|e| at_path(e, path))?;
            if existing.algorithm != algorithm || existing.key_id != key_id {
                return Err(CryptoError::encrypt(
                    path,
                    format!(
                        "already encrypted with {} under key {}, schema requires {} under key {}",
                        existing.algorithm, existing.key_id, algorithm, key_id
                    ),
                ));
            }
            continue;
        }

        *slot = encrypt_value(slot, &key_id, algorithm, cipher).map_err(|e| at_path(e, path))?;
    }

    Ok(out)
}

/// Returns a copy of `document` with every envelope, at any depth,
/// replaced by its plaintext.
pub fn decrypt_document<C: FieldCipher + ?Sized>(document: &Value, cipher: &C) -> CryptoResult<Value> {
    match document {
        Value::Object(map) => Ok(Value::Object(decrypt_object(map, "", cipher)?)),
        other => decrypt_at(other, "$root", cipher),
    }
}

fn decrypt_object<C: FieldCipher + ?Sized>(
    map: &Map<String, Value>,
    prefix: &str,
    cipher: &C,
) -> CryptoResult<Map<String, Value>> {
    let mut out = Map::with_capacity(map.len());
    for (name, value) in map {
        let path = join_path(prefix, name);
        out.insert(name.clone(), decrypt_at(value, &path, cipher)?);
    }
    Ok(out)
}

fn decrypt_at<C: FieldCipher + ?Sized>(value: &Value, path: &str, cipher: &C) -> CryptoResult<Value> {
    if envelope::is_encrypted(value) {
        return decrypt_value(value, cipher).map_err(|e| at_path(e, path));
    }

    match value {
        Value::Object(map) => Ok(Value::Object(decrypt_object(map, path, cipher)?)),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| decrypt_at(item, &join_path(path, &i.to_string()), cipher))
            .collect::<CryptoResult<Vec<_>>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

fn field_mut<'a>(document: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.as_object_mut()?.get_mut(segment))
}

/// Attaches the field path to errors raised for an anonymous value.
fn at_path(err: CryptoError, path: &str) -> CryptoError {
    match err {
        CryptoError::Encrypt { reason, .. } => CryptoError::encrypt(path, reason),
        CryptoError::Decrypt { reason, .. } => CryptoError::decrypt(path, reason),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::local::LocalCipher;
    use crate::encryption::plan::annotate;
    use crate::schema::{BsonType, FieldSpec, ObjectSchema, SchemaDefinition};
    use serde_json::json;

    fn key() -> KeyId {
        "d1594b63-65c2-40b0-82ca-adfa1529cc7d".parse().unwrap()
    }

    fn cipher() -> LocalCipher {
        LocalCipher::new(key(), [7u8; 32])
    }

    fn schema() -> SchemaDefinition {
        let address = ObjectSchema::new()
            .field("city", FieldSpec::plain(BsonType::String))
            .field("zip", FieldSpec::encrypted(BsonType::String, None));
        let root = ObjectSchema::new()
            .required_field("username", FieldSpec::plain(BsonType::String))
            .field("password", FieldSpec::encrypted(BsonType::String, Some(Algorithm::Random)))
            .field("address", FieldSpec::object(address));
        SchemaDefinition::new(root).with_encrypt_metadata(key(), Some(Algorithm::Deterministic))
    }

    #[test]
    fn test_encrypt_then_decrypt_restores_document() {
        let doc = json!({
            "username": "alice",
            "password": "secret",
            "address": { "city": "Oslo", "zip": "0150" }
        });
        let plan = annotate(&doc, &schema()).unwrap();
        let cipher = cipher();

        let sealed = encrypt_document(&doc, &plan, &cipher).unwrap();
        assert_eq!(sealed["username"], "alice");
        assert_eq!(sealed["address"]["city"], "Oslo");
        assert!(envelope::is_encrypted(&sealed["password"]));
        assert!(envelope::is_encrypted(&sealed["address"]["zip"]));

        assert_eq!(decrypt_document(&sealed, &cipher).unwrap(), doc);
    }

    #[test]
    fn test_already_encrypted_fields_are_kept() {
        let doc = json!({ "username": "alice", "password": "secret" });
        let plan = annotate(&doc, &schema()).unwrap();
        let cipher = cipher();

        let once = encrypt_document(&doc, &plan, &cipher).unwrap();
        let twice = encrypt_document(&once, &plan, &cipher).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_key_id_fails() {
        let root = ObjectSchema::new()
            .field("password", FieldSpec::encrypted(BsonType::String, Some(Algorithm::Random)));
        let schema = SchemaDefinition::new(root);
        let doc = json!({ "password": "secret" });
        let plan = annotate(&doc, &schema).unwrap();

        let err = encrypt_document(&doc, &plan, &cipher()).unwrap_err();
        assert!(matches!(err, CryptoError::Encrypt { ref field, .. } if field == "password"));
    }

    #[test]
    fn test_foreign_envelope_rejected() {
        let doc = json!({ "username": "alice", "password": "secret" });
        let plan = annotate(&doc, &schema()).unwrap();
        let cipher = cipher();

        let deterministic = encrypt_value(&json!("secret"), &key(), Algorithm::Deterministic, &cipher).unwrap();
        let smuggled = json!({ "username": "alice", "password": deterministic });
        let err = encrypt_document(&smuggled, &plan, &cipher).unwrap_err();
        assert!(matches!(err, CryptoError::Encrypt { ref field, .. } if field == "password"));

        let stranger = LocalCipher::new("00000000-0000-4000-8000-000000000000".parse().unwrap(), [7u8; 32]);
        let foreign = encrypt_value(&json!("secret"), &stranger.key_id(), Algorithm::Random, &stranger).unwrap();
        let smuggled = json!({ "username": "alice", "password": foreign });
        assert!(encrypt_document(&smuggled, &plan, &cipher).is_err());
    }

    #[test]
    fn test_unreachable_planned_field_fails() {
        let root = ObjectSchema::new()
            .field("card.number", FieldSpec::encrypted(BsonType::String, Some(Algorithm::Random)));
        let schema = SchemaDefinition::new(root).with_encrypt_metadata(key(), None);
        let doc = json!({ "card.number": "4111-1111" });
        let plan = annotate(&doc, &schema).unwrap();

        let err = encrypt_document(&doc, &plan, &cipher()).unwrap_err();
        assert!(matches!(err, CryptoError::Encrypt { ref field, .. } if field == "card.number"));
    }

    #[test]
    fn test_deterministic_rejects_bool() {
        let err = encrypt_value(&json!(true), &key(), Algorithm::Deterministic, &cipher()).unwrap_err();
        assert_eq!(err.code(), "FIELDSEAL_ENCRYPT_FAILED");
    }

    #[test]
    fn test_decrypt_reaches_into_arrays() {
        let cipher = cipher();
        let sealed = encrypt_value(&json!(42), &key(), Algorithm::Random, &cipher).unwrap();
        let doc = json!({ "history": [ { "amount": sealed }, 1 ] });

        let opened = decrypt_document(&doc, &cipher).unwrap();
        assert_eq!(opened, json!({ "history": [ { "amount": 42 }, 1 ] }));
    }

    #[test]
    fn test_decrypt_with_other_key_fails() {
        let sealed = encrypt_value(&json!("x"), &key(), Algorithm::Random, &cipher()).unwrap();
        let other = LocalCipher::new(
            "00000000-0000-4000-8000-000000000000".parse().unwrap(),
            [7u8; 32],
        );

        let err = decrypt_document(&json!({ "f": sealed }), &other).unwrap_err();
        assert!(matches!(err, CryptoError::UnknownKey { .. }));
    }
}
