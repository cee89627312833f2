//! Migration Verification Tests
//!
//! - Document comparison finds missing, mismatched, unexpected and
//!   duplicated documents
//! - Count comparison honours the empty-collection setting
//! - Encrypted targets verify against plaintext sources after decryption

use std::sync::Arc;

use fieldseal::encryption::{decrypt_document, LocalCipher};
use fieldseal::schema::{Algorithm, BsonType, FieldSpec, KeyId, ObjectSchema, SchemaDefinition};
use fieldseal::verify::{compare_counts, compare_documents, CountOptions, CountOutcome};
use fieldseal::CollectionGuard;
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn source() -> Vec<Value> {
    (1..=5)
        .map(|i| json!({ "_id": i, "username": format!("user{}", i), "password": "pw" }))
        .collect()
}

// =============================================================================
// Document Comparison Tests
// =============================================================================

/// Identical sets verify.
#[test]
fn test_identical_sets_verify() {
    let report = compare_documents(&source(), &source());
    assert!(report.is_valid());
    assert_eq!(report.matched, 5);
}

/// A dropped and an altered document are both reported.
#[test]
fn test_missing_and_mismatched_found() {
    let mut target = source();
    target.remove(1);
    target[2]["username"] = json!("changed");

    let report = compare_documents(&source(), &target);
    assert!(!report.is_valid());
    assert_eq!(report.missing, vec!["2"]);
    assert_eq!(report.mismatched, vec!["4"]);
    assert_eq!(report.matched, 3);
}

/// Target-only documents are reported as unexpected.
#[test]
fn test_unexpected_found() {
    let mut target = source();
    target.push(json!({ "_id": "extra", "username": "ghost", "password": "pw" }));

    let report = compare_documents(&source(), &target);
    assert_eq!(report.unexpected, vec!["\"extra\""]);
    assert!(!report.is_valid());
}

/// A source document repeated twice is a duplicate, not a missing one.
#[test]
fn test_duplicate_ids_found() {
    let mut doubled = source();
    doubled.push(source()[0].clone());

    let report = compare_documents(&doubled, &source());
    assert_eq!(report.matched, 5);
    assert!(report.missing.is_empty());
    assert_eq!(report.duplicate_ids, vec!["1"]);
    assert!(!report.is_valid());

    let report = compare_documents(&source(), &doubled);
    assert!(report.unexpected.is_empty());
    assert_eq!(report.duplicate_ids, vec!["1"]);
    assert!(!report.is_valid());
}

// =============================================================================
// Count Comparison Tests
// =============================================================================

/// Counts must match.
#[test]
fn test_counts() {
    assert_eq!(compare_counts(5, 5, CountOptions::default()).outcome, CountOutcome::Valid);
    assert_eq!(compare_counts(5, 4, CountOptions::default()).outcome, CountOutcome::Invalid);
}

/// Empty collections are skipped only when asked.
#[test]
fn test_empty_collection_setting() {
    let skip = CountOptions {
        validate_empty_collections: false,
    };
    assert_eq!(compare_counts(0, 0, skip).outcome, CountOutcome::Skipped);
    assert_eq!(compare_counts(0, 0, CountOptions::default()).outcome, CountOutcome::Valid);
}

// =============================================================================
// Encrypted Migration Tests
// =============================================================================

/// A target written through the guard verifies once decrypted.
#[test]
fn test_encrypted_target_verifies_after_decrypt() {
    let key_id: KeyId = "d1594b63-65c2-40b0-82ca-adfa1529cc7d".parse().unwrap();
    let root = ObjectSchema::new()
        .required_field("username", FieldSpec::plain(BsonType::String))
        .required_field("password", FieldSpec::encrypted(BsonType::String, Some(Algorithm::Random)));
    let schema = SchemaDefinition::new(root).with_encrypt_metadata(key_id, None);
    let cipher = Arc::new(LocalCipher::new(key_id, [1u8; 32]));
    let guard = CollectionGuard::new("app.users", Arc::new(schema), Arc::clone(&cipher));

    let target: Vec<Value> = source()
        .iter()
        .map(|doc| guard.prepare_insert(doc).unwrap().document)
        .collect();

    let raw = compare_documents(&source(), &target);
    assert_eq!(raw.mismatched.len(), 5);

    let opened: Vec<Value> = target
        .iter()
        .map(|doc| decrypt_document(doc, cipher.as_ref()).unwrap())
        .collect();
    assert!(compare_documents(&source(), &opened).is_valid());
}
