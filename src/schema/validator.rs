//! Document validation against a collection schema
//!
//! Checks, per object level and in this order:
//! - all required fields are present
//! - present declared fields match their declared type
//! - under `strict`, no undeclared fields exist (`_id` is always allowed
//!   at the top level)
//!
//! Encrypted fields are checked against their plaintext type. A value that
//! is already an encrypted payload is accepted only when its recorded type,
//! algorithm and key all match what the schema declares for the field.
//!
//! The first violation found is reported. Validation never mutates the
//! document.

use serde_json::{Map, Value};

use super::errors::{SchemaError, SchemaResult};
use super::types::{
    bson_type_of, join_path, FieldSpec, ObjectSchema, PlainField, SchemaDefinition,
    ValidationAction, ValidationLevel,
};
use crate::encryption::Envelope;
use crate::observability::Event;

/// A document that passed validation, with any violations tolerated by a
/// `warn` validation action.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDocument<'d> {
    document: &'d Value,
    warnings: Vec<SchemaError>,
}

impl<'d> ValidatedDocument<'d> {
    /// The validated document, unchanged
    pub fn document(&self) -> &'d Value {
        self.document
    }

    /// Violations that were logged instead of rejected
    pub fn warnings(&self) -> &[SchemaError] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Validates `document` against `schema`.
pub fn validate<'d>(document: &'d Value, schema: &SchemaDefinition) -> SchemaResult<ValidatedDocument<'d>> {
    SchemaValidator::new(schema).validate_document(document)
}

/// Schema validator bound to one schema definition.
pub struct SchemaValidator<'s> {
    schema: &'s SchemaDefinition,
}

impl<'s> SchemaValidator<'s> {
    pub fn new(schema: &'s SchemaDefinition) -> Self {
        Self { schema }
    }

    /// Validates a document, honouring the schema's validation level and
    /// action.
    ///
    /// # Errors
    ///
    /// With action `error`:
    /// - `MissingRequiredField` if a required field is absent
    /// - `TypeMismatch` if a field (or the document itself) has the wrong type
    /// - `UnknownField` under `strict` if an undeclared field is present
    pub fn validate_document<'d>(&self, document: &'d Value) -> SchemaResult<ValidatedDocument<'d>> {
        if self.schema.validation_level == ValidationLevel::Off {
            return Ok(ValidatedDocument {
                document,
                warnings: Vec::new(),
            });
        }

        match self.check(document) {
            Ok(()) => Ok(ValidatedDocument {
                document,
                warnings: Vec::new(),
            }),
            Err(err) if self.schema.validation_action == ValidationAction::Warn => {
                tracing::warn!(
                    event = %Event::ValidationWarning,
                    code = err.code().code(),
                    "{}",
                    err
                );
                Ok(ValidatedDocument {
                    document,
                    warnings: vec![err],
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Runs every check regardless of level and action.
    pub fn check(&self, document: &Value) -> SchemaResult<()> {
        let obj = document.as_object().ok_or_else(|| {
            SchemaError::type_mismatch("$root", "object", bson_type_of(document).type_name())
        })?;

        self.check_object(obj, &self.schema.root, "")
    }

    fn check_object(
        &self,
        obj: &Map<String, Value>,
        schema: &ObjectSchema,
        prefix: &str,
    ) -> SchemaResult<()> {
        for name in &schema.required {
            if !obj.contains_key(name) {
                return Err(SchemaError::missing_field(join_path(prefix, name)));
            }
        }

        for (name, spec) in &schema.properties {
            if let Some(value) = obj.get(name) {
                self.check_value(value, spec, &join_path(prefix, name))?;
            }
        }

        if self.schema.validation_level == ValidationLevel::Strict {
            for key in obj.keys() {
                if prefix.is_empty() && key == "_id" {
                    continue;
                }
                if !schema.properties.contains_key(key) {
                    return Err(SchemaError::unknown_field(join_path(prefix, key)));
                }
            }
        }

        Ok(())
    }

    fn check_value(&self, value: &Value, spec: &FieldSpec, path: &str) -> SchemaResult<()> {
        match spec {
            FieldSpec::Plain(PlainField { bson_type, object }) => {
                if !bson_type.matches(value) {
                    return Err(SchemaError::type_mismatch(
                        path,
                        bson_type.type_name(),
                        bson_type_of(value).type_name(),
                    ));
                }
                if let (Some(nested), Value::Object(map)) = (object, value) {
                    self.check_object(map, nested, path)?;
                }
                Ok(())
            }
            FieldSpec::Encrypted(field) => {
                if field.bson_type.matches(value) {
                    return Ok(());
                }
                let Ok(sealed) = Envelope::from_value(value) else {
                    return Err(SchemaError::type_mismatch(
                        path,
                        field.bson_type.type_name(),
                        bson_type_of(value).type_name(),
                    ));
                };

                if !field.bson_type.accepts(sealed.bson_type) {
                    return Err(SchemaError::type_mismatch(
                        path,
                        field.bson_type.type_name(),
                        format!("encrypted {}", sealed.bson_type.type_name()),
                    ));
                }

                let algorithm = self.schema.resolve_algorithm(path, field)?;
                if sealed.algorithm != algorithm {
                    return Err(SchemaError::type_mismatch(
                        path,
                        format!("{} encrypted with {}", field.bson_type.type_name(), algorithm),
                        format!("{} encrypted with {}", sealed.bson_type.type_name(), sealed.algorithm),
                    ));
                }

                if self.schema.key_id() != Some(sealed.key_id) {
                    let expected = self
                        .schema
                        .key_id()
                        .map(|key| format!("encrypted under key {}", key))
                        .unwrap_or_else(|| "unencrypted".to_string());
                    return Err(SchemaError::type_mismatch(
                        path,
                        expected,
                        format!("encrypted under key {}", sealed.key_id),
                    ));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::{encrypt_value, LocalCipher};
    use crate::schema::types::{Algorithm, BsonType, KeyId};
    use serde_json::json;

    fn users_schema() -> SchemaDefinition {
        let root = ObjectSchema::new()
            .required_field("username", FieldSpec::plain(BsonType::String))
            .required_field(
                "password",
                FieldSpec::encrypted(BsonType::String, Some(Algorithm::Random)),
            )
            .field("createdAt", FieldSpec::plain(BsonType::Date));
        SchemaDefinition::new(root).with_encrypt_metadata(
            "d1594b63-65c2-40b0-82ca-adfa1529cc7d".parse::<KeyId>().unwrap(),
            Some(Algorithm::Deterministic),
        )
    }

    #[test]
    fn test_valid_document_passes() {
        let schema = users_schema();
        let doc = json!({
            "_id": {"$oid": "507f1f77bcf86cd799439011"},
            "username": "alice",
            "password": "secret",
            "createdAt": {"$date": "2024-05-01T12:00:00Z"}
        });

        let validated = validate(&doc, &schema).unwrap();
        assert!(!validated.has_warnings());
        assert_eq!(validated.document(), &doc);
    }

    #[test]
    fn test_missing_required_field_fails() {
        let schema = users_schema();
        let doc = json!({ "username": "alice" });

        let err = validate(&doc, &schema).unwrap_err();
        assert_eq!(err, SchemaError::missing_field("password"));
    }

    #[test]
    fn test_type_mismatch_fails() {
        let schema = users_schema();
        let doc = json!({ "username": "alice", "password": "x", "createdAt": "2024-05-01" });

        let err = validate(&doc, &schema).unwrap_err();
        assert_eq!(err, SchemaError::type_mismatch("createdAt", "date", "string"));
    }

    #[test]
    fn test_null_is_a_type_mismatch() {
        let schema = users_schema();
        let doc = json!({ "username": null, "password": "x" });

        let err = validate(&doc, &schema).unwrap_err();
        assert_eq!(err, SchemaError::type_mismatch("username", "string", "null"));
    }

    #[test]
    fn test_unknown_field_fails_when_strict() {
        let schema = users_schema();
        let doc = json!({ "username": "alice", "password": "x", "nickname": "al" });

        let err = validate(&doc, &schema).unwrap_err();
        assert_eq!(err, SchemaError::unknown_field("nickname"));
    }

    #[test]
    fn test_warn_level_tolerates_unknown_fields() {
        let schema = users_schema().with_validation_level(ValidationLevel::Warn);
        let doc = json!({ "username": "alice", "password": "x", "nickname": "al" });
        assert!(validate(&doc, &schema).is_ok());

        let doc = json!({ "username": 1, "password": "x" });
        assert!(validate(&doc, &schema).is_err());
    }

    #[test]
    fn test_off_level_accepts_anything() {
        let schema = users_schema().with_validation_level(ValidationLevel::Off);
        let doc = json!({ "whatever": [1, 2, 3] });
        assert!(validate(&doc, &schema).is_ok());
    }

    #[test]
    fn test_warn_action_keeps_violation() {
        let schema = users_schema().with_validation_action(ValidationAction::Warn);
        let doc = json!({ "password": "x" });

        let validated = validate(&doc, &schema).unwrap();
        assert_eq!(validated.warnings(), &[SchemaError::missing_field("username")]);
    }

    #[test]
    fn test_non_object_document() {
        let schema = users_schema();
        let err = validate(&json!(["alice"]), &schema).unwrap_err();
        assert_eq!(err, SchemaError::type_mismatch("$root", "object", "array"));
    }

    #[test]
    fn test_nested_object_validation() {
        let address = ObjectSchema::new()
            .required_field("city", FieldSpec::plain(BsonType::String))
            .field("zip", FieldSpec::plain(BsonType::String));
        let schema = SchemaDefinition::new(
            ObjectSchema::new().required_field("address", FieldSpec::object(address)),
        );

        let doc = json!({ "address": { "city": "Oslo", "zip": "0150" } });
        assert!(validate(&doc, &schema).is_ok());

        let doc = json!({ "address": { "zip": "0150" } });
        assert_eq!(
            validate(&doc, &schema).unwrap_err(),
            SchemaError::missing_field("address.city")
        );

        let doc = json!({ "address": { "city": "Oslo", "floor": 3 } });
        assert_eq!(
            validate(&doc, &schema).unwrap_err(),
            SchemaError::unknown_field("address.floor")
        );
    }

    #[test]
    fn test_id_only_allowed_at_top_level() {
        let address = ObjectSchema::new().field("city", FieldSpec::plain(BsonType::String));
        let schema = SchemaDefinition::new(
            ObjectSchema::new().field("address", FieldSpec::object(address)),
        );

        let doc = json!({ "_id": 1, "address": { "_id": 2 } });
        assert_eq!(
            validate(&doc, &schema).unwrap_err(),
            SchemaError::unknown_field("address._id")
        );
    }

    #[test]
    fn test_matching_envelope_accepted() {
        let schema = users_schema();
        let cipher = LocalCipher::new(schema.key_id().unwrap(), [3u8; 32]);
        let sealed = encrypt_value(&json!("secret"), &cipher.key_id(), Algorithm::Random, &cipher).unwrap();

        let doc = json!({ "username": "alice", "password": sealed });
        assert!(validate(&doc, &schema).is_ok());
    }

    #[test]
    fn test_envelope_with_other_algorithm_rejected() {
        let schema = users_schema();
        let cipher = LocalCipher::new(schema.key_id().unwrap(), [3u8; 32]);
        let sealed =
            encrypt_value(&json!("secret"), &cipher.key_id(), Algorithm::Deterministic, &cipher).unwrap();

        let doc = json!({ "username": "alice", "password": sealed });
        let err = validate(&doc, &schema).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { ref field, .. } if field == "password"));
    }

    #[test]
    fn test_envelope_under_other_key_rejected() {
        let schema = users_schema();
        let stranger: KeyId = "00000000-0000-4000-8000-000000000000".parse().unwrap();
        let cipher = LocalCipher::new(stranger, [3u8; 32]);
        let sealed = encrypt_value(&json!("secret"), &stranger, Algorithm::Random, &cipher).unwrap();

        let doc = json!({ "username": "alice", "password": sealed });
        let err = validate(&doc, &schema).unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { ref actual, .. } if actual.contains(&stranger.to_string())));
    }
}
