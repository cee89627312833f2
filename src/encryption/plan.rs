//! Encryption annotation
//!
//! Classifies every field present in both the document and the schema as
//! unencrypted, deterministic or random. No cryptography happens here.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::{
    bson_type_of, join_path, Algorithm, FieldSpec, KeyId, ObjectSchema, PlainField,
    SchemaDefinition, SchemaError, SchemaResult,
};

/// How one field is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldEncryption {
    None,
    Deterministic,
    Random,
}

impl FieldEncryption {
    pub fn algorithm(&self) -> Option<Algorithm> {
        match self {
            FieldEncryption::None => None,
            FieldEncryption::Deterministic => Some(Algorithm::Deterministic),
            FieldEncryption::Random => Some(Algorithm::Random),
        }
    }

    /// Whether equality queries still work on the stored value
    pub fn supports_equality(&self) -> bool {
        !matches!(self, FieldEncryption::Random)
    }
}

impl From<Algorithm> for FieldEncryption {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Deterministic => FieldEncryption::Deterministic,
            Algorithm::Random => FieldEncryption::Random,
        }
    }
}

/// Per-field classification of one document, keyed by dotted path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionPlan {
    key_id: Option<KeyId>,
    fields: BTreeMap<String, FieldEncryption>,
}

impl EncryptionPlan {
    /// Data key for every encrypted field in the plan
    pub fn key_id(&self) -> Option<KeyId> {
        self.key_id
    }

    pub fn get(&self, path: &str) -> Option<FieldEncryption> {
        self.fields.get(path).copied()
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldEncryption> {
        &self.fields
    }

    /// Fields that must be encrypted, in path order
    pub fn encrypted(&self) -> impl Iterator<Item = (&str, Algorithm)> {
        self.fields
            .iter()
            .filter_map(|(path, mode)| mode.algorithm().map(|alg| (path.as_str(), alg)))
    }

    pub fn requires_encryption(&self) -> bool {
        self.encrypted().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builds the encryption plan for `document`.
///
/// # Errors
///
/// - `TypeMismatch` at `$root` if the document is not an object
/// - `UnknownAlgorithm` if an encrypted field has no resolvable algorithm
pub fn annotate(document: &Value, schema: &SchemaDefinition) -> SchemaResult<EncryptionPlan> {
    let obj = document.as_object().ok_or_else(|| {
        SchemaError::type_mismatch("$root", "object", bson_type_of(document).type_name())
    })?;

    let mut fields = BTreeMap::new();
    annotate_object(obj, &schema.root, "", schema, &mut fields)?;

    Ok(EncryptionPlan {
        key_id: schema.key_id(),
        fields,
    })
}

fn annotate_object(
    obj: &Map<String, Value>,
    level: &ObjectSchema,
    prefix: &str,
    schema: &SchemaDefinition,
    out: &mut BTreeMap<String, FieldEncryption>,
) -> SchemaResult<()> {
    for (name, spec) in &level.properties {
        let Some(value) = obj.get(name) else {
            continue;
        };
        let path = join_path(prefix, name);

        match spec {
            FieldSpec::Encrypted(field) => {
                let algorithm = schema.resolve_algorithm(&path, field)?;
                out.insert(path, algorithm.into());
            }
            FieldSpec::Plain(PlainField {
                object: Some(nested),
                ..
            }) => {
                if let Value::Object(map) = value {
                    annotate_object(map, nested, &path, schema, out)?;
                }
                out.insert(path, FieldEncryption::None);
            }
            FieldSpec::Plain(_) => {
                out.insert(path, FieldEncryption::None);
            }
        }
    }
    Ok(())
}
