//! Schema definition parsing and export
//!
//! Accepted input shapes:
//! - collection options: `{"validator": {"$jsonSchema": {...}}, "validationLevel": ..., "validationAction": ...}`
//! - `{"$jsonSchema": {...}}`, or a bare `$jsonSchema` body
//! - the flat record form: `{"requiredFields", "encryptMetadata", "fields", "validationLevel", "validationAction"}`
//!
//! Every definition is checked with `validate_structure` before it is
//! returned, so unknown algorithms and malformed key ids never reach
//! document validation.

use std::collections::BTreeMap;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::errors::{SchemaError, SchemaResult};
use super::types::{
    check_property_name, join_path, Algorithm, BsonType, EncryptMetadata, EncryptedField,
    FieldSpec, KeyId, ObjectSchema, PlainField, SchemaDefinition, ValidationAction,
    ValidationLevel,
};

/// Keywords understood inside a `$jsonSchema` object level
const OBJECT_KEYWORDS: &[&str] = &[
    "bsonType",
    "required",
    "properties",
    "encryptMetadata",
    "description",
    "title",
];

impl SchemaDefinition {
    /// Parses and validates a schema definition. `origin` names the source
    /// (file path or namespace) in error messages.
    pub fn from_json(origin: &str, value: &Value) -> SchemaResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::malformed(origin, "schema definition must be an object"))?;

        let definition = if let Some(validator) = obj.get("validator") {
            let validator = validator
                .as_object()
                .ok_or_else(|| SchemaError::malformed(origin, "'validator' must be an object"))?;
            let body = validator.get("$jsonSchema").ok_or_else(|| {
                SchemaError::malformed(origin, "'validator' must contain '$jsonSchema'")
            })?;
            parse_collection_options(origin, body, obj)?
        } else if let Some(body) = obj.get("$jsonSchema") {
            parse_collection_options(origin, body, obj)?
        } else if obj.contains_key("fields") {
            parse_record(origin, value)?
        } else if obj.contains_key("bsonType") || obj.contains_key("properties") {
            parse_collection_options(origin, value, &Map::new())?
        } else {
            return Err(SchemaError::malformed(
                origin,
                "expected '$jsonSchema' collection options or a schema record",
            ));
        };

        definition.validate_structure(origin)?;
        Ok(definition)
    }

    /// Exports the definition as collection options with a `$jsonSchema`
    /// validator, the form `from_json` reads back.
    pub fn to_collection_options(&self) -> Value {
        let mut body = object_to_json(&self.root);
        if let (Some(meta), Value::Object(map)) = (&self.encrypt_metadata, &mut body) {
            let mut encrypt = Map::new();
            encrypt.insert("keyId".into(), json!([{ "$uuid": meta.key_id.to_string() }]));
            if let Some(algorithm) = meta.algorithm {
                encrypt.insert("algorithm".into(), json!(algorithm.name()));
            }
            map.insert("encryptMetadata".into(), Value::Object(encrypt));
        }

        json!({
            "validator": { "$jsonSchema": body },
            "validationLevel": self.validation_level.as_str(),
            "validationAction": self.validation_action.as_str(),
        })
    }
}

fn parse_collection_options(
    origin: &str,
    body: &Value,
    options: &Map<String, Value>,
) -> SchemaResult<SchemaDefinition> {
    let body_obj = body
        .as_object()
        .ok_or_else(|| SchemaError::malformed(origin, "'$jsonSchema' must be an object"))?;

    if let Some(ty) = body_obj.get("bsonType") {
        if ty.as_str() != Some("object") {
            return Err(SchemaError::malformed(
                origin,
                "top-level bsonType must be 'object'",
            ));
        }
    }

    let root = parse_object(origin, body_obj, "")?;
    let encrypt_metadata = body_obj
        .get("encryptMetadata")
        .map(|meta| parse_encrypt_metadata(origin, meta))
        .transpose()?;

    Ok(SchemaDefinition {
        root,
        encrypt_metadata,
        validation_level: parse_level(origin, options.get("validationLevel"))?,
        validation_action: parse_action(origin, options.get("validationAction"))?,
    })
}

fn parse_object(origin: &str, obj: &Map<String, Value>, prefix: &str) -> SchemaResult<ObjectSchema> {
    for key in obj.keys() {
        if !OBJECT_KEYWORDS.contains(&key.as_str()) {
            return Err(SchemaError::malformed(
                origin,
                format!("unsupported keyword '{}' at '{}'", key, display_path(prefix)),
            ));
        }
        if key == "encryptMetadata" && !prefix.is_empty() {
            return Err(SchemaError::malformed(
                origin,
                format!("encryptMetadata is only allowed at the top level, found at '{}'", prefix),
            ));
        }
    }

    let mut schema = ObjectSchema::new();

    if let Some(required) = obj.get("required") {
        let names = required.as_array().ok_or_else(|| {
            SchemaError::malformed(origin, format!("'required' at '{}' must be an array", display_path(prefix)))
        })?;
        for name in names {
            let name = name.as_str().ok_or_else(|| {
                SchemaError::malformed(origin, "required field names must be strings")
            })?;
            if !schema.required.insert(name.to_string()) {
                return Err(SchemaError::malformed(
                    origin,
                    format!("field '{}' is listed as required twice", join_path(prefix, name)),
                ));
            }
        }
    }

    if let Some(properties) = obj.get("properties") {
        let properties = properties.as_object().ok_or_else(|| {
            SchemaError::malformed(origin, format!("'properties' at '{}' must be an object", display_path(prefix)))
        })?;
        for (name, spec) in properties {
            check_property_name(origin, prefix, name)?;
            let path = join_path(prefix, name);
            let spec = parse_field(origin, spec, &path)?;
            schema.properties.insert(name.clone(), spec);
        }
    }

    Ok(schema)
}

fn parse_field(origin: &str, value: &Value, path: &str) -> SchemaResult<FieldSpec> {
    let obj = value.as_object().ok_or_else(|| {
        SchemaError::malformed(origin, format!("field '{}' must be an object", path))
    })?;

    if let Some(encrypt) = obj.get("encrypt") {
        if obj.len() != 1 {
            return Err(SchemaError::malformed(
                origin,
                format!("field '{}' mixes 'encrypt' with other keywords", path),
            ));
        }
        return parse_encrypt(origin, encrypt, path);
    }

    let bson_type = parse_bson_type(origin, obj.get("bsonType"), path)?;
    let has_properties = obj.contains_key("properties") || obj.contains_key("required");

    if has_properties {
        if bson_type != BsonType::Object {
            return Err(SchemaError::malformed(
                origin,
                format!("field '{}' declares properties but is not an object", path),
            ));
        }
        return Ok(FieldSpec::object(parse_object(origin, obj, path)?));
    }

    for key in obj.keys() {
        if !matches!(key.as_str(), "bsonType" | "description" | "title") {
            return Err(SchemaError::malformed(
                origin,
                format!("unsupported keyword '{}' at '{}'", key, path),
            ));
        }
    }

    Ok(FieldSpec::Plain(PlainField {
        bson_type,
        object: None,
    }))
}

fn parse_encrypt(origin: &str, value: &Value, path: &str) -> SchemaResult<FieldSpec> {
    let obj = value.as_object().ok_or_else(|| {
        SchemaError::malformed(origin, format!("'encrypt' of field '{}' must be an object", path))
    })?;

    for key in obj.keys() {
        match key.as_str() {
            "bsonType" | "algorithm" => {}
            "keyId" => {
                return Err(SchemaError::malformed(
                    origin,
                    format!("field '{}': per-field keyId is not supported, use encryptMetadata", path),
                ))
            }
            other => {
                return Err(SchemaError::malformed(
                    origin,
                    format!("unsupported encrypt keyword '{}' at '{}'", other, path),
                ))
            }
        }
    }

    let bson_type = parse_bson_type(origin, obj.get("bsonType"), path)?;
    let algorithm = obj
        .get("algorithm")
        .map(|name| parse_algorithm(origin, name, path))
        .transpose()?;

    Ok(FieldSpec::Encrypted(EncryptedField {
        bson_type,
        algorithm,
    }))
}

fn parse_bson_type(origin: &str, value: Option<&Value>, path: &str) -> SchemaResult<BsonType> {
    let name = value.and_then(Value::as_str).ok_or_else(|| {
        SchemaError::malformed(origin, format!("field '{}' needs a string 'bsonType'", path))
    })?;
    BsonType::from_str(name).map_err(|e| SchemaError::malformed(origin, format!("field '{}': {}", path, e)))
}

fn parse_algorithm(origin: &str, value: &Value, path: &str) -> SchemaResult<Algorithm> {
    let name = value.as_str().ok_or_else(|| {
        SchemaError::malformed(origin, format!("algorithm of '{}' must be a string", path))
    })?;
    Algorithm::parse(name).ok_or_else(|| SchemaError::unknown_algorithm(path, name))
}

fn parse_encrypt_metadata(origin: &str, value: &Value) -> SchemaResult<EncryptMetadata> {
    let obj = value
        .as_object()
        .ok_or_else(|| SchemaError::malformed(origin, "'encryptMetadata' must be an object"))?;

    let key_id = obj
        .get("keyId")
        .ok_or_else(|| SchemaError::malformed(origin, "'encryptMetadata' needs a 'keyId'"))?;
    let key_id = parse_key_id(origin, key_id)?;

    let algorithm = obj
        .get("algorithm")
        .map(|name| parse_algorithm(origin, name, "encryptMetadata"))
        .transpose()?;

    Ok(EncryptMetadata { key_id, algorithm })
}

/// Parses a key id given as a UUID string, `{"$uuid": ...}`, a UUID
/// `$binary` (subtype 04), or a one-element array of any of those.
pub fn parse_key_id(origin: &str, value: &Value) -> SchemaResult<KeyId> {
    let malformed = |reason: &str| SchemaError::malformed(origin, format!("keyId: {}", reason));

    match value {
        Value::String(s) => Uuid::parse_str(s)
            .map(KeyId)
            .map_err(|e| malformed(&e.to_string())),
        Value::Array(items) => match items.as_slice() {
            [single] => parse_key_id(origin, single),
            _ => Err(malformed("exactly one key id is supported")),
        },
        Value::Object(map) => {
            if let Some(uuid) = map.get("$uuid") {
                return parse_key_id(origin, uuid);
            }
            if let Some(Value::Object(binary)) = map.get("$binary") {
                if binary.get("subType").and_then(Value::as_str) != Some("04") {
                    return Err(malformed("binary key ids must use subType 04"));
                }
                let encoded = binary
                    .get("base64")
                    .and_then(Value::as_str)
                    .ok_or_else(|| malformed("missing base64 payload"))?;
                let bytes = BASE64
                    .decode(encoded)
                    .map_err(|e| malformed(&e.to_string()))?;
                let bytes: [u8; 16] = bytes
                    .try_into()
                    .map_err(|_| malformed("UUID must be 16 bytes"))?;
                return Ok(KeyId::from_bytes(bytes));
            }
            Err(malformed("unrecognised key id form"))
        }
        _ => Err(malformed("unrecognised key id form")),
    }
}

fn parse_level(origin: &str, value: Option<&Value>) -> SchemaResult<ValidationLevel> {
    match value {
        None => Ok(ValidationLevel::default()),
        Some(v) => v
            .as_str()
            .and_then(ValidationLevel::parse)
            .ok_or_else(|| SchemaError::malformed(origin, format!("invalid validationLevel {}", v))),
    }
}

fn parse_action(origin: &str, value: Option<&Value>) -> SchemaResult<ValidationAction> {
    match value {
        None => Ok(ValidationAction::default()),
        Some(v) => v
            .as_str()
            .and_then(ValidationAction::parse)
            .ok_or_else(|| SchemaError::malformed(origin, format!("invalid validationAction {}", v))),
    }
}

/// Flat record form of a schema definition
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SchemaRecord {
    #[serde(default)]
    required_fields: Vec<String>,
    #[serde(default)]
    encrypt_metadata: Option<Value>,
    fields: BTreeMap<String, FieldRecord>,
    #[serde(default)]
    validation_level: Option<Value>,
    #[serde(default)]
    validation_action: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldRecord {
    #[serde(rename = "type")]
    bson_type: String,
    #[serde(default)]
    encrypted: bool,
    #[serde(default)]
    algorithm: Option<String>,
}

fn parse_record(origin: &str, value: &Value) -> SchemaResult<SchemaDefinition> {
    let record: SchemaRecord = serde_json::from_value(value.clone())
        .map_err(|e| SchemaError::malformed(origin, e.to_string()))?;

    let mut root = ObjectSchema::new();
    for (name, field) in &record.fields {
        check_property_name(origin, "", name)?;
        let bson_type = BsonType::from_str(&field.bson_type)
            .map_err(|e| SchemaError::malformed(origin, format!("field '{}': {}", name, e)))?;

        let spec = match (field.encrypted, &field.algorithm) {
            (true, algorithm) => {
                let algorithm = algorithm
                    .as_deref()
                    .map(|a| Algorithm::parse(a).ok_or_else(|| SchemaError::unknown_algorithm(name, a)))
                    .transpose()?;
                FieldSpec::encrypted(bson_type, algorithm)
            }
            (false, Some(_)) => {
                return Err(SchemaError::malformed(
                    origin,
                    format!("field '{}' names an algorithm but is not encrypted", name),
                ))
            }
            (false, None) => FieldSpec::plain(bson_type),
        };
        root.properties.insert(name.clone(), spec);
    }

    for name in record.required_fields {
        if !root.required.insert(name.clone()) {
            return Err(SchemaError::malformed(
                origin,
                format!("field '{}' is listed as required twice", name),
            ));
        }
    }

    let encrypt_metadata = record
        .encrypt_metadata
        .as_ref()
        .map(|meta| parse_encrypt_metadata(origin, meta))
        .transpose()?;

    Ok(SchemaDefinition {
        root,
        encrypt_metadata,
        validation_level: parse_level(origin, record.validation_level.as_ref())?,
        validation_action: parse_action(origin, record.validation_action.as_ref())?,
    })
}

fn object_to_json(schema: &ObjectSchema) -> Value {
    let mut properties = Map::new();
    for (name, spec) in &schema.properties {
        let field = match spec {
            FieldSpec::Plain(PlainField {
                object: Some(nested),
                ..
            }) => object_to_json(nested),
            FieldSpec::Plain(plain) => json!({ "bsonType": plain.bson_type.type_name() }),
            FieldSpec::Encrypted(encrypted) => {
                let mut encrypt = Map::new();
                encrypt.insert("bsonType".into(), json!(encrypted.bson_type.type_name()));
                if let Some(algorithm) = encrypted.algorithm {
                    encrypt.insert("algorithm".into(), json!(algorithm.name()));
                }
                json!({ "encrypt": encrypt })
            }
        };
        properties.insert(name.clone(), field);
    }

    let mut body = Map::new();
    body.insert("bsonType".into(), json!("object"));
    if !schema.required.is_empty() {
        body.insert("required".into(), json!(schema.required));
    }
    body.insert("properties".into(), Value::Object(properties));
    Value::Object(body)
}

fn display_path(prefix: &str) -> &str {
    if prefix.is_empty() {
        "$root"
    } else {
        prefix
    }
}
