//! Schema type definitions
//!
//! Documents are `serde_json::Value` objects. Types JSON cannot express
//! natively use MongoDB Extended JSON wrappers:
//! - date: `{"$date": "2024-01-01T00:00:00Z"}`, `{"$date": 1704067200000}`
//!   or `{"$date": {"$numberLong": "1704067200000"}}`
//! - objectId: `{"$oid": "<24 hex chars>"}`
//! - binData: `{"$binary": {"base64": "...", "subType": "06"}}`

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::errors::{SchemaError, SchemaResult};

/// BSON types a field may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BsonType {
    Double,
    String,
    Object,
    Array,
    BinData,
    ObjectId,
    Bool,
    Date,
    Null,
    Int,
    Long,
    /// Alias matching int, long and double
    Number,
}

impl BsonType {
    /// Returns the type name as written in `bsonType`
    pub fn type_name(&self) -> &'static str {
        match self {
            BsonType::Double => "double",
            BsonType::String => "string",
            BsonType::Object => "object",
            BsonType::Array => "array",
            BsonType::BinData => "binData",
            BsonType::ObjectId => "objectId",
            BsonType::Bool => "bool",
            BsonType::Date => "date",
            BsonType::Null => "null",
            BsonType::Int => "int",
            BsonType::Long => "long",
            BsonType::Number => "number",
        }
    }

    /// BSON element type byte. `Number` is an alias and has none.
    pub fn type_byte(&self) -> Option<u8> {
        match self {
            BsonType::Double => Some(0x01),
            BsonType::String => Some(0x02),
            BsonType::Object => Some(0x03),
            BsonType::Array => Some(0x04),
            BsonType::BinData => Some(0x05),
            BsonType::ObjectId => Some(0x07),
            BsonType::Bool => Some(0x08),
            BsonType::Date => Some(0x09),
            BsonType::Null => Some(0x0A),
            BsonType::Int => Some(0x10),
            BsonType::Long => Some(0x12),
            BsonType::Number => None,
        }
    }

    pub fn from_type_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(BsonType::Double),
            0x02 => Some(BsonType::String),
            0x03 => Some(BsonType::Object),
            0x04 => Some(BsonType::Array),
            0x05 => Some(BsonType::BinData),
            0x07 => Some(BsonType::ObjectId),
            0x08 => Some(BsonType::Bool),
            0x09 => Some(BsonType::Date),
            0x0A => Some(BsonType::Null),
            0x10 => Some(BsonType::Int),
            0x12 => Some(BsonType::Long),
            _ => None,
        }
    }

    /// Returns whether a value of type `actual` satisfies this declared type.
    pub fn accepts(&self, actual: BsonType) -> bool {
        match (self, actual) {
            (declared, actual) if *declared == actual => true,
            (BsonType::Long, BsonType::Int) => true,
            (BsonType::Double, BsonType::Int | BsonType::Long) => true,
            (BsonType::Number, BsonType::Int | BsonType::Long | BsonType::Double) => true,
            _ => false,
        }
    }

    /// Returns whether `value` is of this type
    pub fn matches(&self, value: &Value) -> bool {
        self.accepts(bson_type_of(value))
    }

    /// Types deterministic encryption refuses: values with few distinct
    /// plaintexts, or containers.
    pub fn allows_deterministic(&self) -> bool {
        !matches!(
            self,
            BsonType::Double
                | BsonType::Bool
                | BsonType::Object
                | BsonType::Array
                | BsonType::Null
                | BsonType::Number
        )
    }
}

impl FromStr for BsonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "double" => Ok(BsonType::Double),
            "string" => Ok(BsonType::String),
            "object" => Ok(BsonType::Object),
            "array" => Ok(BsonType::Array),
            "binData" => Ok(BsonType::BinData),
            "objectId" => Ok(BsonType::ObjectId),
            "bool" => Ok(BsonType::Bool),
            "date" => Ok(BsonType::Date),
            "null" => Ok(BsonType::Null),
            "int" => Ok(BsonType::Int),
            "long" => Ok(BsonType::Long),
            "number" => Ok(BsonType::Number),
            other => Err(format!("unknown bsonType '{}'", other)),
        }
    }
}

impl fmt::Display for BsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Classifies a JSON value, recognising Extended JSON wrappers.
pub fn bson_type_of(value: &Value) -> BsonType {
    match value {
        Value::Null => BsonType::Null,
        Value::Bool(_) => BsonType::Bool,
        Value::Number(n) => match n.as_i64() {
            Some(i) if i32::try_from(i).is_ok() => BsonType::Int,
            Some(_) => BsonType::Long,
            None if n.is_u64() => BsonType::Long,
            None => BsonType::Double,
        },
        Value::String(_) => BsonType::String,
        Value::Array(_) => BsonType::Array,
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(date) = map.get("$date") {
                    if is_extended_date(date) {
                        return BsonType::Date;
                    }
                }
                if let Some(Value::String(oid)) = map.get("$oid") {
                    if oid.len() == 24 && oid.chars().all(|c| c.is_ascii_hexdigit()) {
                        return BsonType::ObjectId;
                    }
                }
                if let Some(Value::Object(binary)) = map.get("$binary") {
                    if binary.get("base64").map_or(false, Value::is_string) {
                        return BsonType::BinData;
                    }
                }
            }
            BsonType::Object
        }
    }
}

fn is_extended_date(value: &Value) -> bool {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s).is_ok(),
        Value::Number(n) => n.is_i64(),
        Value::Object(map) => map.len() == 1
            && map
                .get("$numberLong")
                .and_then(Value::as_str)
                .map_or(false, |s| s.parse::<i64>().is_ok()),
        _ => false,
    }
}

/// Encryption algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Same plaintext and key always give the same ciphertext
    Deterministic,
    /// Fresh ciphertext on every call
    Random,
}

impl Algorithm {
    pub const DETERMINISTIC_NAME: &'static str = "AEAD_AES_256_CBC_HMAC_SHA_512-Deterministic";
    pub const RANDOM_NAME: &'static str = "AEAD_AES_256_CBC_HMAC_SHA_512-Random";

    /// Canonical algorithm name as stored in schemas
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Deterministic => Self::DETERMINISTIC_NAME,
            Algorithm::Random => Self::RANDOM_NAME,
        }
    }

    /// Parses a canonical or short (`deterministic`, `random`) name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            Self::DETERMINISTIC_NAME | "deterministic" => Some(Algorithm::Deterministic),
            Self::RANDOM_NAME | "random" => Some(Algorithm::Random),
            _ => None,
        }
    }

    /// Leading byte of an encrypted payload
    pub fn envelope_byte(&self) -> u8 {
        match self {
            Algorithm::Deterministic => 1,
            Algorithm::Random => 2,
        }
    }

    pub fn from_envelope_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Algorithm::Deterministic),
            2 => Some(Algorithm::Random),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque data-key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(pub Uuid);

impl KeyId {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl FromStr for KeyId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(KeyId)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collection-wide encryption defaults (`encryptMetadata`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptMetadata {
    pub key_id: KeyId,
    /// Applied to encrypted fields that name no algorithm
    pub algorithm: Option<Algorithm>,
}

/// How much of the schema is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// No validation
    Off,
    /// Required fields and types only; undeclared fields are tolerated
    Warn,
    /// Required fields, types, and no undeclared fields
    #[default]
    Strict,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::Off => "off",
            ValidationLevel::Warn => "warn",
            ValidationLevel::Strict => "strict",
        }
    }

    /// Parses a level name. `moderate` is MongoDB's name for the
    /// non-strict level.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "off" => Some(ValidationLevel::Off),
            "warn" | "moderate" => Some(ValidationLevel::Warn),
            "strict" => Some(ValidationLevel::Strict),
            _ => None,
        }
    }
}

/// What happens to a document that fails validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationAction {
    /// Accept the document and log the violation
    Warn,
    /// Reject the document
    #[default]
    Error,
}

impl ValidationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationAction::Warn => "warn",
            ValidationAction::Error => "error",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "warn" => Some(ValidationAction::Warn),
            "error" => Some(ValidationAction::Error),
            _ => None,
        }
    }
}

/// An unencrypted field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainField {
    pub bson_type: BsonType,
    /// Nested schema, only for `object` fields that declare `properties`
    pub object: Option<ObjectSchema>,
}

/// A field encrypted before persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    /// Plaintext type
    pub bson_type: BsonType,
    /// Overrides the collection default when set
    pub algorithm: Option<Algorithm>,
}

/// Per-field specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
    Plain(PlainField),
    Encrypted(EncryptedField),
}

impl FieldSpec {
    pub fn plain(bson_type: BsonType) -> Self {
        FieldSpec::Plain(PlainField {
            bson_type,
            object: None,
        })
    }

    pub fn object(schema: ObjectSchema) -> Self {
        FieldSpec::Plain(PlainField {
            bson_type: BsonType::Object,
            object: Some(schema),
        })
    }

    pub fn encrypted(bson_type: BsonType, algorithm: Option<Algorithm>) -> Self {
        FieldSpec::Encrypted(EncryptedField {
            bson_type,
            algorithm,
        })
    }

    /// Declared (plaintext) type
    pub fn bson_type(&self) -> BsonType {
        match self {
            FieldSpec::Plain(plain) => plain.bson_type,
            FieldSpec::Encrypted(encrypted) => encrypted.bson_type,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, FieldSpec::Encrypted(_))
    }
}

/// Field declarations for one object level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectSchema {
    pub required: BTreeSet<String>,
    pub properties: BTreeMap<String, FieldSpec>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.properties.insert(name.into(), spec);
        self
    }

    /// Declares a field and marks it required
    pub fn required_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        let name = name.into();
        self.required.insert(name.clone());
        self.properties.insert(name, spec);
        self
    }

    /// Checks that every required name is declared, recursively.
    fn validate_structure(&self, prefix: &str, origin: &str) -> SchemaResult<()> {
        for name in &self.required {
            if !self.properties.contains_key(name) {
                return Err(SchemaError::malformed(
                    origin,
                    format!("required field '{}' is not declared", join_path(prefix, name)),
                ));
            }
        }

        for (name, spec) in &self.properties {
            check_property_name(origin, prefix, name)?;
            let path = join_path(prefix, name);
            match spec {
                FieldSpec::Plain(PlainField {
                    bson_type,
                    object: Some(nested),
                }) => {
                    if *bson_type != BsonType::Object {
                        return Err(SchemaError::malformed(
                            origin,
                            format!("field '{}' declares properties but is not an object", path),
                        ));
                    }
                    nested.validate_structure(&path, origin)?;
                }
                FieldSpec::Plain(_) => {}
                FieldSpec::Encrypted(encrypted) => match encrypted.bson_type {
                    BsonType::Null => {
                        return Err(SchemaError::malformed(
                            origin,
                            format!("field '{}' cannot encrypt null", path),
                        ));
                    }
                    BsonType::Object => {
                        return Err(SchemaError::malformed(
                            origin,
                            format!("field '{}' cannot encrypt an object; encrypt its fields instead", path),
                        ));
                    }
                    _ => {}
                },
            }
        }

        Ok(())
    }
}

/// A complete collection schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefinition {
    pub root: ObjectSchema,
    pub encrypt_metadata: Option<EncryptMetadata>,
    pub validation_level: ValidationLevel,
    pub validation_action: ValidationAction,
}

impl SchemaDefinition {
    /// Creates a strict, erroring schema with no encryption defaults
    pub fn new(root: ObjectSchema) -> Self {
        Self {
            root,
            encrypt_metadata: None,
            validation_level: ValidationLevel::Strict,
            validation_action: ValidationAction::Error,
        }
    }

    pub fn with_encrypt_metadata(mut self, key_id: KeyId, algorithm: Option<Algorithm>) -> Self {
        self.encrypt_metadata = Some(EncryptMetadata { key_id, algorithm });
        self
    }

    pub fn with_validation_level(mut self, level: ValidationLevel) -> Self {
        self.validation_level = level;
        self
    }

    pub fn with_validation_action(mut self, action: ValidationAction) -> Self {
        self.validation_action = action;
        self
    }

    /// Collection key id, if encryption is configured
    pub fn key_id(&self) -> Option<KeyId> {
        self.encrypt_metadata.as_ref().map(|m| m.key_id)
    }

    /// Default algorithm from `encryptMetadata`
    pub fn default_algorithm(&self) -> Option<Algorithm> {
        self.encrypt_metadata.as_ref().and_then(|m| m.algorithm)
    }

    /// Resolves the algorithm for an encrypted field.
    ///
    /// Fails with `UnknownAlgorithm` when neither the field nor the
    /// collection names one.
    pub fn resolve_algorithm(&self, path: &str, field: &EncryptedField) -> SchemaResult<Algorithm> {
        field
            .algorithm
            .or_else(|| self.default_algorithm())
            .ok_or_else(|| SchemaError::unknown_algorithm(path, "<unspecified>"))
    }

    /// All encrypted fields with their dotted paths, in path order
    pub fn encrypted_fields(&self) -> Vec<(String, &EncryptedField)> {
        let mut out = Vec::new();
        collect_encrypted(&self.root, "", &mut out);
        out
    }

    /// Validates the schema itself (not a document).
    pub fn validate_structure(&self, origin: &str) -> SchemaResult<()> {
        self.root.validate_structure("", origin)?;

        let encrypted = self.encrypted_fields();
        if !encrypted.is_empty() && self.encrypt_metadata.is_none() {
            return Err(SchemaError::malformed(
                origin,
                "encrypted fields require encryptMetadata with a keyId",
            ));
        }

        for (path, field) in encrypted {
            let algorithm = self.resolve_algorithm(&path, field)?;
            if algorithm == Algorithm::Deterministic && !field.bson_type.allows_deterministic() {
                return Err(SchemaError::malformed(
                    origin,
                    format!(
                        "field '{}' of type {} cannot use deterministic encryption",
                        path, field.bson_type
                    ),
                ));
            }
        }

        Ok(())
    }
}

fn collect_encrypted<'a>(
    schema: &'a ObjectSchema,
    prefix: &str,
    out: &mut Vec<(String, &'a EncryptedField)>,
) {
    for (name, spec) in &schema.properties {
        let path = join_path(prefix, name);
        match spec {
            FieldSpec::Encrypted(field) => out.push((path, field)),
            FieldSpec::Plain(PlainField {
                object: Some(nested),
                ..
            }) => collect_encrypted(nested, &path, out),
            FieldSpec::Plain(_) => {}
        }
    }
}

/// Rejects property names that cannot be addressed as one path segment.
///
/// Paths are joined with `.`, and `$` prefixes belong to Extended JSON.
pub(crate) fn check_property_name(origin: &str, prefix: &str, name: &str) -> SchemaResult<()> {
    let problem = if name.is_empty() {
        "must not be empty"
    } else if name.contains('.') {
        "must not contain '.'"
    } else if name.starts_with('$') {
        "must not start with '$'"
    } else {
        return Ok(());
    };
    let parent = if prefix.is_empty() { "$root" } else { prefix };
    Err(SchemaError::malformed(
        origin,
        format!("property name '{}' under '{}' {}", name, parent, problem),
    ))
}

/// Creates a field path from prefix and field name.
pub fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}
