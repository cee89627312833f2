//! Schema registry backed by a schema file
//!
//! The schema file maps namespaces (`<db>.<collection>`) to collection
//! definitions:
//!
//! ```json
//! { "app.users": { "validator": { "$jsonSchema": { ... } }, "validationLevel": "strict" } }
//! ```
//!
//! Malformed definitions fail the whole load. Definitions are immutable
//! once registered.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::errors::{SchemaError, SchemaResult};
use super::types::SchemaDefinition;
use crate::observability::{log_event, Event};

/// Namespace → schema registry
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    /// Schema file, if the registry is file-backed
    path: Option<PathBuf>,
    schemas: BTreeMap<String, Arc<SchemaDefinition>>,
}

impl SchemaRegistry {
    /// Creates an empty in-memory registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a file-backed registry. A missing file yields an empty
    /// registry that `save` will create.
    pub fn open(path: &Path) -> SchemaResult<Self> {
        if !path.exists() {
            return Ok(Self {
                path: Some(path.to_path_buf()),
                schemas: BTreeMap::new(),
            });
        }
        Self::load_file(path)
    }

    /// Loads the schema file. A missing file is an error.
    pub fn load_file(path: &Path) -> SchemaResult<Self> {
        let origin = path.display().to_string();
        let content = fs::read_to_string(path)
            .map_err(|e| SchemaError::io(&origin, format!("failed to read file: {}", e)))?;

        let value: Value = serde_json::from_str(&content)
            .map_err(|e| SchemaError::malformed(&origin, format!("invalid JSON: {}", e)))?;

        let mut registry = Self::from_json(&origin, &value)?;
        registry.path = Some(path.to_path_buf());

        tracing::info!(
            event = %Event::SchemasLoaded,
            path = %origin,
            count = registry.len(),
            "schemas loaded"
        );
        Ok(registry)
    }

    /// Builds a registry from a namespace → definition map.
    pub fn from_json(origin: &str, value: &Value) -> SchemaResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            SchemaError::malformed(origin, "schema file must map namespaces to definitions")
        })?;

        let mut registry = Self::new();
        for (namespace, definition) in obj {
            let ns_origin = format!("{}#{}", origin, namespace);
            let definition = SchemaDefinition::from_json(&ns_origin, definition).map_err(|e| {
                log_event(Event::SchemaRejected, &e.to_string());
                e
            })?;
            registry.define_collection(namespace, definition)?;
        }

        Ok(registry)
    }

    /// Defines a collection schema. Fails if the namespace already has one.
    pub fn define_collection(
        &mut self,
        namespace: &str,
        definition: SchemaDefinition,
    ) -> SchemaResult<Arc<SchemaDefinition>> {
        validate_namespace(namespace)?;
        definition.validate_structure(namespace)?;

        if self.schemas.contains_key(namespace) {
            return Err(SchemaError::NamespaceExists {
                namespace: namespace.to_string(),
            });
        }

        let definition = Arc::new(definition);
        self.schemas
            .insert(namespace.to_string(), Arc::clone(&definition));

        tracing::debug!(event = %Event::CollectionDefined, namespace, "collection defined");
        Ok(definition)
    }

    /// Gets the schema for a namespace.
    pub fn get(&self, namespace: &str) -> Option<Arc<SchemaDefinition>> {
        self.schemas.get(namespace).cloned()
    }

    /// Gets the schema for a namespace or fails with `UnknownNamespace`.
    pub fn require(&self, namespace: &str) -> SchemaResult<Arc<SchemaDefinition>> {
        self.get(namespace).ok_or_else(|| SchemaError::UnknownNamespace {
            namespace: namespace.to_string(),
        })
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.schemas.contains_key(namespace)
    }

    /// Registered namespaces in sorted order
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Returns the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Serialises the registry in collection-options form.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .schemas
            .iter()
            .map(|(ns, def)| (ns.clone(), def.to_collection_options()))
            .collect();
        Value::Object(map)
    }

    /// Writes the registry back to its schema file.
    pub fn save(&self) -> SchemaResult<PathBuf> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| SchemaError::malformed("<in-memory>", "registry has no schema file"))?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Writes the registry to `path`.
    pub fn save_to(&self, path: &Path) -> SchemaResult<()> {
        let origin = path.display().to_string();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    SchemaError::io(&origin, format!("failed to create directory: {}", e))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(&self.to_json())
            .map_err(|e| SchemaError::malformed(&origin, format!("failed to serialize: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| SchemaError::io(&origin, format!("failed to write file: {}", e)))?;

        tracing::info!(event = %Event::RegistrySaved, path = %origin, count = self.len(), "registry saved");
        Ok(())
    }
}

/// Namespaces are `<db>.<collection>` with both parts non-empty.
fn validate_namespace(namespace: &str) -> SchemaResult<()> {
    match namespace.split_once('.') {
        Some((db, coll)) if !db.is_empty() && !coll.is_empty() && !db.contains('$') => Ok(()),
        _ => Err(SchemaError::malformed(
            namespace,
            "namespace must have the form '<db>.<collection>'",
        )),
    }
}
