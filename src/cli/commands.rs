//! CLI command implementations
//!
//! Every command loads the config, installs logging, then works on the
//! schema file. Document commands read JSON-lines from stdin and answer one
//! response line per document; a rejected document does not stop the run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::collection::CollectionGuard;
use crate::encryption::{annotate, decrypt_document, LocalCipher};
use crate::observability::{init_logging, Event};
use crate::schema::{SchemaDefinition, SchemaError, SchemaRegistry, SchemaValidator};
use crate::verify::{
    compare_counts, compare_documents, CountRow, DocCompareRow, Namespace, ValidationReport,
    COUNT_REPORT, DOC_COMPARE_REPORT,
};

use super::args::{Cli, Command};
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::{read_document_file, read_documents, write_error, write_response};

/// Parses arguments and runs the selected command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Runs one command.
pub fn run_command(command: Command) -> CliResult<()> {
    let config = Config::load(command.config_path())?;
    init_logging(&config.log).map_err(|e| CliError::config_error(e.message()))?;
    tracing::info!(
        event = %Event::ConfigLoaded,
        path = %command.config_path().display(),
        "config loaded"
    );

    match command {
        Command::Check { .. } => check(&config),
        Command::Define {
            namespace, schema, ..
        } => define(&config, &namespace, &schema),
        Command::Validate { namespace, .. } => validate(&config, &namespace),
        Command::Annotate { namespace, .. } => annotate_documents(&config, &namespace),
        Command::Encrypt { namespace, .. } => encrypt(&config, &namespace),
        Command::Decrypt { .. } => decrypt(&config),
        Command::Compare {
            source,
            target,
            decrypt,
            namespace,
            report,
            ..
        } => compare(
            &config,
            &CompareRequest {
                source,
                target,
                decrypt,
                namespace,
                report_dir: report,
            },
        ),
    }
}

/// Summarises every collection in the schema file.
pub fn check(config: &Config) -> CliResult<()> {
    let registry = SchemaRegistry::load_file(&config.schema_path())?;

    for namespace in registry.namespaces() {
        let schema = registry.require(namespace)?;
        write_response(describe(namespace, &schema))?;
    }
    Ok(())
}

/// Adds a collection definition to the schema file.
pub fn define(config: &Config, namespace: &str, schema_file: &Path) -> CliResult<()> {
    let origin = schema_file.display().to_string();
    let content = fs::read_to_string(schema_file)
        .map_err(|e| CliError::io_error(format!("failed to read {}: {}", origin, e)))?;
    let value: Value = serde_json::from_str(&content)?;
    let definition = SchemaDefinition::from_json(&origin, &value)?;

    let mut registry = SchemaRegistry::open(&config.schema_path())?;
    let schema = registry.define_collection(namespace, definition)?;
    let path = registry.save()?;

    let mut summary = describe(namespace, &schema);
    summary["schemaFile"] = json!(path.display().to_string());
    write_response(summary)
}

/// Validates stdin documents against a collection schema.
pub fn validate(config: &Config, namespace: &str) -> CliResult<()> {
    let registry = SchemaRegistry::load_file(&config.schema_path())?;
    let schema = registry.require(namespace)?;
    let validator = SchemaValidator::new(&schema);

    for document in read_documents() {
        let document = match document {
            Ok(document) => document,
            Err(e) => {
                write_error(e.code_str(), e.message())?;
                continue;
            }
        };

        match validator.validate_document(&document) {
            Ok(validated) => {
                tracing::debug!(event = %Event::DocumentAccepted, namespace, "document accepted");
                let warnings: Vec<Value> = validated.warnings().iter().map(error_json).collect();
                write_response(json!({ "valid": true, "warnings": warnings }))?;
            }
            Err(e) => {
                tracing::warn!(event = %Event::DocumentRejected, namespace, code = e.code().code(), "{}", e);
                write_error(e.code().code(), &e.to_string())?;
            }
        }
    }
    Ok(())
}

/// Prints the encryption plan of each stdin document.
pub fn annotate_documents(config: &Config, namespace: &str) -> CliResult<()> {
    let registry = SchemaRegistry::load_file(&config.schema_path())?;
    let schema = registry.require(namespace)?;

    for document in read_documents() {
        let document = match document {
            Ok(document) => document,
            Err(e) => {
                write_error(e.code_str(), e.message())?;
                continue;
            }
        };

        match annotate(&document, &schema) {
            Ok(plan) => write_response(serde_json::to_value(&plan)?)?,
            Err(e) => write_error(e.code().code(), &e.to_string())?,
        }
    }
    Ok(())
}

/// Validates and encrypts each stdin document.
pub fn encrypt(config: &Config, namespace: &str) -> CliResult<()> {
    let registry = SchemaRegistry::load_file(&config.schema_path())?;
    let schema = registry.require(namespace)?;
    let cipher = load_cipher(config, "encrypt")?;
    let guard = CollectionGuard::new(namespace, schema, cipher);

    for document in read_documents() {
        let document = match document {
            Ok(document) => document,
            Err(e) => {
                write_error(e.code_str(), e.message())?;
                continue;
            }
        };

        match guard.prepare_insert(&document) {
            Ok(prepared) => write_response(prepared.document)?,
            Err(e) => write_error(e.code(), &e.to_string())?,
        }
    }
    Ok(())
}

/// Decrypts each stdin document.
pub fn decrypt(config: &Config) -> CliResult<()> {
    let cipher = load_cipher(config, "decrypt")?;

    for document in read_documents() {
        let document = match document {
            Ok(document) => document,
            Err(e) => {
                write_error(e.code_str(), e.message())?;
                continue;
            }
        };

        match decrypt_document(&document, cipher.as_ref()) {
            Ok(opened) => {
                tracing::debug!(event = %Event::DocumentDecrypted, "document opened");
                write_response(opened)?;
            }
            Err(e) => write_error(e.code(), &e.to_string())?,
        }
    }
    Ok(())
}

/// Inputs of the `compare` command
#[derive(Debug, Clone, Default)]
pub struct CompareRequest {
    /// JSON-lines file of source documents
    pub source: PathBuf,
    /// JSON-lines file of target documents
    pub target: PathBuf,
    /// Decrypt both sides before comparing
    pub decrypt: bool,
    /// `<db>.<collection>` named in reports
    pub namespace: Option<String>,
    /// Directory CSV reports are written into
    pub report_dir: Option<PathBuf>,
}

impl CompareRequest {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            ..Self::default()
        }
    }

    fn report_namespace(&self) -> Namespace {
        match &self.namespace {
            Some(namespace) => Namespace::parse(namespace),
            None => Namespace {
                database: String::new(),
                collection: self
                    .source
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            },
        }
    }
}

/// Compares two JSON-lines files document by document and by count.
///
/// With a report directory, a count report and a document comparison
/// report are written there even when verification fails.
pub fn compare(config: &Config, request: &CompareRequest) -> CliResult<()> {
    let mut source_docs = read_document_file(&request.source)?;
    let mut target_docs = read_document_file(&request.target)?;

    if request.decrypt {
        let cipher = load_cipher(config, "compare --decrypt")?;
        source_docs = decrypt_all(&source_docs, &cipher)?;
        target_docs = decrypt_all(&target_docs, &cipher)?;
    }

    let documents = compare_documents(&source_docs, &target_docs);
    let counts = compare_counts(
        source_docs.len() as u64,
        target_docs.len() as u64,
        config.verification,
    );
    let valid = documents.is_valid() && counts.is_valid();

    let mut reports = Vec::new();
    if let Some(dir) = &request.report_dir {
        let namespace = request.report_namespace();
        let count_path = ValidationReport::new(COUNT_REPORT)
            .add_row(CountRow::new(&namespace, &counts))
            .write_to(dir)?;
        let compare_path = ValidationReport::new(DOC_COMPARE_REPORT)
            .add_row(DocCompareRow::new(&namespace, &documents))
            .write_to(dir)?;
        reports = vec![
            count_path.display().to_string(),
            compare_path.display().to_string(),
        ];
    }

    write_response(json!({
        "valid": valid,
        "documents": documents,
        "counts": counts,
        "reports": reports,
    }))?;

    if !valid {
        return Err(CliError::verification_failed(format!(
            "{} missing, {} mismatched, {} unexpected, {} duplicate ids; counts {} vs {}",
            documents.missing.len(),
            documents.mismatched.len(),
            documents.unexpected.len(),
            documents.duplicate_ids.len(),
            counts.source,
            counts.target
        )));
    }
    Ok(())
}

fn load_cipher(config: &Config, command: &str) -> CliResult<Arc<LocalCipher>> {
    let path = config.key_path(command)?;
    Ok(Arc::new(LocalCipher::from_key_file(&path)?))
}

fn decrypt_all(documents: &[Value], cipher: &LocalCipher) -> CliResult<Vec<Value>> {
    documents
        .iter()
        .map(|doc| decrypt_document(doc, cipher).map_err(CliError::from))
        .collect()
}

fn describe(namespace: &str, schema: &SchemaDefinition) -> Value {
    let encrypted: Vec<Value> = schema
        .encrypted_fields()
        .into_iter()
        .map(|(path, field)| {
            json!({
                "field": path,
                "bsonType": field.bson_type.type_name(),
                "algorithm": schema.resolve_algorithm(&path, field).ok().map(|a| a.name()),
            })
        })
        .collect();

    json!({
        "namespace": namespace,
        "required": schema.root.required,
        "encrypted": encrypted,
        "keyId": schema.key_id().map(|k| k.to_string()),
        "validationLevel": schema.validation_level.as_str(),
        "validationAction": schema.validation_action.as_str(),
    })
}

fn error_json(err: &SchemaError) -> Value {
    json!({ "code": err.code().code(), "message": err.to_string() })
}
