//! Document-by-document comparison
//!
//! Target documents are indexed by `_id`. Each source document is then
//! matched, missing from the target, or mismatched. Target ids never seen
//! in the source are unexpected.
//!
//! An `_id` that occurs more than once on either side is reported as a
//! duplicate. Only its first occurrence takes part in the comparison.
//!
//! Ids are compared in canonical form: the compact JSON encoding of the
//! `_id` value, whose object keys are always sorted.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::observability::Event;

/// Outcome of a document comparison
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompareReport {
    pub matched: usize,
    /// Source ids absent from the target
    pub missing: Vec<String>,
    /// Ids whose contents differ
    pub mismatched: Vec<String>,
    /// Target ids absent from the source
    pub unexpected: Vec<String>,
    /// Source documents without an `_id`
    pub missing_id: usize,
    /// Ids occurring more than once in the source or the target
    pub duplicate_ids: Vec<String>,
}

impl CompareReport {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty()
            && self.mismatched.is_empty()
            && self.unexpected.is_empty()
            && self.duplicate_ids.is_empty()
    }

    /// Number of distinct source documents examined
    pub fn source_total(&self) -> usize {
        self.matched + self.missing.len() + self.mismatched.len() + self.missing_id
    }
}

/// Canonical string form of a document's `_id`, if it has one.
pub fn canonical_id(document: &Value) -> Option<String> {
    document.get("_id").map(Value::to_string)
}

/// Compares `source` documents against `target` documents.
pub fn compare_documents(source: &[Value], target: &[Value]) -> CompareReport {
    let mut duplicates = BTreeSet::new();

    let mut by_id: BTreeMap<String, &Value> = BTreeMap::new();
    for doc in target {
        if let Some(id) = canonical_id(doc) {
            if by_id.contains_key(&id) {
                tracing::warn!(event = %Event::DuplicateId, id = %id, side = "target", "duplicate _id");
                duplicates.insert(id);
            } else {
                by_id.insert(id, doc);
            }
        }
    }

    let mut report = CompareReport::default();
    let mut seen = BTreeSet::new();

    for src in source {
        let Some(id) = canonical_id(src) else {
            report.missing_id += 1;
            continue;
        };

        if !seen.insert(id.clone()) {
            tracing::warn!(event = %Event::DuplicateId, id = %id, side = "source", "duplicate _id");
            duplicates.insert(id);
            continue;
        }

        match by_id.get(&id) {
            None => {
                tracing::warn!(event = %Event::DocumentMissing, id = %id, "missing document in target");
                report.missing.push(id);
            }
            Some(tgt) if *tgt != src => {
                tracing::warn!(event = %Event::DocumentMismatched, id = %id, "document contents differ");
                report.mismatched.push(id);
            }
            Some(_) => {
                tracing::debug!(event = %Event::DocumentMatched, id = %id, "document matched");
                report.matched += 1;
            }
        }
    }

    for id in by_id.into_keys().filter(|id| !seen.contains(id)) {
        tracing::warn!(event = %Event::DocumentUnexpected, id = %id, "document only in target");
        report.unexpected.push(id);
    }
    report.duplicate_ids = duplicates.into_iter().collect();

    tracing::info!(
        event = %Event::CompareComplete,
        matched = report.matched,
        missing = report.missing.len(),
        mismatched = report.mismatched.len(),
        unexpected = report.unexpected.len(),
        duplicates = report.duplicate_ids.len(),
        valid = report.is_valid(),
        "document comparison complete"
    );

    report
}
