//! Migration verification
//!
//! Compares a source document set against its migrated target, either
//! document by document (`compare`) or by count only (`count`), and
//! writes CSV reports of the outcome (`report`).

pub mod compare;
pub mod count;
pub mod report;

pub use compare::{canonical_id, compare_documents, CompareReport};
pub use count::{compare_counts, CountOptions, CountOutcome, CountReport};
pub use report::{
    CountRow, DocCompareRow, Namespace, ReportError, ValidationReport, COUNT_REPORT, DOC_COMPARE_REPORT,
};
