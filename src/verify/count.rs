//! Count comparison

use serde::{Deserialize, Serialize};

use crate::observability::Event;

/// Count comparison settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountOptions {
    /// When false, two empty collections are skipped instead of validated
    #[serde(default = "default_validate_empty")]
    pub validate_empty_collections: bool,
}

fn default_validate_empty() -> bool {
    true
}

impl Default for CountOptions {
    fn default() -> Self {
        Self {
            validate_empty_collections: default_validate_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CountOutcome {
    Valid,
    Invalid,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountReport {
    pub source: u64,
    pub target: u64,
    pub outcome: CountOutcome,
}

impl CountReport {
    /// Skipped comparisons do not fail verification.
    pub fn is_valid(&self) -> bool {
        self.outcome != CountOutcome::Invalid
    }
}

/// Compares document counts of a source and a target collection.
pub fn compare_counts(source: u64, target: u64, options: CountOptions) -> CountReport {
    let outcome = if source == 0 && target == 0 && !options.validate_empty_collections {
        CountOutcome::Skipped
    } else if source == target {
        CountOutcome::Valid
    } else {
        CountOutcome::Invalid
    };

    let report = CountReport {
        source,
        target,
        outcome,
    };

    if outcome == CountOutcome::Invalid {
        tracing::warn!(event = %Event::CountCompared, source_count = source, target_count = target, "document counts differ");
    } else {
        tracing::info!(event = %Event::CountCompared, source_count = source, target_count = target, outcome = ?outcome, "document counts compared");
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_counts_valid() {
        let report = compare_counts(10, 10, CountOptions::default());
        assert_eq!(report.outcome, CountOutcome::Valid);
        assert!(report.is_valid());
    }

    #[test]
    fn test_unequal_counts_invalid() {
        let report = compare_counts(10, 9, CountOptions::default());
        assert_eq!(report.outcome, CountOutcome::Invalid);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_empty_collections() {
        assert_eq!(
            compare_counts(0, 0, CountOptions::default()).outcome,
            CountOutcome::Valid
        );

        let skip = CountOptions {
            validate_empty_collections: false,
        };
        let report = compare_counts(0, 0, skip);
        assert_eq!(report.outcome, CountOutcome::Skipped);
        assert!(report.is_valid());

        assert_eq!(compare_counts(0, 3, skip).outcome, CountOutcome::Invalid);
    }

    #[test]
    fn test_options_default_from_json() {
        let options: CountOptions = serde_json::from_str("{}").unwrap();
        assert!(options.validate_empty_collections);
    }
}
