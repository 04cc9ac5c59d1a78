use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::processing::canonicalize::TaxonomyError;

#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),

    /// The run had nothing to aggregate. This is the only run-level failure.
    #[error("No input records were supplied to the aggregation run")]
    NoInput,
}

pub type Result<T> = std::result::Result<T, AggregatorError>;

/// Per-record early exits. None of these abort a run; each is routed to the
/// operator review queue.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Malformed record from '{source_id}': {detail}")]
    MalformedRecord { source_id: String, detail: String },

    #[error("Unmapped cancer type '{label}' from '{source_id}'")]
    UnmappedCancerType { source_id: String, label: String },

    #[error("Invalid denominator from '{source_id}': {mutated} mutated > {tested} tested")]
    InvalidDenominator {
        source_id: String,
        mutated: u64,
        tested: u64,
    },
}

impl RecordError {
    pub fn malformed(source_id: &str, detail: impl Into<String>) -> Self {
        RecordError::MalformedRecord {
            source_id: source_id.to_string(),
            detail: detail.into(),
        }
    }

    pub fn missing_field(source_id: &str, field: &str) -> Self {
        Self::malformed(source_id, format!("missing required field: {}", field))
    }

    pub fn reason(&self) -> FailureReason {
        match self {
            RecordError::MalformedRecord { .. } => FailureReason::MalformedRecord,
            RecordError::UnmappedCancerType { .. } => FailureReason::UnmappedCancerType,
            RecordError::InvalidDenominator { .. } => FailureReason::InvalidDenominator,
        }
    }
}

/// Reason code carried by every entry of the review queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureReason {
    MalformedRecord,
    UnmappedCancerType,
    InvalidDenominator,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::MalformedRecord => "malformed_record",
            FailureReason::UnmappedCancerType => "unmapped_cancer_type",
            FailureReason::InvalidDenominator => "invalid_denominator",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_reason_codes() {
        let err = RecordError::missing_field("cosmic", "gene");
        assert_eq!(err.reason(), FailureReason::MalformedRecord);
        assert!(err.to_string().contains("missing required field: gene"));

        let err = RecordError::InvalidDenominator {
            source_id: "cbioportal".to_string(),
            mutated: 12,
            tested: 10,
        };
        assert_eq!(err.reason().as_str(), "invalid_denominator");
    }
}
