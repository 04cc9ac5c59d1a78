use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FailureReason, RecordError};

/// One already-fetched record from an external source, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawRecord {
    pub source_id: String,
    /// Location of the record within the fetched payload, kept for audit
    #[serde(default)]
    pub record_path: String,
    pub record: serde_json::Value,
}

/// Tested-sample count as reported by a source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TestedSampleCount {
    Reported(u64),
    /// The source has no cohort size for this record
    NotAvailable,
}

impl TestedSampleCount {
    pub fn reported(&self) -> Option<u64> {
        match self {
            TestedSampleCount::Reported(n) => Some(*n),
            TestedSampleCount::NotAvailable => None,
        }
    }
}

/// A source record in the common intermediate shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawObservation {
    pub gene_symbol: String,
    pub source_cancer_label: String,
    pub source_id: String,
    /// Study the counts were measured in, when the source has one
    pub study_id: Option<String>,
    /// Source-declared sequencing assay family (e.g. WES, targeted panel)
    pub assay_family: Option<String>,
    pub genomic_change: String,
    pub mutated_sample_count: u64,
    pub tested_sample_count: TestedSampleCount,
    pub evidence_refs: Vec<String>,
    pub record_path: String,
}

/// Controlled-vocabulary cancer type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalCancerType {
    pub category: String,
    pub subtype: Option<String>,
}

impl CanonicalCancerType {
    pub fn new(category: &str, subtype: Option<&str>) -> Self {
        Self {
            category: category.to_string(),
            subtype: subtype.map(|s| s.to_string()),
        }
    }
}

impl fmt::Display for CanonicalCancerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subtype {
            Some(subtype) => write!(f, "{} / {}", self.category, subtype),
            None => write!(f, "{}", self.category),
        }
    }
}

/// An input record excluded from aggregation, queued for operator review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutedFailure {
    pub reason: FailureReason,
    pub detail: String,
    pub source_id: String,
    pub record_path: String,
    pub raw: serde_json::Value,
}

impl RoutedFailure {
    pub fn new(error: &RecordError, record: &RawRecord) -> Self {
        Self {
            reason: error.reason(),
            detail: error.to_string(),
            source_id: record.source_id.clone(),
            record_path: record.record_path.clone(),
            raw: record.record.clone(),
        }
    }
}
