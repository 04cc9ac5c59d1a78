// Plausibility validation: the last checkpoint before storage

pub mod references;

pub use references::{HotspotRange, HotspotReferenceTable};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ValidationSettings;
use crate::observability::metrics;
use crate::pipeline::processing::denominator::DenominatorState;
use crate::pipeline::processing::estimate::{EstimatedRecord, FrequencyEstimate};
use crate::pipeline::processing::merge::{MergeKey, MergedMutationRecord};

/// Why a record was flagged for human review
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FlagReason {
    OutOfExpectedRange {
        expected_low: f64,
        expected_high: f64,
        tolerance: f64,
        observed: f64,
        /// Set when the flagged value is one partition of a non-homogeneous record
        basis_class: Option<String>,
    },
    FrequencyOutOfBounds {
        observed: f64,
        basis_class: Option<String>,
    },
    MutatedExceedsTested {
        mutated: u64,
        tested: u64,
        basis_class: Option<String>,
    },
}

impl FlagReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagReason::OutOfExpectedRange { .. } => "out_of_expected_range",
            FlagReason::FrequencyOutOfBounds { .. } => "frequency_out_of_bounds",
            FlagReason::MutatedExceedsTested { .. } => "mutated_exceeds_tested",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Accepted,
    Flagged(FlagReason),
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Accepted => "accepted",
            ValidationStatus::Flagged(_) => "flagged",
        }
    }
}

/// Observations worth a reviewer's attention that do not change the status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "note", rename_all = "snake_case")]
pub enum ReviewNote {
    WideConfidenceInterval { width: f64, threshold: f64 },
    SaturatedFrequency { observed: f64, threshold: f64 },
    /// One study reports every tested sample as mutated. Either genuinely
    /// 100%, or a cohort that was never really counted.
    SingleSourceSaturation {
        source_id: String,
        study_id: Option<String>,
        samples: u64,
    },
}

impl ReviewNote {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewNote::WideConfidenceInterval { .. } => "wide_confidence_interval",
            ReviewNote::SaturatedFrequency { .. } => "saturated_frequency",
            ReviewNote::SingleSourceSaturation { .. } => "single_source_saturation",
        }
    }
}

/// Terminal artifact of the pipeline, handed to storage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationOutcome {
    pub record: EstimatedRecord,
    pub status: ValidationStatus,
    pub notes: Vec<ReviewNote>,
}

/// Row shape consumed by the storage collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageRow {
    pub gene_symbol: String,
    pub canonical_category: String,
    pub canonical_subtype: Option<String>,
    pub genomic_change: String,
    /// Absent when contributions span incompatible bases
    pub mutated_total: Option<u64>,
    pub tested_total: Option<u64>,
    pub point_frequency: Option<f64>,
    pub ci_low: Option<f64>,
    pub ci_high: Option<f64>,
    pub contributing_sources: Vec<String>,
    pub status: String,
    pub merge_status: String,
    pub flag_reason: Option<String>,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

impl ValidationOutcome {
    pub fn merged(&self) -> &MergedMutationRecord {
        &self.record.record
    }

    pub fn is_accepted(&self) -> bool {
        self.status == ValidationStatus::Accepted
    }

    pub fn to_storage_row(&self) -> StorageRow {
        let merged = self.merged();
        let estimate = self.record.estimate.as_ref();
        StorageRow {
            gene_symbol: merged.key.gene_symbol.clone(),
            canonical_category: merged.key.cancer_type.category.clone(),
            canonical_subtype: merged.key.cancer_type.subtype.clone(),
            genomic_change: merged.key.genomic_change.clone(),
            mutated_total: merged.mutated_total(),
            tested_total: merged.tested_total(),
            point_frequency: estimate.map(|e| round4(e.point_frequency)),
            ci_low: estimate.map(|e| round4(e.ci_low)),
            ci_high: estimate.map(|e| round4(e.ci_high)),
            contributing_sources: merged.contributing_sources(),
            status: self.status.as_str().to_string(),
            merge_status: merged.status.as_str().to_string(),
            flag_reason: match &self.status {
                ValidationStatus::Flagged(reason) => Some(reason.as_str().to_string()),
                ValidationStatus::Accepted => None,
            },
        }
    }
}

/// Trait for the final plausibility checkpoint
pub trait PlausibilityValidator: Send + Sync {
    fn validate(&self, record: EstimatedRecord) -> ValidationOutcome;
}

pub struct DefaultPlausibilityValidator {
    references: Arc<HotspotReferenceTable>,
    settings: ValidationSettings,
}

impl DefaultPlausibilityValidator {
    pub fn new(references: Arc<HotspotReferenceTable>, settings: ValidationSettings) -> Self {
        Self {
            references,
            settings,
        }
    }

    fn structural_check(
        &self,
        estimate: &FrequencyEstimate,
        mutated: u64,
        basis_class: Option<&str>,
    ) -> Option<FlagReason> {
        if !(0.0..=1.0).contains(&estimate.point_frequency) {
            return Some(FlagReason::FrequencyOutOfBounds {
                observed: estimate.point_frequency,
                basis_class: basis_class.map(str::to_string),
            });
        }
        if mutated > estimate.basis_sample_size {
            return Some(FlagReason::MutatedExceedsTested {
                mutated,
                tested: estimate.basis_sample_size,
                basis_class: basis_class.map(str::to_string),
            });
        }
        None
    }

    fn check_estimate(
        &self,
        record: &EstimatedRecord,
        estimate: &FrequencyEstimate,
        notes: &mut Vec<ReviewNote>,
    ) -> ValidationStatus {
        let mutated = record.record.mutated_total().unwrap_or_default();
        if let Some(reason) = self.structural_check(estimate, mutated, None) {
            return ValidationStatus::Flagged(reason);
        }

        let width = estimate.interval_width();
        if width > self.settings.wide_interval_threshold {
            notes.push(ReviewNote::WideConfidenceInterval {
                width,
                threshold: self.settings.wide_interval_threshold,
            });
        }
        if estimate.point_frequency >= self.settings.saturation_threshold {
            notes.push(ReviewNote::SaturatedFrequency {
                observed: estimate.point_frequency,
                threshold: self.settings.saturation_threshold,
            });
        }

        match self.range_check(&record.record.key, estimate.point_frequency, None) {
            Some(reason) => ValidationStatus::Flagged(reason),
            None => ValidationStatus::Accepted,
        }
    }

    /// Compare against the curated hotspot range, widened by the tolerance
    fn range_check(&self, key: &MergeKey, observed: f64, basis_class: Option<&str>) -> Option<FlagReason> {
        let range = self.references.lookup(key)?;
        let tolerance = self.settings.tolerance;
        if observed < range.low - tolerance || observed > range.high + tolerance {
            return Some(FlagReason::OutOfExpectedRange {
                expected_low: range.low,
                expected_high: range.high,
                tolerance,
                observed,
                basis_class: basis_class.map(str::to_string),
            });
        }
        None
    }

    /// Records without a single estimate are checked partition by partition.
    /// Each resolved partition must also sit inside the hotspot range, so a
    /// saturated cohort cannot hide behind a catalog source.
    fn check_partitions(&self, record: &EstimatedRecord) -> ValidationStatus {
        for partition in &record.partition_estimates {
            let basis_class = Some(partition.basis_class.as_str());
            let reason = self
                .structural_check(&partition.estimate, partition.mutated_total, basis_class)
                .or_else(|| self.range_check(&record.record.key, partition.estimate.point_frequency, basis_class));
            if let Some(reason) = reason {
                return ValidationStatus::Flagged(reason);
            }
        }
        ValidationStatus::Accepted
    }

    fn saturation_notes(&self, record: &MergedMutationRecord, notes: &mut Vec<ReviewNote>) {
        for contribution in record.counted() {
            let raw = &contribution.observation.observation;
            if let DenominatorState::Resolved { tested, .. } = contribution.observation.denominator {
                if tested > 0 && raw.mutated_sample_count == tested {
                    notes.push(ReviewNote::SingleSourceSaturation {
                        source_id: raw.source_id.clone(),
                        study_id: raw.study_id.clone(),
                        samples: tested,
                    });
                }
            }
        }
    }
}

impl PlausibilityValidator for DefaultPlausibilityValidator {
    fn validate(&self, record: EstimatedRecord) -> ValidationOutcome {
        let mut notes = Vec::new();
        let status = match &record.estimate {
            Some(estimate) => self.check_estimate(&record, estimate, &mut notes),
            None => self.check_partitions(&record),
        };
        self.saturation_notes(&record.record, &mut notes);

        match &status {
            ValidationStatus::Accepted => metrics::validate::accepted(),
            ValidationStatus::Flagged(reason) => metrics::validate::flagged(reason.as_str()),
        }
        for note in &notes {
            metrics::validate::review_note(note.as_str());
        }

        ValidationOutcome {
            record,
            status,
            notes,
        }
    }
}
