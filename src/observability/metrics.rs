//! Metrics for the aggregation pipeline
//!
//! Recording goes through the `metrics` facade. Nothing is exported until
//! [`init`] installs the Prometheus recorder; before that every call is a
//! no-op, which is what unit tests rely on.

use std::fmt;
use std::sync::OnceLock;
use tracing::info;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Normalize metrics
    NormalizeRecordsProcessed,
    NormalizeRecordsRejected,

    // Canonicalize metrics
    CanonicalizeLabelsMapped,
    CanonicalizeLabelsUnmapped,

    // Denominator metrics
    DenominatorResolved,
    DenominatorUnresolved,
    DenominatorInvalid,

    // Merge metrics
    MergeGroupsCreated,
    MergeGroupSize,
    MergeDuplicateConflicts,

    // Estimate metrics
    EstimateComputed,
    EstimateWithheld,
    EstimateIntervalWidth,

    // Validate metrics
    ValidateAccepted,
    ValidateFlagged,
    ValidateReviewNotes,

    // Run metrics
    RunCompleted,
    RunFailed,
    RunDuration,
    RunInputRecords,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::NormalizeRecordsProcessed => "oncohotspot_normalize_records_processed_total",
            MetricName::NormalizeRecordsRejected => "oncohotspot_normalize_records_rejected_total",

            MetricName::CanonicalizeLabelsMapped => "oncohotspot_canonicalize_labels_mapped_total",
            MetricName::CanonicalizeLabelsUnmapped => "oncohotspot_canonicalize_labels_unmapped_total",

            MetricName::DenominatorResolved => "oncohotspot_denominator_resolved_total",
            MetricName::DenominatorUnresolved => "oncohotspot_denominator_unresolved_total",
            MetricName::DenominatorInvalid => "oncohotspot_denominator_invalid_total",

            MetricName::MergeGroupsCreated => "oncohotspot_merge_groups_created_total",
            MetricName::MergeGroupSize => "oncohotspot_merge_group_size",
            MetricName::MergeDuplicateConflicts => "oncohotspot_merge_duplicate_conflicts_total",

            MetricName::EstimateComputed => "oncohotspot_estimate_computed_total",
            MetricName::EstimateWithheld => "oncohotspot_estimate_withheld_total",
            MetricName::EstimateIntervalWidth => "oncohotspot_estimate_interval_width",

            MetricName::ValidateAccepted => "oncohotspot_validate_accepted_total",
            MetricName::ValidateFlagged => "oncohotspot_validate_flagged_total",
            MetricName::ValidateReviewNotes => "oncohotspot_validate_review_notes_total",

            MetricName::RunCompleted => "oncohotspot_run_completed_total",
            MetricName::RunFailed => "oncohotspot_run_failed_total",
            MetricName::RunDuration => "oncohotspot_run_duration_seconds",
            MetricName::RunInputRecords => "oncohotspot_run_input_records",
        }
    }

    /// Get all metric names as an iterator
    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            NormalizeRecordsProcessed,
            NormalizeRecordsRejected,
            CanonicalizeLabelsMapped,
            CanonicalizeLabelsUnmapped,
            DenominatorResolved,
            DenominatorUnresolved,
            DenominatorInvalid,
            MergeGroupsCreated,
            MergeGroupSize,
            MergeDuplicateConflicts,
            EstimateComputed,
            EstimateWithheld,
            EstimateIntervalWidth,
            ValidateAccepted,
            ValidateFlagged,
            ValidateReviewNotes,
            RunCompleted,
            RunFailed,
            RunDuration,
            RunInputRecords,
        ]
        .into_iter()
    }
}

static PROMETHEUS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is harmless.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    PROMETHEUS_HANDLE.set(handle).ok();

    info!("Metrics system initialized");
    Ok(())
}

/// Text exposition of everything recorded so far
pub fn render() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    pub fn record_normalized(source_id: &str) {
        ::metrics::counter!(MetricName::NormalizeRecordsProcessed.as_str(), "source" => source_id.to_string())
            .increment(1);
    }

    pub fn record_rejected(source_id: &str) {
        ::metrics::counter!(MetricName::NormalizeRecordsRejected.as_str(), "source" => source_id.to_string())
            .increment(1);
    }
}

// ============================================================================
// Canonicalize Metrics
// ============================================================================

pub mod canonicalize {
    use super::MetricName;

    /// `match_kind` is "exact" or "synonym"
    pub fn label_mapped(match_kind: &'static str) {
        ::metrics::counter!(MetricName::CanonicalizeLabelsMapped.as_str(), "match" => match_kind).increment(1);
    }

    pub fn label_unmapped(source_id: &str) {
        ::metrics::counter!(MetricName::CanonicalizeLabelsUnmapped.as_str(), "source" => source_id.to_string())
            .increment(1);
    }
}

// ============================================================================
// Denominator Metrics
// ============================================================================

pub mod denominator {
    use super::MetricName;

    pub fn resolved() {
        ::metrics::counter!(MetricName::DenominatorResolved.as_str()).increment(1);
    }

    pub fn unresolved(reason: &'static str) {
        ::metrics::counter!(MetricName::DenominatorUnresolved.as_str(), "reason" => reason).increment(1);
    }

    pub fn invalid() {
        ::metrics::counter!(MetricName::DenominatorInvalid.as_str()).increment(1);
    }
}

// ============================================================================
// Merge Metrics
// ============================================================================

pub mod merge {
    use super::MetricName;

    pub fn group_created(status: &'static str, size: usize) {
        ::metrics::counter!(MetricName::MergeGroupsCreated.as_str(), "status" => status).increment(1);
        ::metrics::histogram!(MetricName::MergeGroupSize.as_str()).record(size as f64);
    }

    pub fn duplicate_conflicts(count: usize) {
        ::metrics::counter!(MetricName::MergeDuplicateConflicts.as_str()).increment(count as u64);
    }
}

// ============================================================================
// Estimate Metrics
// ============================================================================

pub mod estimate {
    use super::MetricName;

    pub fn computed(interval_width: f64) {
        ::metrics::counter!(MetricName::EstimateComputed.as_str()).increment(1);
        ::metrics::histogram!(MetricName::EstimateIntervalWidth.as_str()).record(interval_width);
    }

    pub fn withheld(status: &'static str) {
        ::metrics::counter!(MetricName::EstimateWithheld.as_str(), "status" => status).increment(1);
    }
}

// ============================================================================
// Validate Metrics
// ============================================================================

pub mod validate {
    use super::MetricName;

    pub fn accepted() {
        ::metrics::counter!(MetricName::ValidateAccepted.as_str()).increment(1);
    }

    pub fn flagged(reason: &'static str) {
        ::metrics::counter!(MetricName::ValidateFlagged.as_str(), "reason" => reason).increment(1);
    }

    pub fn review_note(kind: &'static str) {
        ::metrics::counter!(MetricName::ValidateReviewNotes.as_str(), "note" => kind).increment(1);
    }
}

// ============================================================================
// Run Metrics
// ============================================================================

pub mod run {
    use super::MetricName;

    pub fn completed(input_records: usize, secs: f64) {
        ::metrics::counter!(MetricName::RunCompleted.as_str()).increment(1);
        ::metrics::gauge!(MetricName::RunInputRecords.as_str()).set(input_records as f64);
        ::metrics::histogram!(MetricName::RunDuration.as_str()).record(secs);
    }

    pub fn failed() {
        ::metrics::counter!(MetricName::RunFailed.as_str()).increment(1);
    }
}
