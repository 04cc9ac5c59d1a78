// Frequency and confidence estimation over merged records

pub mod interval;

pub use interval::{normal_quantile, wilson_interval};

use serde::{Deserialize, Serialize};

use crate::observability::metrics;
use crate::pipeline::processing::merge::{BasisPartition, MergeStatus, MergedMutationRecord};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrequencyEstimate {
    pub point_frequency: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub basis_sample_size: u64,
    pub confidence_level: f64,
}

impl FrequencyEstimate {
    pub fn interval_width(&self) -> f64 {
        self.ci_high - self.ci_low
    }
}

/// Estimate for one basis partition of a heterogeneous record, kept apart
/// from the others and tagged by source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartitionEstimate {
    pub basis_class: String,
    pub source_ids: Vec<String>,
    pub mutated_total: u64,
    pub estimate: FrequencyEstimate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EstimatedRecord {
    pub record: MergedMutationRecord,
    /// Only homogeneous records carry an estimate. Absence is not zero.
    pub estimate: Option<FrequencyEstimate>,
    pub partition_estimates: Vec<PartitionEstimate>,
}

/// Trait for attaching frequency estimates to merged records
pub trait Estimator: Send + Sync {
    fn estimate(&self, record: MergedMutationRecord) -> EstimatedRecord;
}

/// Wilson score interval estimator at a fixed confidence level
pub struct WilsonEstimator {
    confidence_level: f64,
    z: f64,
}

impl WilsonEstimator {
    /// `confidence_level` must lie in (0, 1); the config layer enforces this
    pub fn new(confidence_level: f64) -> Self {
        Self {
            confidence_level,
            z: normal_quantile(0.5 + confidence_level / 2.0),
        }
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    /// Estimate for `mutated` of `tested`; `None` when nothing was tested
    pub fn estimate_counts(&self, mutated: u64, tested: u64) -> Option<FrequencyEstimate> {
        let (ci_low, ci_high) = wilson_interval(mutated, tested, self.z)?;
        Some(FrequencyEstimate {
            point_frequency: mutated as f64 / tested as f64,
            ci_low,
            ci_high,
            basis_sample_size: tested,
            confidence_level: self.confidence_level,
        })
    }

    fn estimate_partition(&self, partition: &BasisPartition) -> Option<FrequencyEstimate> {
        partition
            .tested_total
            .and_then(|tested| self.estimate_counts(partition.mutated_total, tested))
    }
}

impl Default for WilsonEstimator {
    fn default() -> Self {
        Self::new(0.95)
    }
}

impl Estimator for WilsonEstimator {
    fn estimate(&self, record: MergedMutationRecord) -> EstimatedRecord {
        let (estimate, partition_estimates) = match record.status {
            MergeStatus::Homogeneous => {
                let estimate = record.partitions.first().and_then(|p| self.estimate_partition(p));
                (estimate, Vec::new())
            }
            MergeStatus::Heterogeneous => {
                let partition_estimates = record
                    .partitions
                    .iter()
                    .filter_map(|p| {
                        self.estimate_partition(p).map(|estimate| PartitionEstimate {
                            basis_class: p.basis_class.clone(),
                            source_ids: p.source_ids.clone(),
                            mutated_total: p.mutated_total,
                            estimate,
                        })
                    })
                    .collect();
                (None, partition_estimates)
            }
            MergeStatus::DenominatorUnresolved => (None, Vec::new()),
        };

        match &estimate {
            Some(e) => metrics::estimate::computed(e.interval_width()),
            None => metrics::estimate::withheld(record.status.as_str()),
        }

        EstimatedRecord {
            record,
            estimate,
            partition_estimates,
        }
    }
}
