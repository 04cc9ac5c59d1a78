// Cancer-type canonicalization: source label -> (category, subtype)

pub mod taxonomy;

pub use taxonomy::{CancerTaxonomy, MatchKind, TaxonomyError};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::domain::{CanonicalCancerType, RawObservation};
use crate::error::RecordError;
use crate::observability::metrics;

/// An observation whose source label has been mapped to the taxonomy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalizedObservation {
    pub observation: RawObservation,
    pub cancer_type: Arc<CanonicalCancerType>,
}

/// Trait for mapping source cancer-type labels onto the canonical taxonomy
pub trait Canonicalizer: Send + Sync {
    /// Fails with `UnmappedCancerType` when the label has no mapping. There
    /// is no fallback bucket.
    fn canonicalize(&self, observation: RawObservation) -> Result<CanonicalizedObservation, RecordError>;
}

/// Table-driven canonicalizer over a shared taxonomy
pub struct DefaultCanonicalizer {
    taxonomy: Arc<CancerTaxonomy>,
}

impl DefaultCanonicalizer {
    pub fn new(taxonomy: Arc<CancerTaxonomy>) -> Self {
        Self { taxonomy }
    }

    pub fn taxonomy(&self) -> &CancerTaxonomy {
        &self.taxonomy
    }
}

impl Canonicalizer for DefaultCanonicalizer {
    fn canonicalize(&self, observation: RawObservation) -> Result<CanonicalizedObservation, RecordError> {
        match self.taxonomy.lookup(&observation.source_cancer_label) {
            Some((cancer_type, kind)) => {
                metrics::canonicalize::label_mapped(kind.as_str());
                Ok(CanonicalizedObservation {
                    observation,
                    cancer_type,
                })
            }
            None => {
                debug!(
                    source_id = %observation.source_id,
                    label = %observation.source_cancer_label,
                    taxonomy_version = %self.taxonomy.version(),
                    "cancer type label has no mapping"
                );
                metrics::canonicalize::label_unmapped(&observation.source_id);
                Err(RecordError::UnmappedCancerType {
                    source_id: observation.source_id,
                    label: observation.source_cancer_label,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TestedSampleCount;
    use crate::error::FailureReason;

    fn observation(label: &str) -> RawObservation {
        RawObservation {
            gene_symbol: "EGFR".to_string(),
            source_cancer_label: label.to_string(),
            source_id: "cbioportal".to_string(),
            study_id: Some("luad_tcga".to_string()),
            assay_family: Some("WES".to_string()),
            genomic_change: "p.L858R".to_string(),
            mutated_sample_count: 5,
            tested_sample_count: TestedSampleCount::Reported(100),
            evidence_refs: vec![],
            record_path: "$[0]".to_string(),
        }
    }

    fn canonicalizer() -> DefaultCanonicalizer {
        DefaultCanonicalizer::new(Arc::new(CancerTaxonomy::builtin().unwrap()))
    }

    #[test]
    fn test_canonicalize_keeps_observation_intact() {
        let input = observation("LUAD");
        let result = canonicalizer().canonicalize(input.clone()).unwrap();
        assert_eq!(result.observation, input);
        assert_eq!(result.cancer_type.category, "Lung Cancer");
        assert_eq!(result.cancer_type.subtype.as_deref(), Some("Adenocarcinoma"));
    }

    #[test]
    fn test_unmapped_label_fails() {
        let err = canonicalizer()
            .canonicalize(observation("Cancer of Unknown Primary"))
            .unwrap_err();
        assert_eq!(err.reason(), FailureReason::UnmappedCancerType);
        assert!(err.to_string().contains("Cancer of Unknown Primary"));
    }
}
