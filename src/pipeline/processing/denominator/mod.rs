// Denominator resolution: decide whether an observation's tested-sample count
// can be used as the divisor of a frequency

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::SourcePolicy;
use crate::domain::{CanonicalCancerType, RawObservation, TestedSampleCount};
use crate::error::RecordError;
use crate::observability::metrics;
use crate::pipeline::processing::canonicalize::CanonicalizedObservation;

/// The study population a resolved denominator was measured in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DenominatorBasis {
    pub source_id: String,
    pub study_id: String,
    /// Record-declared assay family, falling back to the source default
    pub assay_family: Option<String>,
}

/// Why no trustworthy cohort size exists for an observation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// The source's data model has no sequenced cohort at all
    NoCohortModel,
    /// The source has cohorts but did not report one for this record
    CohortSizeNotReported,
    /// A count was reported without the study it belongs to
    NoStudyScope,
    /// Zero samples tested and zero mutated
    EmptyCohort,
}

impl UnresolvedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnresolvedReason::NoCohortModel => "no_cohort_model",
            UnresolvedReason::CohortSizeNotReported => "cohort_size_not_reported",
            UnresolvedReason::NoStudyScope => "no_study_scope",
            UnresolvedReason::EmptyCohort => "empty_cohort",
        }
    }
}

/// Denominator state attached to every observation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DenominatorState {
    Resolved { tested: u64, basis: DenominatorBasis },
    /// Terminal, not retried. Never replaced by a guessed constant.
    Unresolved { reason: UnresolvedReason },
    /// More mutated than tested samples: an upstream data error
    Invalid { mutated: u64, tested: u64 },
}

impl DenominatorState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, DenominatorState::Resolved { .. })
    }

    pub fn tested(&self) -> Option<u64> {
        match self {
            DenominatorState::Resolved { tested, .. } => Some(*tested),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedObservation {
    pub observation: RawObservation,
    pub cancer_type: Arc<CanonicalCancerType>,
    pub denominator: DenominatorState,
}

impl ResolvedObservation {
    /// The routed failure for an `Invalid` denominator, if this is one
    pub fn invalid_error(&self) -> Option<RecordError> {
        match self.denominator {
            DenominatorState::Invalid { mutated, tested } => Some(RecordError::InvalidDenominator {
                source_id: self.observation.source_id.clone(),
                mutated,
                tested,
            }),
            _ => None,
        }
    }
}

/// Trait for deciding whether an observation has a usable denominator
pub trait DenominatorResolver: Send + Sync {
    fn resolve_denominator(&self, observation: &RawObservation) -> DenominatorState;

    fn resolve(&self, canonical: CanonicalizedObservation) -> ResolvedObservation {
        let denominator = self.resolve_denominator(&canonical.observation);
        match &denominator {
            DenominatorState::Resolved { .. } => metrics::denominator::resolved(),
            DenominatorState::Unresolved { reason } => metrics::denominator::unresolved(reason.as_str()),
            DenominatorState::Invalid { .. } => metrics::denominator::invalid(),
        }
        ResolvedObservation {
            observation: canonical.observation,
            cancer_type: canonical.cancer_type,
            denominator,
        }
    }
}

/// Resolver driven by per-source policies. There is no fallback table of
/// per-cancer-type sample sizes.
pub struct DefaultDenominatorResolver {
    policies: HashMap<String, SourcePolicy>,
}

impl DefaultDenominatorResolver {
    pub fn new(sources: &[SourcePolicy]) -> Self {
        Self {
            policies: sources.iter().map(|p| (p.id.clone(), p.clone())).collect(),
        }
    }
}

impl DenominatorResolver for DefaultDenominatorResolver {
    fn resolve_denominator(&self, observation: &RawObservation) -> DenominatorState {
        let policy = match self.policies.get(&observation.source_id) {
            Some(policy) if policy.provides_cohort_denominators => policy,
            _ => {
                return DenominatorState::Unresolved {
                    reason: UnresolvedReason::NoCohortModel,
                }
            }
        };

        let tested = match observation.tested_sample_count {
            TestedSampleCount::Reported(n) => n,
            TestedSampleCount::NotAvailable => {
                return DenominatorState::Unresolved {
                    reason: UnresolvedReason::CohortSizeNotReported,
                }
            }
        };

        let Some(study_id) = observation.study_id.clone() else {
            return DenominatorState::Unresolved {
                reason: UnresolvedReason::NoStudyScope,
            };
        };

        let mutated = observation.mutated_sample_count;
        if tested == 0 && mutated == 0 {
            return DenominatorState::Unresolved {
                reason: UnresolvedReason::EmptyCohort,
            };
        }
        if mutated > tested {
            return DenominatorState::Invalid { mutated, tested };
        }

        DenominatorState::Resolved {
            tested,
            basis: DenominatorBasis {
                source_id: observation.source_id.clone(),
                study_id,
                assay_family: observation
                    .assay_family
                    .clone()
                    .or_else(|| policy.default_assay_family.as_ref().map(|a| a.to_ascii_uppercase())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AggregatorConfig;
    use crate::error::FailureReason;

    fn observation(source: &str, mutated: u64, tested: TestedSampleCount) -> RawObservation {
        RawObservation {
            gene_symbol: "KRAS".to_string(),
            source_cancer_label: "PAAD".to_string(),
            source_id: source.to_string(),
            study_id: Some("paad_tcga".to_string()),
            assay_family: None,
            genomic_change: "p.G12D".to_string(),
            mutated_sample_count: mutated,
            tested_sample_count: tested,
            evidence_refs: vec![],
            record_path: String::new(),
        }
    }

    fn resolver() -> DefaultDenominatorResolver {
        DefaultDenominatorResolver::new(&AggregatorConfig::default().sources)
    }

    #[test]
    fn test_reported_study_cohort_resolves() {
        let state = resolver().resolve_denominator(&observation(
            "cbioportal",
            30,
            TestedSampleCount::Reported(100),
        ));
        match state {
            DenominatorState::Resolved { tested, basis } => {
                assert_eq!(tested, 100);
                assert_eq!(basis.study_id, "paad_tcga");
                assert_eq!(basis.assay_family, None);
            }
            other => panic!("expected resolved, got {:?}", other),
        }
    }

    #[test]
    fn test_source_without_cohort_model_is_unresolved() {
        // A count from a catalog source is never used, even when present.
        let state = resolver().resolve_denominator(&observation(
            "cosmic",
            30,
            TestedSampleCount::Reported(30),
        ));
        assert_eq!(
            state,
            DenominatorState::Unresolved {
                reason: UnresolvedReason::NoCohortModel
            }
        );

        let state = resolver().resolve_denominator(&observation(
            "civic",
            4,
            TestedSampleCount::NotAvailable,
        ));
        assert!(!state.is_resolved());
        assert_eq!(state.tested(), None);
    }

    #[test]
    fn test_missing_cohort_or_study_is_unresolved() {
        let state = resolver().resolve_denominator(&observation(
            "cbioportal",
            3,
            TestedSampleCount::NotAvailable,
        ));
        assert_eq!(
            state,
            DenominatorState::Unresolved {
                reason: UnresolvedReason::CohortSizeNotReported
            }
        );

        let mut unscoped = observation("cbioportal", 3, TestedSampleCount::Reported(50));
        unscoped.study_id = None;
        assert_eq!(
            resolver().resolve_denominator(&unscoped),
            DenominatorState::Unresolved {
                reason: UnresolvedReason::NoStudyScope
            }
        );
    }

    #[test]
    fn test_zero_cohort() {
        assert_eq!(
            resolver().resolve_denominator(&observation("cbioportal", 0, TestedSampleCount::Reported(0))),
            DenominatorState::Unresolved {
                reason: UnresolvedReason::EmptyCohort
            }
        );
        assert_eq!(
            resolver().resolve_denominator(&observation("cbioportal", 2, TestedSampleCount::Reported(0))),
            DenominatorState::Invalid { mutated: 2, tested: 0 }
        );
    }

    #[test]
    fn test_mutated_above_tested_is_invalid_not_clamped() {
        let obs = observation("cbioportal", 120, TestedSampleCount::Reported(100));
        let resolved = resolver().resolve(CanonicalizedObservation {
            observation: obs,
            cancer_type: Arc::new(CanonicalCancerType::new("Pancreatic Cancer", Some("Adenocarcinoma"))),
        });
        assert_eq!(
            resolved.denominator,
            DenominatorState::Invalid {
                mutated: 120,
                tested: 100
            }
        );
        let err = resolved.invalid_error().unwrap();
        assert_eq!(err.reason(), FailureReason::InvalidDenominator);
    }

    #[test]
    fn test_policy_default_assay_family() {
        let config = AggregatorConfig::from_toml_str(
            r#"
            [[sources]]
            id = "cbioportal"
            priority = 0
            provides_cohort_denominators = true
            default_assay_family = "wes"
            "#,
        )
        .unwrap();
        let resolver = DefaultDenominatorResolver::new(&config.sources);

        let state = resolver.resolve_denominator(&observation("cbioportal", 1, TestedSampleCount::Reported(10)));
        match state {
            DenominatorState::Resolved { basis, .. } => assert_eq!(basis.assay_family.as_deref(), Some("WES")),
            other => panic!("expected resolved, got {:?}", other),
        }

        let mut declared = observation("cbioportal", 1, TestedSampleCount::Reported(10));
        declared.assay_family = Some("IMPACT468".to_string());
        match resolver.resolve_denominator(&declared) {
            DenominatorState::Resolved { basis, .. } => {
                assert_eq!(basis.assay_family.as_deref(), Some("IMPACT468"))
            }
            other => panic!("expected resolved, got {:?}", other),
        }
    }
}
