// Deduplicating merger: group resolved observations by
// (gene, canonical cancer type, genomic change) and decide whether their
// denominators share a basis

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::warn;

use crate::config::AggregatorConfig;
use crate::domain::CanonicalCancerType;
use crate::observability::metrics;
use crate::pipeline::processing::denominator::{DenominatorState, ResolvedObservation};

/// Grouping key. Field order gives the output order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MergeKey {
    pub gene_symbol: String,
    pub cancer_type: Arc<CanonicalCancerType>,
    pub genomic_change: String,
}

impl MergeKey {
    pub fn of(observation: &ResolvedObservation) -> Self {
        Self {
            gene_symbol: observation.observation.gene_symbol.clone(),
            cancer_type: Arc::clone(&observation.cancer_type),
            genomic_change: observation.observation.genomic_change.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    /// Every counted contribution is resolved against one basis class
    Homogeneous,
    /// Bases disagree; no blended frequency may be computed
    Heterogeneous,
    DenominatorUnresolved,
}

impl MergeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStatus::Homogeneous => "homogeneous",
            MergeStatus::Heterogeneous => "heterogeneous",
            MergeStatus::DenominatorUnresolved => "denominator_unresolved",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ContributionRole {
    Counted,
    /// Same source and study as an earlier contribution; kept for audit only
    Duplicate { of: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contribution {
    pub observation: ResolvedObservation,
    pub basis_class: String,
    pub role: ContributionRole,
}

impl Contribution {
    pub fn is_counted(&self) -> bool {
        self.role == ContributionRole::Counted
    }
}

/// Counted contributions sharing one basis class, with summed counts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BasisPartition {
    pub basis_class: String,
    pub source_ids: Vec<String>,
    pub resolved: bool,
    pub mutated_total: u64,
    pub tested_total: Option<u64>,
}

/// A study fetched twice with different counts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateConflict {
    pub source_id: String,
    pub study_id: String,
    pub kept_mutated: u64,
    pub kept_tested: Option<u64>,
    pub duplicate_mutated: u64,
    pub duplicate_tested: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergedMutationRecord {
    pub key: MergeKey,
    /// Source-priority order, then input order
    pub contributions: Vec<Contribution>,
    pub distinct_denominators: BTreeSet<u64>,
    pub status: MergeStatus,
    pub partitions: Vec<BasisPartition>,
    pub conflicts: Vec<DuplicateConflict>,
}

impl MergedMutationRecord {
    pub fn counted(&self) -> impl Iterator<Item = &Contribution> {
        self.contributions.iter().filter(|c| c.is_counted())
    }

    /// Mutated samples summed over counted contributions. Only defined when
    /// they all sit in one partition; counts from different bases (a catalog
    /// occurrence count and a cohort's mutated samples) are never added.
    pub fn mutated_total(&self) -> Option<u64> {
        match self.partitions.as_slice() {
            [single] => Some(single.mutated_total),
            _ => None,
        }
    }

    /// Tested samples; only defined when every counted contribution shares a basis
    pub fn tested_total(&self) -> Option<u64> {
        match self.status {
            MergeStatus::Homogeneous => self.partitions.first().and_then(|p| p.tested_total),
            _ => None,
        }
    }

    pub fn contributing_sources(&self) -> Vec<String> {
        let sources: BTreeSet<&str> = self
            .contributions
            .iter()
            .map(|c| c.observation.observation.source_id.as_str())
            .collect();
        sources.into_iter().map(|s| s.to_string()).collect()
    }
}

/// Observations sharing one merge key, before the merge decision
#[derive(Debug, Clone)]
pub struct MergeGroup {
    pub key: MergeKey,
    pub observations: Vec<ResolvedObservation>,
}

/// Trait for collapsing observations into merged records
pub trait Merger: Send + Sync {
    /// Group observations by key. Requires the whole batch, so it runs
    /// after every record has been resolved.
    fn group(&self, observations: Vec<ResolvedObservation>) -> Vec<MergeGroup>;

    /// Build one merged record. Groups are independent of each other.
    fn merge_group(&self, group: MergeGroup) -> MergedMutationRecord;

    fn merge(&self, observations: Vec<ResolvedObservation>) -> Vec<MergedMutationRecord> {
        self.group(observations)
            .into_iter()
            .map(|g| self.merge_group(g))
            .collect()
    }
}

pub struct DefaultMerger {
    priorities: HashMap<String, u32>,
    /// (source, upper-cased assay family) -> equivalence class name
    equivalence: HashMap<(String, String), String>,
}

impl DefaultMerger {
    pub fn new(config: &AggregatorConfig) -> Self {
        let priorities = config
            .sources
            .iter()
            .map(|s| (s.id.clone(), s.priority))
            .collect();
        let equivalence = config
            .assay_equivalence
            .iter()
            .flat_map(|class| {
                class.members.iter().map(move |m| {
                    (
                        (m.source.clone(), m.assay_family.to_ascii_uppercase()),
                        class.class.clone(),
                    )
                })
            })
            .collect();
        Self {
            priorities,
            equivalence,
        }
    }

    fn priority(&self, source_id: &str) -> u32 {
        self.priorities.get(source_id).copied().unwrap_or(u32::MAX)
    }

    /// Compatibility class of an observation. Unclassified resolved
    /// observations get a class of their own.
    fn basis_class(&self, observation: &ResolvedObservation, index: usize) -> String {
        let source = &observation.observation.source_id;
        match &observation.denominator {
            DenominatorState::Resolved { basis, .. } => match &basis.assay_family {
                Some(assay) => {
                    let assay = assay.to_ascii_uppercase();
                    match self.equivalence.get(&(source.clone(), assay.clone())) {
                        Some(class) => class.clone(),
                        None => format!("{}/{}", source, assay),
                    }
                }
                None => format!("{}/{}/unclassified#{}", source, basis.study_id, index),
            },
            _ => format!("{}/unresolved", source),
        }
    }
}

impl Merger for DefaultMerger {
    fn group(&self, observations: Vec<ResolvedObservation>) -> Vec<MergeGroup> {
        let mut groups: BTreeMap<MergeKey, Vec<ResolvedObservation>> = BTreeMap::new();
        for observation in observations {
            if let DenominatorState::Invalid { mutated, tested } = observation.denominator {
                warn!(
                    source_id = %observation.observation.source_id,
                    mutated,
                    tested,
                    "invalid denominator reached the merger; skipping"
                );
                continue;
            }
            groups
                .entry(MergeKey::of(&observation))
                .or_default()
                .push(observation);
        }

        groups
            .into_iter()
            .map(|(key, mut observations)| {
                // stable: input order within a priority
                observations.sort_by_key(|o| self.priority(&o.observation.source_id));
                MergeGroup { key, observations }
            })
            .collect()
    }

    fn merge_group(&self, group: MergeGroup) -> MergedMutationRecord {
        let observations = group.observations;

        // Counted copy of each (source, study): the first resolved one, else
        // the first seen
        let mut kept: HashMap<(&str, &str), usize> = HashMap::new();
        for (index, observation) in observations.iter().enumerate() {
            let raw = &observation.observation;
            if let Some(study_id) = &raw.study_id {
                let slot = kept
                    .entry((raw.source_id.as_str(), study_id.as_str()))
                    .or_insert(index);
                if observation.denominator.is_resolved() && !observations[*slot].denominator.is_resolved() {
                    *slot = index;
                }
            }
        }

        let mut conflicts = Vec::new();
        let mut roles = Vec::with_capacity(observations.len());
        for (index, observation) in observations.iter().enumerate() {
            let raw = &observation.observation;
            let kept_index = raw
                .study_id
                .as_deref()
                .and_then(|study_id| kept.get(&(raw.source_id.as_str(), study_id)).copied());
            let role = match kept_index {
                Some(kept_index) if kept_index != index => {
                    let counted = &observations[kept_index].observation;
                    if counted.mutated_sample_count != raw.mutated_sample_count
                        || counted.tested_sample_count != raw.tested_sample_count
                    {
                        conflicts.push(DuplicateConflict {
                            source_id: raw.source_id.clone(),
                            study_id: raw.study_id.clone().unwrap_or_default(),
                            kept_mutated: counted.mutated_sample_count,
                            kept_tested: counted.tested_sample_count.reported(),
                            duplicate_mutated: raw.mutated_sample_count,
                            duplicate_tested: raw.tested_sample_count.reported(),
                        });
                    }
                    ContributionRole::Duplicate { of: kept_index }
                }
                _ => ContributionRole::Counted,
            };
            roles.push(role);
        }

        let contributions: Vec<Contribution> = observations
            .into_iter()
            .zip(roles)
            .enumerate()
            .map(|(index, (observation, role))| Contribution {
                basis_class: self.basis_class(&observation, index),
                observation,
                role,
            })
            .collect();

        let mut partitions: BTreeMap<String, BasisPartition> = BTreeMap::new();
        let mut distinct_denominators = BTreeSet::new();
        for contribution in contributions.iter().filter(|c| c.is_counted()) {
            let raw = &contribution.observation.observation;
            let tested = contribution.observation.denominator.tested();
            let partition = partitions
                .entry(contribution.basis_class.clone())
                .or_insert_with(|| BasisPartition {
                    basis_class: contribution.basis_class.clone(),
                    source_ids: Vec::new(),
                    resolved: tested.is_some(),
                    mutated_total: 0,
                    tested_total: tested.map(|_| 0),
                });
            if !partition.source_ids.contains(&raw.source_id) {
                partition.source_ids.push(raw.source_id.clone());
            }
            partition.mutated_total = partition.mutated_total.saturating_add(raw.mutated_sample_count);
            if let (Some(total), Some(n)) = (partition.tested_total.as_mut(), tested) {
                *total = total.saturating_add(n);
                distinct_denominators.insert(n);
            }
        }
        let mut partitions: Vec<BasisPartition> = partitions.into_values().collect();
        for partition in &mut partitions {
            partition.source_ids.sort();
        }

        let resolved = partitions.iter().filter(|p| p.resolved).count();
        let status = if resolved == 0 {
            MergeStatus::DenominatorUnresolved
        } else if partitions.len() == 1 {
            MergeStatus::Homogeneous
        } else {
            MergeStatus::Heterogeneous
        };

        metrics::merge::group_created(status.as_str(), contributions.len());
        if !conflicts.is_empty() {
            warn!(
                gene = %group.key.gene_symbol,
                cancer_type = %group.key.cancer_type,
                change = %group.key.genomic_change,
                conflicts = conflicts.len(),
                "same study reported with different counts"
            );
            metrics::merge::duplicate_conflicts(conflicts.len());
        }

        MergedMutationRecord {
            key: group.key,
            contributions,
            distinct_denominators,
            status,
            partitions,
            conflicts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RawObservation, TestedSampleCount};
    use crate::pipeline::processing::denominator::{DenominatorBasis, UnresolvedReason};

    fn cancer_type() -> Arc<CanonicalCancerType> {
        Arc::new(CanonicalCancerType::new("Pancreatic Cancer", Some("Adenocarcinoma")))
    }

    fn resolved(source: &str, study: &str, assay: Option<&str>, mutated: u64, tested: u64) -> ResolvedObservation {
        ResolvedObservation {
            observation: RawObservation {
                gene_symbol: "KRAS".to_string(),
                source_cancer_label: "PAAD".to_string(),
                source_id: source.to_string(),
                study_id: Some(study.to_string()),
                assay_family: assay.map(|a| a.to_string()),
                genomic_change: "p.G12D".to_string(),
                mutated_sample_count: mutated,
                tested_sample_count: TestedSampleCount::Reported(tested),
                evidence_refs: vec![],
                record_path: format!("{}/{}", source, study),
            },
            cancer_type: cancer_type(),
            denominator: DenominatorState::Resolved {
                tested,
                basis: DenominatorBasis {
                    source_id: source.to_string(),
                    study_id: study.to_string(),
                    assay_family: assay.map(|a| a.to_string()),
                },
            },
        }
    }

    fn unresolved(source: &str, mutated: u64) -> ResolvedObservation {
        ResolvedObservation {
            observation: RawObservation {
                gene_symbol: "KRAS".to_string(),
                source_cancer_label: "pancreas".to_string(),
                source_id: source.to_string(),
                study_id: None,
                assay_family: None,
                genomic_change: "p.G12D".to_string(),
                mutated_sample_count: mutated,
                tested_sample_count: TestedSampleCount::NotAvailable,
                evidence_refs: vec![],
                record_path: String::new(),
            },
            cancer_type: cancer_type(),
            denominator: DenominatorState::Unresolved {
                reason: UnresolvedReason::NoCohortModel,
            },
        }
    }

    fn merge_one(observations: Vec<ResolvedObservation>) -> MergedMutationRecord {
        let mut merged = DefaultMerger::new(&AggregatorConfig::default()).merge(observations);
        assert_eq!(merged.len(), 1);
        merged.remove(0)
    }

    #[test]
    fn test_compatible_counts_are_summed_not_averaged() {
        let record = merge_one(vec![
            resolved("cbioportal", "study_a", Some("WES"), 30, 100),
            resolved("cbioportal", "study_b", Some("WXS"), 10, 50),
        ]);

        assert_eq!(record.status, MergeStatus::Homogeneous);
        assert_eq!(record.mutated_total(), Some(40));
        assert_eq!(record.tested_total(), Some(150));
        assert_eq!(record.partitions.len(), 1);
        assert_eq!(record.partitions[0].basis_class, "whole_exome");
        assert_eq!(record.distinct_denominators, BTreeSet::from([50, 100]));
    }

    #[test]
    fn test_incompatible_assays_are_heterogeneous() {
        let record = merge_one(vec![
            resolved("cbioportal", "study_a", Some("WES"), 30, 100),
            resolved("cbioportal", "msk_impact", Some("IMPACT468"), 10, 50),
        ]);

        assert_eq!(record.status, MergeStatus::Heterogeneous);
        assert_eq!(record.tested_total(), None);
        let classes: Vec<&str> = record.partitions.iter().map(|p| p.basis_class.as_str()).collect();
        assert_eq!(classes, vec!["cbioportal/IMPACT468", "whole_exome"]);
    }

    #[test]
    fn test_unclassified_bases_never_combine() {
        let record = merge_one(vec![
            resolved("cbioportal", "study_a", None, 30, 100),
            resolved("cbioportal", "study_b", None, 10, 50),
        ]);
        assert_eq!(record.status, MergeStatus::Heterogeneous);
        assert_eq!(record.partitions.len(), 2);
    }

    #[test]
    fn test_all_unresolved() {
        let record = merge_one(vec![unresolved("cosmic", 900), unresolved("civic", 12)]);
        assert_eq!(record.status, MergeStatus::DenominatorUnresolved);
        assert_eq!(record.tested_total(), None);
        assert!(record.distinct_denominators.is_empty());
        assert!(record.partitions.iter().all(|p| !p.resolved && p.tested_total.is_none()));
    }

    #[test]
    fn test_resolved_mixed_with_unresolved_is_heterogeneous() {
        let record = merge_one(vec![
            unresolved("cosmic", 900),
            resolved("cbioportal", "study_a", Some("WES"), 30, 100),
        ]);
        assert_eq!(record.status, MergeStatus::Heterogeneous);
        // priority order: cbioportal before cosmic
        assert_eq!(record.contributions[0].observation.observation.source_id, "cbioportal");
        assert_eq!(record.contributing_sources(), vec!["cbioportal", "cosmic"]);
    }

    #[test]
    fn test_same_study_twice_is_a_duplicate() {
        let record = merge_one(vec![
            resolved("cbioportal", "study_a", Some("WES"), 30, 100),
            resolved("cbioportal", "study_a", Some("WES"), 31, 100),
        ]);

        assert_eq!(record.contributions.len(), 2);
        assert_eq!(record.contributions[1].role, ContributionRole::Duplicate { of: 0 });
        assert_eq!(record.mutated_total(), Some(30));
        assert_eq!(record.tested_total(), Some(100));
        assert_eq!(record.conflicts.len(), 1);
        assert_eq!(record.conflicts[0].duplicate_mutated, 31);
    }

    #[test]
    fn test_resolved_copy_of_a_study_is_counted() {
        let mut bare = resolved("cbioportal", "study_a", Some("WES"), 30, 100);
        bare.observation.tested_sample_count = TestedSampleCount::NotAvailable;
        bare.denominator = DenominatorState::Unresolved {
            reason: UnresolvedReason::CohortSizeNotReported,
        };
        let record = merge_one(vec![bare, resolved("cbioportal", "study_a", Some("WES"), 30, 100)]);

        assert_eq!(record.contributions[0].role, ContributionRole::Duplicate { of: 1 });
        assert_eq!(record.contributions[1].role, ContributionRole::Counted);
        assert_eq!(record.status, MergeStatus::Homogeneous);
        assert_eq!(record.tested_total(), Some(100));
        assert_eq!(record.conflicts.len(), 1);
        assert_eq!(record.conflicts[0].kept_tested, Some(100));
        assert_eq!(record.conflicts[0].duplicate_tested, None);
    }

    #[test]
    fn test_mutated_total_not_summed_across_bases() {
        let record = merge_one(vec![
            resolved("cbioportal", "study_a", Some("WES"), 180, 180),
            unresolved("cosmic", 5000),
        ]);
        assert_eq!(record.status, MergeStatus::Heterogeneous);
        assert_eq!(record.mutated_total(), None);
        let totals: Vec<u64> = record.partitions.iter().map(|p| p.mutated_total).collect();
        assert_eq!(totals, vec![5000, 180]);
    }

    #[test]
    fn test_invalid_observations_are_not_merged() {
        let mut bad = resolved("cbioportal", "study_a", Some("WES"), 30, 100);
        bad.denominator = DenominatorState::Invalid {
            mutated: 130,
            tested: 100,
        };
        let merged = DefaultMerger::new(&AggregatorConfig::default()).merge(vec![bad]);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_groups_are_ordered_by_key() {
        let mut braf = resolved("cbioportal", "skcm", Some("WES"), 5, 10);
        braf.observation.gene_symbol = "BRAF".to_string();
        let kras = resolved("cbioportal", "paad", Some("WES"), 5, 10);

        let merged = DefaultMerger::new(&AggregatorConfig::default()).merge(vec![kras, braf]);
        let genes: Vec<&str> = merged.iter().map(|m| m.key.gene_symbol.as_str()).collect();
        assert_eq!(genes, vec!["BRAF", "KRAS"]);
    }
}
