use super::base::{NormalizerUtils, SourceNormalizer};
use crate::domain::{RawObservation, RawRecord};
use crate::error::RecordError;
use crate::pipeline::processing::normalize::genomic_change::resolve_genomic_change;

pub const SOURCE_ID: &str = "cosmic";

/// Normalizer for COSMIC catalog rows.
///
/// COSMIC reports how often a mutation was seen, keyed by primary site and
/// histology. The catalog has no sequenced-cohort size behind those counts.
pub struct CosmicNormalizer;

impl CosmicNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Site and histology together form the source's cancer-type label,
    /// e.g. `lung | adenocarcinoma`.
    fn cancer_label(data: &serde_json::Value) -> Option<String> {
        let site = NormalizerUtils::get_str(data, &["primary_site", "PrimarySite"]);
        let histology = NormalizerUtils::get_str(
            data,
            &["histology_subtype_1", "primary_histology", "PrimaryHistology"],
        )
        .filter(|h| !h.eq_ignore_ascii_case("NS"));

        match (site, histology) {
            (Some(site), Some(histology)) => Some(format!("{} | {}", site, histology)),
            (Some(site), None) => Some(site),
            (None, Some(histology)) => Some(histology),
            (None, None) => None,
        }
    }
}

impl Default for CosmicNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceNormalizer for CosmicNormalizer {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn normalize(&self, record: &RawRecord) -> Result<RawObservation, RecordError> {
        let data = &record.record;

        let gene_symbol =
            NormalizerUtils::require_gene_symbol(SOURCE_ID, data, &["gene_name", "GeneName", "gene"])?;

        let source_cancer_label = Self::cancer_label(data)
            .ok_or_else(|| RecordError::missing_field(SOURCE_ID, "primary_site"))?;

        let protein_change = NormalizerUtils::get_str(data, &["protein_change", "MutationAA"]);
        let cds_change = NormalizerUtils::get_str(data, &["cds_change", "MutationCDS"]);
        let genome_position =
            NormalizerUtils::get_str(data, &["genome_position", "MutationGenomePosition"]);
        let genomic_change = resolve_genomic_change(
            protein_change.as_deref(),
            cds_change.as_deref(),
            genome_position.as_deref(),
        )
        .ok_or_else(|| RecordError::missing_field(SOURCE_ID, "genomic_change"))?;

        let mutated_sample_count = NormalizerUtils::require_mutated_count(
            SOURCE_ID,
            data,
            &["occurrence_count", "sample_count", "mutated_sample_count"],
        )?;

        // Passed through as reported; the resolver decides whether to trust it.
        let tested_sample_count =
            NormalizerUtils::get_tested_count(SOURCE_ID, data, &["tested_sample_count"])?;

        let evidence_refs = NormalizerUtils::get_str(data, &["mutation_id", "MutationID"])
            .into_iter()
            .collect();

        Ok(RawObservation {
            gene_symbol,
            source_cancer_label,
            source_id: SOURCE_ID.to_string(),
            study_id: None,
            assay_family: NormalizerUtils::get_assay_family(data, &["assay_family"]),
            genomic_change,
            mutated_sample_count,
            tested_sample_count,
            evidence_refs,
            record_path: record.record_path.clone(),
        })
    }
}
