use super::base::{NormalizerUtils, SourceNormalizer};
use crate::domain::{RawObservation, RawRecord, TestedSampleCount};
use crate::error::RecordError;
use crate::pipeline::processing::normalize::genomic_change::resolve_genomic_change;

pub const SOURCE_ID: &str = "civic";

/// Normalizer for CIViC clinical annotations.
/// CIViC variants are curated from literature and carry no cohort at all.
pub struct CivicNormalizer;

impl CivicNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CivicNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceNormalizer for CivicNormalizer {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn normalize(&self, record: &RawRecord) -> Result<RawObservation, RecordError> {
        let data = &record.record;

        let gene_symbol =
            NormalizerUtils::require_gene_symbol(SOURCE_ID, data, &["gene_symbol", "gene.name", "gene"])?;

        let source_cancer_label =
            NormalizerUtils::get_str(data, &["disease.name", "disease", "disease_name"])
                .ok_or_else(|| RecordError::missing_field(SOURCE_ID, "disease"))?;

        let variant_name = NormalizerUtils::get_str(data, &["name", "variant", "variant_name"]);
        let genomic_change = resolve_genomic_change(variant_name.as_deref(), None, None)
            .ok_or_else(|| RecordError::missing_field(SOURCE_ID, "variant"))?;

        let mutated_sample_count = NormalizerUtils::require_mutated_count(
            SOURCE_ID,
            data,
            &["sample_count", "patient_count", "mutated_sample_count"],
        )?;

        Ok(RawObservation {
            gene_symbol,
            source_cancer_label,
            source_id: SOURCE_ID.to_string(),
            study_id: None,
            assay_family: None,
            genomic_change,
            mutated_sample_count,
            tested_sample_count: TestedSampleCount::NotAvailable,
            evidence_refs: NormalizerUtils::get_string_list(data, &["evidence_ids", "evidenceItems"]),
            record_path: record.record_path.clone(),
        })
    }
}
