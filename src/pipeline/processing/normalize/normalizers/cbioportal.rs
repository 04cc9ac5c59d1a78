use super::base::{NormalizerUtils, SourceNormalizer};
use crate::domain::{RawObservation, RawRecord};
use crate::error::RecordError;
use crate::pipeline::processing::normalize::genomic_change::resolve_genomic_change;

pub const SOURCE_ID: &str = "cbioportal";

/// Normalizer for cBioPortal study-level mutation records.
/// These carry a study id and, usually, the study's sequenced sample count.
pub struct CbioportalNormalizer;

impl CbioportalNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CbioportalNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceNormalizer for CbioportalNormalizer {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn normalize(&self, record: &RawRecord) -> Result<RawObservation, RecordError> {
        let data = &record.record;

        let gene_symbol = NormalizerUtils::require_gene_symbol(
            SOURCE_ID,
            data,
            &["hugoGeneSymbol", "gene.hugoGeneSymbol", "gene_symbol"],
        )?;

        let source_cancer_label = NormalizerUtils::get_str(
            data,
            &["cancerType.name", "cancerTypeName", "cancerType", "cancer_type"],
        )
        .ok_or_else(|| RecordError::missing_field(SOURCE_ID, "cancer_type"))?;

        let protein_change = NormalizerUtils::get_str(data, &["proteinChange", "protein_change"]);
        let cds_change = NormalizerUtils::get_str(data, &["hgvsc", "cds_change"]);
        let position = match (
            NormalizerUtils::get_str(data, &["chr"]),
            NormalizerUtils::lookup(data, "startPosition").and_then(|v| v.as_u64()),
        ) {
            (Some(chr), Some(start)) => Some(format!("{}:{}", chr, start)),
            _ => None,
        };
        let genomic_change = resolve_genomic_change(
            protein_change.as_deref(),
            cds_change.as_deref(),
            position.as_deref(),
        )
        .ok_or_else(|| RecordError::missing_field(SOURCE_ID, "genomic_change"))?;

        // Explicit counts win; otherwise count the distinct mutated samples.
        let mutated_sample_count = match NormalizerUtils::get_count(
            SOURCE_ID,
            data,
            &["mutatedSampleCount", "mutated_sample_count"],
        )? {
            Some(count) => count,
            None => NormalizerUtils::count_distinct(data, &["sampleIds", "sample_ids"])
                .ok_or_else(|| RecordError::missing_field(SOURCE_ID, "mutated_sample_count"))?,
        };

        // Sequenced samples are the population actually tested for mutations.
        let tested_sample_count = NormalizerUtils::get_tested_count(
            SOURCE_ID,
            data,
            &["sequencedSampleCount", "allSampleCount", "tested_sample_count"],
        )?;

        Ok(RawObservation {
            gene_symbol,
            source_cancer_label,
            source_id: SOURCE_ID.to_string(),
            study_id: NormalizerUtils::get_str(data, &["studyId", "cancer_study_identifier"]),
            assay_family: NormalizerUtils::get_assay_family(
                data,
                &["assayFamily", "sequencingAssay", "genePanelId"],
            ),
            genomic_change,
            mutated_sample_count,
            tested_sample_count,
            evidence_refs: NormalizerUtils::get_string_list(data, &["evidenceRefs", "pubmedIds"]),
            record_path: record.record_path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TestedSampleCount;
    use crate::error::FailureReason;
    use serde_json::json;

    fn record(value: serde_json::Value) -> RawRecord {
        RawRecord {
            source_id: SOURCE_ID.to_string(),
            record_path: "$.mutations[0]".to_string(),
            record: value,
        }
    }

    #[test]
    fn test_normalize_study_record() {
        let obs = CbioportalNormalizer::new()
            .normalize(&record(json!({
                "studyId": "luad_tcga",
                "gene": {"hugoGeneSymbol": "egfr"},
                "cancerType": {"name": "Lung Adenocarcinoma"},
                "proteinChange": "L858R",
                "assayFamily": "wes",
                "mutatedSampleCount": 51,
                "sequencedSampleCount": 566
            })))
            .unwrap();

        assert_eq!(obs.gene_symbol, "EGFR");
        assert_eq!(obs.source_cancer_label, "Lung Adenocarcinoma");
        assert_eq!(obs.genomic_change, "p.L858R");
        assert_eq!(obs.study_id.as_deref(), Some("luad_tcga"));
        assert_eq!(obs.assay_family.as_deref(), Some("WES"));
        assert_eq!(obs.mutated_sample_count, 51);
        assert_eq!(obs.tested_sample_count, TestedSampleCount::Reported(566));
        assert_eq!(obs.record_path, "$.mutations[0]");
    }

    #[test]
    fn test_mutated_count_from_sample_ids() {
        let obs = CbioportalNormalizer::new()
            .normalize(&record(json!({
                "studyId": "paad_tcga",
                "hugoGeneSymbol": "KRAS",
                "cancerTypeName": "Pancreatic Adenocarcinoma",
                "proteinChange": "G12D",
                "sampleIds": ["A", "B", "B", "C"],
                "allSampleCount": 184
            })))
            .unwrap();

        assert_eq!(obs.mutated_sample_count, 3);
        assert_eq!(obs.tested_sample_count, TestedSampleCount::Reported(184));
    }

    #[test]
    fn test_missing_cohort_is_not_available() {
        let obs = CbioportalNormalizer::new()
            .normalize(&record(json!({
                "hugoGeneSymbol": "KRAS",
                "cancerType": "Pancreatic Adenocarcinoma",
                "proteinChange": "G12D",
                "mutatedSampleCount": 10,
                "sequencedSampleCount": "NA"
            })))
            .unwrap();

        assert_eq!(obs.tested_sample_count, TestedSampleCount::NotAvailable);
    }

    #[test]
    fn test_null_sequenced_count_uses_all_sample_count() {
        let obs = CbioportalNormalizer::new()
            .normalize(&record(json!({
                "studyId": "paad_qcmg",
                "hugoGeneSymbol": "KRAS",
                "cancerType": "PAAD",
                "proteinChange": "G12D",
                "mutatedSampleCount": 70,
                "sequencedSampleCount": null,
                "allSampleCount": 184
            })))
            .unwrap();

        assert_eq!(obs.tested_sample_count, TestedSampleCount::Reported(184));
    }

    #[test]
    fn test_missing_required_fields_are_malformed() {
        let normalizer = CbioportalNormalizer::new();
        for value in [
            json!({"cancerType": "Melanoma", "proteinChange": "V600E", "mutatedSampleCount": 3}),
            json!({"hugoGeneSymbol": "BRAF", "proteinChange": "V600E", "mutatedSampleCount": 3}),
            json!({"hugoGeneSymbol": "BRAF", "cancerType": "Melanoma", "proteinChange": "V600E"}),
            json!({"hugoGeneSymbol": "BRAF", "cancerType": "Melanoma", "mutatedSampleCount": 3}),
        ] {
            let err = normalizer.normalize(&record(value)).unwrap_err();
            assert_eq!(err.reason(), FailureReason::MalformedRecord);
        }
    }
}
