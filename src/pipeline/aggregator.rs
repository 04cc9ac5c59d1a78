use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AggregatorConfig;
use crate::domain::{RawRecord, RoutedFailure};
use crate::error::{RecordError, Result};
use crate::pipeline::processing::canonicalize::{CancerTaxonomy, Canonicalizer, DefaultCanonicalizer};
use crate::pipeline::processing::denominator::{
    DefaultDenominatorResolver, DenominatorResolver, ResolvedObservation,
};
use crate::pipeline::processing::estimate::{Estimator, WilsonEstimator};
use crate::pipeline::processing::merge::{DefaultMerger, MergeGroup, Merger};
use crate::pipeline::processing::normalize::{NormalizationRegistry, Normalizer};
use crate::pipeline::processing::validate::{
    DefaultPlausibilityValidator, HotspotReferenceTable, PlausibilityValidator, ValidationOutcome,
};
use crate::pipeline::worker_pool::WorkerPool;

/// Result of one pass of the core over a batch
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub outcomes: Vec<ValidationOutcome>,
    /// In input order
    pub failures: Vec<RoutedFailure>,
    /// Records that came out of the resolver, invalid ones excluded
    pub observations: usize,
}

/// The six stages wired together. Pure computation: no I/O happens here.
#[derive(Clone)]
pub struct AggregationPipeline {
    normalizer: Arc<dyn Normalizer>,
    canonicalizer: Arc<dyn Canonicalizer>,
    resolver: Arc<dyn DenominatorResolver>,
    merger: Arc<dyn Merger>,
    estimator: Arc<dyn Estimator>,
    validator: Arc<dyn PlausibilityValidator>,
    pool: WorkerPool,
    taxonomy_version: String,
}

impl AggregationPipeline {
    /// Build the default stages from configuration, loading the taxonomy
    /// and hotspot tables it names
    pub fn from_config(config: &AggregatorConfig) -> Result<Self> {
        let taxonomy = CancerTaxonomy::load_or_builtin(config.taxonomy_path.as_deref())?;
        let references = HotspotReferenceTable::load_or_builtin(config.hotspot_reference_path.as_deref())?;
        info!(
            taxonomy_version = %taxonomy.version(),
            taxonomy_labels = taxonomy.label_count(),
            hotspot_ranges = references.len(),
            "reference tables loaded"
        );
        Ok(Self::with_tables(config, taxonomy, references))
    }

    pub fn with_tables(
        config: &AggregatorConfig,
        taxonomy: CancerTaxonomy,
        references: HotspotReferenceTable,
    ) -> Self {
        let taxonomy_version = taxonomy.version().to_string();
        Self {
            normalizer: Arc::new(NormalizationRegistry::new()),
            canonicalizer: Arc::new(DefaultCanonicalizer::new(Arc::new(taxonomy))),
            resolver: Arc::new(DefaultDenominatorResolver::new(&config.sources)),
            merger: Arc::new(DefaultMerger::new(config)),
            estimator: Arc::new(WilsonEstimator::new(config.pipeline.confidence_level)),
            validator: Arc::new(DefaultPlausibilityValidator::new(
                Arc::new(references),
                config.validation.clone(),
            )),
            pool: WorkerPool::new(config.pipeline.worker_pool_size),
            taxonomy_version,
        }
    }

    pub fn taxonomy_version(&self) -> &str {
        &self.taxonomy_version
    }

    /// Stages 1-3 for a single record. Invalid denominators leave here as
    /// routed failures.
    pub fn prepare(&self, record: &RawRecord) -> std::result::Result<ResolvedObservation, RecordError> {
        let observation = self.normalizer.normalize(record)?;
        let canonical = self.canonicalizer.canonicalize(observation)?;
        let resolved = self.resolver.resolve(canonical);
        match resolved.invalid_error() {
            Some(err) => Err(err),
            None => Ok(resolved),
        }
    }

    /// Stages 4-6 for one merge group
    pub fn finalize(&self, group: MergeGroup) -> ValidationOutcome {
        let merged = self.merger.merge_group(group);
        let estimated = self.estimator.estimate(merged);
        self.validator.validate(estimated)
    }

    /// Run the whole batch. Per-record failures are collected, never fatal.
    pub async fn run(&self, records: Vec<RawRecord>) -> anyhow::Result<PipelineOutput> {
        let prepare = {
            let pipeline = self.clone();
            move |record: RawRecord| {
                pipeline
                    .prepare(&record)
                    .map_err(|err| RoutedFailure::new(&err, &record))
            }
        };
        let prepared = self.pool.map(records, prepare).await?;

        let mut observations = Vec::with_capacity(prepared.len());
        let mut failures = Vec::new();
        for result in prepared {
            match result {
                Ok(observation) => observations.push(observation),
                Err(failure) => {
                    warn!(
                        reason = failure.reason.as_str(),
                        source_id = %failure.source_id,
                        path = %failure.record_path,
                        "record routed to review queue: {}",
                        failure.detail
                    );
                    failures.push(failure);
                }
            }
        }
        let observation_count = observations.len();

        // Grouping needs every observation sharing a key, so it waits for
        // all per-record work to finish.
        let groups = self.merger.group(observations);
        debug!(groups = groups.len(), observations = observation_count, "observations grouped");

        let finalize = {
            let pipeline = self.clone();
            move |group: MergeGroup| pipeline.finalize(group)
        };
        let outcomes = self.pool.map(groups, finalize).await?;

        let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
        for outcome in &outcomes {
            *by_status.entry(outcome.merged().status.as_str()).or_default() += 1;
        }
        info!(
            outcomes = outcomes.len(),
            failures = failures.len(),
            merge_statuses = ?by_status,
            "batch aggregated"
        );

        Ok(PipelineOutput {
            outcomes,
            failures,
            observations: observation_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;
    use serde_json::json;

    fn record(source: &str, path: &str, value: serde_json::Value) -> RawRecord {
        RawRecord {
            source_id: source.to_string(),
            record_path: path.to_string(),
            record: value,
        }
    }

    fn pipeline(workers: usize) -> AggregationPipeline {
        let mut config = AggregatorConfig::default();
        config.pipeline.worker_pool_size = workers;
        AggregationPipeline::from_config(&config).unwrap()
    }

    #[test]
    fn test_prepare_routes_invalid_denominator() {
        let err = pipeline(1)
            .prepare(&record(
                "cbioportal",
                "$[0]",
                json!({
                    "studyId": "paad_tcga",
                    "hugoGeneSymbol": "KRAS",
                    "cancerType": "PAAD",
                    "proteinChange": "G12D",
                    "mutatedSampleCount": 200,
                    "sequencedSampleCount": 180
                }),
            ))
            .unwrap_err();
        assert_eq!(err.reason(), FailureReason::InvalidDenominator);
    }

    #[tokio::test]
    async fn test_run_collects_failures_in_input_order() {
        let records = vec![
            record("civic", "$[0]", json!({"gene": "BRAF", "name": "V600E", "disease": "Unknown Disease", "sample_count": 3})),
            record("cbioportal", "$[1]", json!({"hugoGeneSymbol": "BRAF"})),
            record("civic", "$[2]", json!({"gene": "BRAF", "name": "V600E", "disease": "Melanoma", "sample_count": 3})),
        ];
        let output = pipeline(2).run(records).await.unwrap();

        assert_eq!(output.observations, 1);
        assert_eq!(output.outcomes.len(), 1);
        let reasons: Vec<FailureReason> = output.failures.iter().map(|f| f.reason).collect();
        assert_eq!(
            reasons,
            vec![FailureReason::UnmappedCancerType, FailureReason::MalformedRecord]
        );
        assert_eq!(output.failures[0].record_path, "$[0]");
    }

    #[tokio::test]
    async fn test_worker_count_does_not_change_output() {
        let records: Vec<RawRecord> = (0..40)
            .map(|i| {
                record(
                    "cbioportal",
                    &format!("$[{}]", i),
                    json!({
                        "studyId": format!("study_{}", i % 7),
                        "hugoGeneSymbol": if i % 2 == 0 { "KRAS" } else { "TP53" },
                        "cancerType": if i % 3 == 0 { "LUAD" } else { "LUSC" },
                        "proteinChange": if i % 5 == 0 { "G12C" } else { "R273H" },
                        "assayFamily": "WES",
                        "mutatedSampleCount": i,
                        "sequencedSampleCount": 100 + i
                    }),
                )
            })
            .collect();

        let serial = pipeline(1).run(records.clone()).await.unwrap();
        let parallel = pipeline(8).run(records).await.unwrap();
        assert_eq!(serial.outcomes, parallel.outcomes);
    }
}
