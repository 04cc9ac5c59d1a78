use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::app::ports::{OutcomeSinkPort, ReviewQueuePort};
use crate::domain::RawRecord;
use crate::error::AggregatorError;
use crate::observability::metrics;
use crate::pipeline::processing::validate::{ValidationOutcome, ValidationStatus};
use crate::pipeline::{AggregationPipeline, PipelineOutput};

/// Explicit counts for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunTally {
    pub input_records: usize,
    pub observations: usize,
    pub outcomes: usize,
    pub accepted: usize,
    pub flagged: usize,
    pub excluded: usize,
    /// Excluded records per failure reason code
    pub excluded_by_reason: BTreeMap<String, usize>,
    pub merge_status: BTreeMap<String, usize>,
    pub with_estimate: usize,
    pub review_notes: usize,
    pub duplicate_conflicts: usize,
}

impl RunTally {
    fn from_output(input_records: usize, output: &PipelineOutput) -> Self {
        let mut tally = RunTally {
            input_records,
            observations: output.observations,
            outcomes: output.outcomes.len(),
            excluded: output.failures.len(),
            ..Default::default()
        };
        for failure in &output.failures {
            *tally
                .excluded_by_reason
                .entry(failure.reason.as_str().to_string())
                .or_default() += 1;
        }
        for outcome in &output.outcomes {
            match outcome.status {
                ValidationStatus::Accepted => tally.accepted += 1,
                ValidationStatus::Flagged(_) => tally.flagged += 1,
            }
            *tally
                .merge_status
                .entry(outcome.merged().status.as_str().to_string())
                .or_default() += 1;
            if outcome.record.estimate.is_some() {
                tally.with_estimate += 1;
            }
            tally.review_notes += outcome.notes.len();
            tally.duplicate_conflicts += outcome.merged().conflicts.len();
        }
        tally
    }
}

/// Run metadata plus tally. Kept apart from the outcomes, which carry no
/// run-specific values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub taxonomy_version: String,
    pub tally: RunTally,
    /// SHA-256 over the NDJSON rendering of the outcome sequence
    pub outcome_digest: String,
}

/// Hex SHA-256 of outcomes rendered one JSON document per line
pub fn outcome_digest(outcomes: &[ValidationOutcome]) -> Result<String> {
    let mut hasher = Sha256::new();
    for outcome in outcomes {
        hasher.update(serde_json::to_vec(outcome)?);
        hasher.update(b"\n");
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Use case for running one aggregation batch and routing its results
pub struct AggregationUseCase {
    pipeline: AggregationPipeline,
    outcome_sinks: Vec<Box<dyn OutcomeSinkPort>>,
    review_queue: Box<dyn ReviewQueuePort>,
}

impl AggregationUseCase {
    pub fn new(
        pipeline: AggregationPipeline,
        outcome_sinks: Vec<Box<dyn OutcomeSinkPort>>,
        review_queue: Box<dyn ReviewQueuePort>,
    ) -> Self {
        Self {
            pipeline,
            outcome_sinks,
            review_queue,
        }
    }

    /// Aggregate one batch. Fails only when there is nothing to aggregate
    /// or an output port fails; bad records go to the review queue.
    pub async fn execute(&self, records: Vec<RawRecord>) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("aggregation_run", run_id = %run_id);
        self.execute_inner(run_id, records).instrument(span).await
    }

    async fn execute_inner(&self, run_id: Uuid, records: Vec<RawRecord>) -> Result<RunReport> {
        let started_at = Utc::now();
        let timer = Instant::now();

        if records.is_empty() {
            error!("no input records; aborting run");
            metrics::run::failed();
            return Err(AggregatorError::NoInput.into());
        }

        let input_records = records.len();
        info!(input_records, "starting aggregation run");

        let output = match self.pipeline.run(records).await {
            Ok(output) => output,
            Err(e) => {
                metrics::run::failed();
                return Err(e);
            }
        };

        for failure in &output.failures {
            self.review_queue.route_failure(failure).await?;
        }
        for outcome in &output.outcomes {
            for sink in &self.outcome_sinks {
                sink.write_outcome(outcome).await?;
            }
        }

        let tally = RunTally::from_output(input_records, &output);
        let digest = outcome_digest(&output.outcomes)?;
        metrics::run::completed(input_records, timer.elapsed().as_secs_f64());

        info!(
            accepted = tally.accepted,
            flagged = tally.flagged,
            excluded = tally.excluded,
            outcome_digest = %digest,
            "aggregation run complete"
        );

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            taxonomy_version: self.pipeline.taxonomy_version().to_string(),
            tally,
            outcome_digest: digest,
        })
    }
}
