use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::app::ports::{OutcomeSinkPort, RecordSourcePort, ReviewQueuePort};
use crate::domain::{RawRecord, RoutedFailure};
use crate::pipeline::processing::validate::ValidationOutcome;

/// Record source over an in-memory batch
pub struct InMemoryRecordSource {
    records: Vec<RawRecord>,
}

impl InMemoryRecordSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl RecordSourcePort for InMemoryRecordSource {
    async fn read_records(&self) -> anyhow::Result<Vec<RawRecord>> {
        Ok(self.records.clone())
    }
}

/// Collects outcomes; clones share the same buffer
#[derive(Clone, Default)]
pub struct InMemoryOutcomeSink {
    pub outcomes: Arc<Mutex<Vec<ValidationOutcome>>>,
}

impl InMemoryOutcomeSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutcomeSinkPort for InMemoryOutcomeSink {
    async fn write_outcome(&self, outcome: &ValidationOutcome) -> anyhow::Result<()> {
        self.outcomes.lock().await.push(outcome.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryReviewQueue {
    pub failures: Arc<Mutex<Vec<RoutedFailure>>>,
}

impl InMemoryReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReviewQueuePort for InMemoryReviewQueue {
    async fn route_failure(&self, failure: &RoutedFailure) -> anyhow::Result<()> {
        self.failures.lock().await.push(failure.clone());
        Ok(())
    }
}
