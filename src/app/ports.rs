use async_trait::async_trait;

use crate::app::aggregation_use_case::RunReport;
use crate::domain::{RawRecord, RoutedFailure};
use crate::pipeline::processing::validate::ValidationOutcome;

/// Supplies the already-fetched raw records for one run
#[async_trait]
pub trait RecordSourcePort: Send + Sync {
    async fn read_records(&self) -> anyhow::Result<Vec<RawRecord>>;
}

/// Receives validated outcomes, in output order
#[async_trait]
pub trait OutcomeSinkPort: Send + Sync {
    async fn write_outcome(&self, outcome: &ValidationOutcome) -> anyhow::Result<()>;
}

/// Operator review queue for records excluded from aggregation
#[async_trait]
pub trait ReviewQueuePort: Send + Sync {
    async fn route_failure(&self, failure: &RoutedFailure) -> anyhow::Result<()>;
}

#[async_trait]
pub trait RunSummaryPort: Send + Sync {
    async fn write_summary(&self, report: &RunReport) -> anyhow::Result<()>;
}
