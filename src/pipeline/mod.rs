// Aggregation pipeline: per-record stages, merge-group stages, and the pool
// that runs them

pub mod aggregator;
pub mod processing;
pub mod worker_pool;

pub use aggregator::{AggregationPipeline, PipelineOutput};
pub use worker_pool::WorkerPool;
