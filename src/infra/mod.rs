// Adapters implementing the application ports

pub mod memory;
pub mod ndjson;
pub mod ndjson_record_source;
pub mod outcome_output_adapter;
pub mod review_queue_adapter;
pub mod run_summary_adapter;

pub use memory::{InMemoryOutcomeSink, InMemoryRecordSource, InMemoryReviewQueue};
pub use ndjson_record_source::NdjsonRecordSource;
pub use outcome_output_adapter::{FileOutcomeOutputAdapter, FileStorageRowAdapter};
pub use review_queue_adapter::FileReviewQueueAdapter;
pub use run_summary_adapter::FileRunSummaryAdapter;
