pub mod ports;
pub mod aggregation_use_case;

pub use aggregation_use_case::{AggregationUseCase, RunReport, RunTally};
