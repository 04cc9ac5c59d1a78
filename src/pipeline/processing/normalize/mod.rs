// Source normalization: raw per-source records -> RawObservation

pub mod genomic_change;
pub mod normalizers;
pub mod registry;

pub use registry::NormalizationRegistry;

use crate::domain::{RawObservation, RawRecord};
use crate::error::RecordError;

/// Converts one raw record into exactly one observation, or fails with
/// `MalformedRecord`. No cross-record logic happens here.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, record: &RawRecord) -> Result<RawObservation, RecordError>;
}
