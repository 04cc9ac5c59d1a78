// Base trait and utilities for source-specific normalizers
pub mod base;

// Individual normalizer implementations
pub mod cbioportal;
pub mod civic;
pub mod cosmic;

// Re-export the main components
pub use base::{NormalizerUtils, SourceNormalizer};
pub use cbioportal::CbioportalNormalizer;
pub use civic::CivicNormalizer;
pub use cosmic::CosmicNormalizer;
