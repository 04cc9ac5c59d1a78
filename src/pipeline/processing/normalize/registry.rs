use std::collections::HashMap;
use tracing::debug;

use super::normalizers::{CbioportalNormalizer, CivicNormalizer, CosmicNormalizer, SourceNormalizer};
use super::Normalizer;
use crate::domain::{RawObservation, RawRecord};
use crate::error::RecordError;
use crate::observability::metrics;

/// Registry for source-specific normalization strategies
pub struct NormalizationRegistry {
    normalizers: HashMap<String, Box<dyn SourceNormalizer>>,
}

impl NormalizationRegistry {
    /// Create a new normalization registry with the built-in normalizers
    pub fn new() -> Self {
        let mut registry = Self {
            normalizers: HashMap::new(),
        };
        registry.register(Box::new(CbioportalNormalizer::new()));
        registry.register(Box::new(CosmicNormalizer::new()));
        registry.register(Box::new(CivicNormalizer::new()));
        registry
    }

    /// Register a normalizer under its own source id
    pub fn register(&mut self, normalizer: Box<dyn SourceNormalizer>) {
        self.normalizers
            .insert(normalizer.source_id().to_string(), normalizer);
    }

    /// Get the appropriate normalizer for a source
    pub fn get_normalizer(&self, source_id: &str) -> Option<&dyn SourceNormalizer> {
        self.normalizers.get(source_id).map(|n| n.as_ref())
    }

    /// List all registered source IDs, sorted
    pub fn list_sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self.normalizers.keys().map(|k| k.as_str()).collect();
        sources.sort_unstable();
        sources
    }
}

impl Default for NormalizationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer for NormalizationRegistry {
    fn normalize(&self, record: &RawRecord) -> Result<RawObservation, RecordError> {
        let result = match self.get_normalizer(&record.source_id) {
            Some(normalizer) => normalizer.normalize(record),
            None => Err(RecordError::malformed(
                &record.source_id,
                format!("no normalizer registered for source '{}'", record.source_id),
            )),
        };

        match &result {
            Ok(_) => metrics::normalize::record_normalized(&record.source_id),
            Err(e) => {
                debug!(source_id = %record.source_id, path = %record.record_path, "normalization failed: {}", e);
                metrics::normalize::record_rejected(&record.source_id);
            }
        }
        result
    }
}
