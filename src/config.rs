use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AggregatorError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "oncohotspot.toml";
pub const CONFIG_ENV_VAR: &str = "ONCOHOTSPOT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Versioned cancer-type table; the built-in table is used when unset
    pub taxonomy_path: Option<PathBuf>,
    /// Hotspot reference ranges; the built-in ranges are used when unset
    pub hotspot_reference_path: Option<PathBuf>,
    pub pipeline: PipelineSettings,
    pub sources: Vec<SourcePolicy>,
    pub assay_equivalence: Vec<AssayEquivalenceClass>,
    pub validation: ValidationSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub worker_pool_size: usize,
    pub confidence_level: f64,
}

/// How a source's counts may be used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourcePolicy {
    pub id: String,
    /// Lower values merge first
    pub priority: u32,
    /// Whether the source's data model has a sequenced-cohort size at all
    pub provides_cohort_denominators: bool,
    #[serde(default)]
    pub default_assay_family: Option<String>,
}

/// A named set of (source, assay family) pairs declared to share a
/// study-population basis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssayEquivalenceClass {
    pub class: String,
    pub members: Vec<AssayMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssayMember {
    pub source: String,
    pub assay_family: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Absolute slack around a reference range before a record is flagged
    pub tolerance: f64,
    pub wide_interval_threshold: f64,
    pub saturation_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub directory: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            worker_pool_size: workers.max(1),
            confidence_level: 0.95,
        }
    }
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            tolerance: 0.10,
            wide_interval_threshold: 0.30,
            saturation_threshold: 0.95,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            taxonomy_path: None,
            hotspot_reference_path: None,
            pipeline: PipelineSettings::default(),
            sources: default_sources(),
            assay_equivalence: default_assay_equivalence(),
            validation: ValidationSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

fn default_sources() -> Vec<SourcePolicy> {
    vec![
        SourcePolicy {
            id: "cbioportal".to_string(),
            priority: 0,
            provides_cohort_denominators: true,
            default_assay_family: None,
        },
        SourcePolicy {
            id: "cosmic".to_string(),
            priority: 1,
            provides_cohort_denominators: false,
            default_assay_family: None,
        },
        SourcePolicy {
            id: "civic".to_string(),
            priority: 2,
            provides_cohort_denominators: false,
            default_assay_family: None,
        },
    ]
}

fn default_assay_equivalence() -> Vec<AssayEquivalenceClass> {
    vec![AssayEquivalenceClass {
        class: "whole_exome".to_string(),
        members: vec![
            AssayMember {
                source: "cbioportal".to_string(),
                assay_family: "WES".to_string(),
            },
            AssayMember {
                source: "cbioportal".to_string(),
                assay_family: "WXS".to_string(),
            },
        ],
    }]
}

impl AggregatorConfig {
    /// Load configuration from an explicit path, the `ONCOHOTSPOT_CONFIG`
    /// variable, or `oncohotspot.toml`. Only an explicitly named file is
    /// required to exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(p) => (PathBuf::from(p), true),
                Err(_) => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
            },
        };

        if !explicit && !config_path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            AggregatorError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AggregatorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let level = self.pipeline.confidence_level;
        if !(level > 0.0 && level < 1.0) {
            return Err(AggregatorError::Config(format!(
                "confidence_level must be in (0, 1), got {}",
                level
            )));
        }
        if self.pipeline.worker_pool_size == 0 {
            return Err(AggregatorError::Config(
                "worker_pool_size must be at least 1".to_string(),
            ));
        }

        let v = &self.validation;
        if !(v.tolerance >= 0.0 && v.tolerance <= 1.0) {
            return Err(AggregatorError::Config(format!(
                "tolerance must be in [0, 1], got {}",
                v.tolerance
            )));
        }
        for (name, value) in [
            ("wide_interval_threshold", v.wide_interval_threshold),
            ("saturation_threshold", v.saturation_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(AggregatorError::Config(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }

        let mut ids = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(AggregatorError::Config("source id must not be empty".to_string()));
            }
            if !ids.insert(source.id.as_str()) {
                return Err(AggregatorError::Config(format!(
                    "source '{}' is configured more than once",
                    source.id
                )));
            }
        }

        // A (source, assay) pair may belong to at most one class.
        let mut members = HashSet::new();
        for class in &self.assay_equivalence {
            for member in &class.members {
                let key = (member.source.clone(), member.assay_family.to_ascii_uppercase());
                if !members.insert(key) {
                    return Err(AggregatorError::Config(format!(
                        "assay '{}' of source '{}' is declared in more than one equivalence class",
                        member.assay_family, member.source
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn source_policy(&self, source_id: &str) -> Option<&SourcePolicy> {
        self.sources.iter().find(|s| s.id == source_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AggregatorConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.pipeline.worker_pool_size >= 1);
        assert_eq!(config.pipeline.confidence_level, 0.95);

        let cbio = config.source_policy("cbioportal").unwrap();
        assert!(cbio.provides_cohort_denominators);
        assert!(!config.source_policy("cosmic").unwrap().provides_cohort_denominators);
    }

    #[test]
    fn test_parse_partial_toml_keeps_defaults() {
        let config = AggregatorConfig::from_toml_str(
            r#"
            [pipeline]
            worker_pool_size = 3

            [validation]
            tolerance = 0.05
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.worker_pool_size, 3);
        assert_eq!(config.pipeline.confidence_level, 0.95);
        assert_eq!(config.validation.tolerance, 0.05);
        assert_eq!(config.sources.len(), 3);
    }

    #[test]
    fn test_rejects_bad_confidence_level() {
        let result = AggregatorConfig::from_toml_str(
            r#"
            [pipeline]
            confidence_level = 1.0
            "#,
        );
        assert!(matches!(result, Err(AggregatorError::Config(_))));
    }

    #[test]
    fn test_rejects_assay_in_two_classes() {
        let result = AggregatorConfig::from_toml_str(
            r#"
            [[assay_equivalence]]
            class = "a"
            members = [{ source = "cbioportal", assay_family = "WES" }]

            [[assay_equivalence]]
            class = "b"
            members = [{ source = "cbioportal", assay_family = "wes" }]
            "#,
        );
        assert!(matches!(result, Err(AggregatorError::Config(_))));
    }

    #[test]
    fn test_rejects_duplicate_source() {
        let result = AggregatorConfig::from_toml_str(
            r#"
            [[sources]]
            id = "cbioportal"
            priority = 0
            provides_cohort_denominators = true

            [[sources]]
            id = "cbioportal"
            priority = 1
            provides_cohort_denominators = false
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = AggregatorConfig::load(Some(Path::new("/nonexistent/oncohotspot.toml")));
        assert!(matches!(result, Err(AggregatorError::Config(_))));
    }
}
