use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{AggregatorError, Result};
use crate::pipeline::processing::merge::MergeKey;

const BUILTIN_HOTSPOTS: &str = include_str!("builtin_hotspots.toml");

/// Expected frequency band for a hotspot in a cancer type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HotspotRange {
    pub gene: String,
    pub category: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub change: Option<String>,
    pub low: f64,
    pub high: f64,
    #[serde(default)]
    pub note: Option<String>,
}

impl HotspotRange {
    fn matches(&self, key: &MergeKey) -> bool {
        self.gene.eq_ignore_ascii_case(&key.gene_symbol)
            && self.category == key.cancer_type.category
            && self
                .subtype
                .as_ref()
                .map_or(true, |s| key.cancer_type.subtype.as_ref() == Some(s))
            && self
                .change
                .as_ref()
                .map_or(true, |c| *c == key.genomic_change)
    }

    /// Change-specific entries outrank subtype-specific ones
    fn specificity(&self) -> (bool, bool) {
        (self.change.is_some(), self.subtype.is_some())
    }
}

#[derive(Debug, Deserialize)]
struct ReferenceFile {
    #[serde(default)]
    version: String,
    #[serde(default)]
    ranges: Vec<HotspotRange>,
}

#[derive(Debug, Clone, Default)]
pub struct HotspotReferenceTable {
    version: String,
    ranges: Vec<HotspotRange>,
}

impl HotspotReferenceTable {
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_HOTSPOTS)
    }

    /// A table with no ranges: every structurally sound record is accepted
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AggregatorError::Config(format!(
                "Failed to read hotspot reference table '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ReferenceFile = toml::from_str(content)?;
        for range in &file.ranges {
            if !(0.0..=1.0).contains(&range.low)
                || !(0.0..=1.0).contains(&range.high)
                || range.low > range.high
            {
                return Err(AggregatorError::Config(format!(
                    "hotspot range for {} in {} must satisfy 0 <= low <= high <= 1, got [{}, {}]",
                    range.gene, range.category, range.low, range.high
                )));
            }
        }
        Ok(Self {
            version: file.version,
            ranges: file.ranges,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Most specific matching range; the first declared wins a tie
    pub fn lookup(&self, key: &MergeKey) -> Option<&HotspotRange> {
        let mut best: Option<&HotspotRange> = None;
        for range in self.ranges.iter().filter(|r| r.matches(key)) {
            match best {
                Some(current) if current.specificity() >= range.specificity() => {}
                _ => best = Some(range),
            }
        }
        best
    }
}
