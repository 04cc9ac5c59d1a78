use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::CanonicalCancerType;

const BUILTIN_TAXONOMY: &str = include_str!("builtin_taxonomy.toml");

#[derive(Error, Debug)]
pub enum TaxonomyError {
    #[error("failed to read taxonomy table '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("taxonomy table is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("taxonomy table has no version")]
    MissingVersion,

    #[error("taxonomy entry has an empty {0}")]
    EmptyField(&'static str),

    #[error("label '{0}' is declared more than once")]
    DuplicateLabel(String),

    #[error("synonym '{alias}' points at unknown label '{label}'")]
    UnknownSynonymTarget { alias: String, label: String },

    #[error("'{alias}' resolves to both '{first}' and '{second}'")]
    ConflictingSynonym {
        alias: String,
        first: String,
        second: String,
    },
}

/// On-disk shape of a taxonomy table
#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    #[serde(default)]
    version: String,
    #[serde(default)]
    types: Vec<TypeEntry>,
    #[serde(default)]
    synonyms: Vec<SynonymEntry>,
}

#[derive(Debug, Deserialize)]
struct TypeEntry {
    label: String,
    category: String,
    #[serde(default)]
    subtype: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SynonymEntry {
    alias: String,
    label: String,
}

/// How a label was matched against the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Synonym,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Synonym => "synonym",
        }
    }
}

/// Versioned, curated mapping from source labels to canonical cancer types.
///
/// Built once per run. Observations hold `Arc`s into the table rather than
/// copies of the canonical entity.
#[derive(Debug)]
pub struct CancerTaxonomy {
    version: String,
    labels: HashMap<String, Arc<CanonicalCancerType>>,
    /// Normalized alias -> canonical label
    synonyms: HashMap<String, String>,
}

/// Lower-case and collapse whitespace. Punctuation is left alone.
fn synonym_key(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl CancerTaxonomy {
    /// The curated table shipped with the crate
    pub fn builtin() -> Result<Self, TaxonomyError> {
        Self::from_toml_str(BUILTIN_TAXONOMY)
    }

    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let content = fs::read_to_string(path).map_err(|source| TaxonomyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` when given, otherwise the built-in table
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, TaxonomyError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, TaxonomyError> {
        let file: TaxonomyFile = toml::from_str(content)?;
        Self::build(file)
    }

    fn build(file: TaxonomyFile) -> Result<Self, TaxonomyError> {
        let version = file.version.trim().to_string();
        if version.is_empty() {
            return Err(TaxonomyError::MissingVersion);
        }

        let mut labels = HashMap::new();
        let mut synonyms: HashMap<String, String> = HashMap::new();

        for entry in file.types {
            let label = entry.label.trim().to_string();
            if label.is_empty() {
                return Err(TaxonomyError::EmptyField("label"));
            }
            let category = entry.category.trim();
            if category.is_empty() {
                return Err(TaxonomyError::EmptyField("category"));
            }
            let subtype = entry
                .subtype
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty());

            if labels.contains_key(&label) {
                return Err(TaxonomyError::DuplicateLabel(label));
            }
            labels.insert(
                label.clone(),
                Arc::new(CanonicalCancerType::new(category, subtype)),
            );
            insert_synonym(&mut synonyms, &label, &label)?;
        }

        for entry in file.synonyms {
            let alias = entry.alias.trim();
            if alias.is_empty() {
                return Err(TaxonomyError::EmptyField("alias"));
            }
            let target = entry.label.trim();
            if !labels.contains_key(target) {
                return Err(TaxonomyError::UnknownSynonymTarget {
                    alias: alias.to_string(),
                    label: target.to_string(),
                });
            }
            insert_synonym(&mut synonyms, alias, target)?;
        }

        Ok(Self {
            version,
            labels,
            synonyms,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    pub fn synonym_count(&self) -> usize {
        self.synonyms.len()
    }

    /// Exact label match first, then the synonym rules. No partial or
    /// fuzzy matching is attempted.
    pub fn lookup(&self, label: &str) -> Option<(Arc<CanonicalCancerType>, MatchKind)> {
        let trimmed = label.trim();
        if let Some(canonical) = self.labels.get(trimmed) {
            return Some((Arc::clone(canonical), MatchKind::Exact));
        }
        self.synonyms
            .get(&synonym_key(trimmed))
            .and_then(|target| self.labels.get(target))
            .map(|canonical| (Arc::clone(canonical), MatchKind::Synonym))
    }
}

fn insert_synonym(
    synonyms: &mut HashMap<String, String>,
    alias: &str,
    target: &str,
) -> Result<(), TaxonomyError> {
    let key = synonym_key(alias);
    match synonyms.get(&key) {
        Some(existing) if existing != target => Err(TaxonomyError::ConflictingSynonym {
            alias: alias.to_string(),
            first: existing.clone(),
            second: target.to_string(),
        }),
        Some(_) => Ok(()),
        None => {
            synonyms.insert(key, target.to_string());
            Ok(())
        }
    }
}
