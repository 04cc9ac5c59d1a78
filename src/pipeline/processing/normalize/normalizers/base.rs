use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::domain::{RawObservation, RawRecord, TestedSampleCount};
use crate::error::RecordError;

/// Base trait for source-specific normalizers
pub trait SourceNormalizer: Send + Sync {
    /// Source identifier this normalizer handles
    fn source_id(&self) -> &'static str;

    /// Normalize a raw record from this source
    fn normalize(&self, record: &RawRecord) -> Result<RawObservation, RecordError>;
}

static TRANSCRIPT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[_\s]+(ENST|NM_|NR_|XM_)\d+(\.\d+)?$").unwrap());
static ISOFORM_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)$").unwrap());
static ISOFORM_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)[_\s.]+(isoform|iso)[_\s-]*[A-Z0-9]*$").unwrap());
static GENE_SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9-]*$").unwrap());

/// Values sources use to say "this count does not exist"
const NOT_AVAILABLE_MARKERS: &[&str] = &["NA", "N/A", "NOT_AVAILABLE", "UNKNOWN", "NONE", ""];

/// Common utilities for normalizers
pub struct NormalizerUtils;

impl NormalizerUtils {
    /// Look up a value by dotted path (`gene.hugoGeneSymbol`)
    pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
        path.split('.').try_fold(data, |current, key| current.get(key))
    }

    /// First non-empty string among the candidate paths
    pub fn get_str(data: &Value, paths: &[&str]) -> Option<String> {
        paths.iter().find_map(|path| {
            Self::lookup(data, path)
                .and_then(|v| v.as_str())
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        })
    }

    /// First count among the candidate paths. Counts may arrive as JSON
    /// integers or integer strings. `null` and not-available markers fall
    /// through to the next path; any other value is malformed rather than
    /// skipped.
    pub fn get_count(
        source_id: &str,
        data: &Value,
        paths: &[&str],
    ) -> Result<Option<u64>, RecordError> {
        for path in paths {
            let Some(value) = Self::lookup(data, path) else {
                continue;
            };
            return match value {
                Value::Null => continue,
                Value::Number(n) => match n.as_u64() {
                    Some(count) => Ok(Some(count)),
                    None => Err(RecordError::malformed(
                        source_id,
                        format!("field '{}' is not a non-negative integer: {}", path, n),
                    )),
                },
                Value::String(s) if Self::is_not_available_marker(s) => continue,
                Value::String(s) => s.trim().parse::<u64>().map(Some).map_err(|_| {
                    RecordError::malformed(
                        source_id,
                        format!("field '{}' is not a non-negative integer: '{}'", path, s),
                    )
                }),
                other => Err(RecordError::malformed(
                    source_id,
                    format!("field '{}' has unexpected type: {}", path, other),
                )),
            };
        }
        Ok(None)
    }

    /// Tested-sample count, with absent or explicit not-available markers
    /// mapped to `NotAvailable`
    pub fn get_tested_count(
        source_id: &str,
        data: &Value,
        paths: &[&str],
    ) -> Result<TestedSampleCount, RecordError> {
        Ok(match Self::get_count(source_id, data, paths)? {
            Some(n) => TestedSampleCount::Reported(n),
            None => TestedSampleCount::NotAvailable,
        })
    }

    fn is_not_available_marker(s: &str) -> bool {
        let upper = s.trim().to_ascii_uppercase();
        NOT_AVAILABLE_MARKERS.contains(&upper.as_str())
    }

    /// Strings or numbers under the first present key, as strings
    pub fn get_string_list(data: &Value, paths: &[&str]) -> Vec<String> {
        paths
            .iter()
            .find_map(|path| Self::lookup(data, path).and_then(|v| v.as_array()))
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of distinct sample ids under the first present key
    pub fn count_distinct(data: &Value, paths: &[&str]) -> Option<u64> {
        let ids = paths
            .iter()
            .find_map(|path| Self::lookup(data, path).and_then(|v| v.as_array()))?;
        let mut distinct: Vec<&str> = ids.iter().filter_map(|v| v.as_str()).collect();
        distinct.sort_unstable();
        distinct.dedup();
        Some(distinct.len() as u64)
    }

    /// Upper-case a gene symbol and strip transcript and isoform tags.
    /// Returns `None` when nothing symbol-like is left.
    pub fn clean_gene_symbol(raw: &str) -> Option<String> {
        let mut symbol = raw.trim().to_string();
        symbol = TRANSCRIPT_SUFFIX.replace(&symbol, "").into_owned();
        symbol = ISOFORM_PAREN.replace(&symbol, "").into_owned();
        symbol = ISOFORM_TAG.replace(&symbol, "").into_owned();
        let symbol = symbol.trim().to_ascii_uppercase();

        if GENE_SYMBOL.is_match(&symbol) {
            Some(symbol)
        } else {
            None
        }
    }

    pub fn require_gene_symbol(
        source_id: &str,
        data: &Value,
        paths: &[&str],
    ) -> Result<String, RecordError> {
        let raw = Self::get_str(data, paths)
            .ok_or_else(|| RecordError::missing_field(source_id, "gene_symbol"))?;
        Self::clean_gene_symbol(&raw).ok_or_else(|| {
            RecordError::malformed(source_id, format!("unusable gene symbol '{}'", raw))
        })
    }

    pub fn require_mutated_count(
        source_id: &str,
        data: &Value,
        paths: &[&str],
    ) -> Result<u64, RecordError> {
        Self::get_count(source_id, data, paths)?
            .ok_or_else(|| RecordError::missing_field(source_id, "mutated_sample_count"))
    }

    /// Upper-cased assay family, so `wes` and `WES` compare equal
    pub fn get_assay_family(data: &Value, paths: &[&str]) -> Option<String> {
        Self::get_str(data, paths).map(|s| s.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_gene_symbol() {
        assert_eq!(NormalizerUtils::clean_gene_symbol(" kras ").as_deref(), Some("KRAS"));
        assert_eq!(
            NormalizerUtils::clean_gene_symbol("TP53_ENST00000269305.8").as_deref(),
            Some("TP53")
        );
        assert_eq!(
            NormalizerUtils::clean_gene_symbol("EGFR (isoform a)").as_deref(),
            Some("EGFR")
        );
        assert_eq!(NormalizerUtils::clean_gene_symbol("BRAF_isoform2").as_deref(), Some("BRAF"));
    }

    #[test]
    fn test_clean_gene_symbol_keeps_hyphenated_symbols() {
        assert_eq!(NormalizerUtils::clean_gene_symbol("NKX2-1").as_deref(), Some("NKX2-1"));
        assert_eq!(NormalizerUtils::clean_gene_symbol("hla-a").as_deref(), Some("HLA-A"));
    }

    #[test]
    fn test_clean_gene_symbol_rejects_garbage() {
        assert_eq!(NormalizerUtils::clean_gene_symbol(""), None);
        assert_eq!(NormalizerUtils::clean_gene_symbol("(unknown)"), None);
        assert_eq!(NormalizerUtils::clean_gene_symbol("KRAS/NRAS"), None);
    }

    #[test]
    fn test_get_count_variants() {
        let data = json!({"a": 12, "b": "34", "c": "NA", "d": -1, "e": 1.5, "f": null});
        assert_eq!(NormalizerUtils::get_count("s", &data, &["a"]).unwrap(), Some(12));
        assert_eq!(NormalizerUtils::get_count("s", &data, &["b"]).unwrap(), Some(34));
        assert_eq!(NormalizerUtils::get_count("s", &data, &["c"]).unwrap(), None);
        assert_eq!(NormalizerUtils::get_count("s", &data, &["f"]).unwrap(), None);
        assert_eq!(NormalizerUtils::get_count("s", &data, &["missing"]).unwrap(), None);
        assert!(NormalizerUtils::get_count("s", &data, &["d"]).is_err());
        assert!(NormalizerUtils::get_count("s", &data, &["e"]).is_err());
        // first present key wins
        assert_eq!(NormalizerUtils::get_count("s", &data, &["missing", "b", "a"]).unwrap(), Some(34));
    }

    #[test]
    fn test_null_count_falls_through_to_next_path() {
        let data = json!({"sequencedSampleCount": null, "profiledCount": "NA", "allSampleCount": 184});
        let paths = ["sequencedSampleCount", "profiledCount", "allSampleCount"];
        assert_eq!(NormalizerUtils::get_count("s", &data, &paths).unwrap(), Some(184));
        assert_eq!(
            NormalizerUtils::get_tested_count("s", &data, &paths).unwrap(),
            TestedSampleCount::Reported(184)
        );
    }

    #[test]
    fn test_nested_lookup_and_lists() {
        let data = json!({
            "gene": {"hugoGeneSymbol": "BRAF"},
            "sampleIds": ["S1", "S2", "S1"],
            "evidence": [101, "EID7", ""]
        });
        assert_eq!(
            NormalizerUtils::get_str(&data, &["hugoGeneSymbol", "gene.hugoGeneSymbol"]).as_deref(),
            Some("BRAF")
        );
        assert_eq!(NormalizerUtils::count_distinct(&data, &["sampleIds"]), Some(2));
        assert_eq!(
            NormalizerUtils::get_string_list(&data, &["evidence"]),
            vec!["101".to_string(), "EID7".to_string()]
        );
    }
}
