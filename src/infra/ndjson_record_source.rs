use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::app::ports::RecordSourcePort;
use crate::domain::RawRecord;

/// Source id given to input lines that do not name one. No normalizer is
/// registered for it, so such lines end up in the review queue.
pub const UNIDENTIFIED_SOURCE: &str = "unidentified";

/// Reads raw records from an NDJSON file of
/// `{"source_id": ..., "record_path": ..., "record": {...}}` lines.
///
/// Lines that are not well-formed records are passed through rather than
/// dropped, so the run accounts for every input line.
pub struct NdjsonRecordSource {
    path: PathBuf,
}

impl NdjsonRecordSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn parse_line(&self, line_no: usize, line: &str) -> RawRecord {
        let location = format!("{}:{}", self.path.display(), line_no);
        match serde_json::from_str::<Value>(line) {
            Ok(value) => match serde_json::from_value::<RawRecord>(value.clone()) {
                Ok(mut record) => {
                    if record.record_path.is_empty() {
                        record.record_path = location;
                    }
                    record
                }
                Err(e) => {
                    warn!("{}: not a raw record: {}", location, e);
                    RawRecord {
                        source_id: UNIDENTIFIED_SOURCE.to_string(),
                        record_path: location,
                        record: value,
                    }
                }
            },
            Err(e) => {
                warn!("{}: invalid JSON: {}", location, e);
                RawRecord {
                    source_id: UNIDENTIFIED_SOURCE.to_string(),
                    record_path: location,
                    record: Value::String(line.to_string()),
                }
            }
        }
    }
}

#[async_trait]
impl RecordSourcePort for NdjsonRecordSource {
    async fn read_records(&self) -> anyhow::Result<Vec<RawRecord>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let records: Vec<RawRecord> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| self.parse_line(i + 1, line))
            .collect();
        info!("Read {} raw records from {}", records.len(), self.path.display());
        Ok(records)
    }
}
