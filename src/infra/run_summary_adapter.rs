use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::app::ports::RunSummaryPort;
use crate::app::RunReport;

/// Writes the run report as pretty-printed JSON
pub struct FileRunSummaryAdapter {
    file_path: PathBuf,
}

impl FileRunSummaryAdapter {
    pub fn new(file_path: &Path) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
        }
    }
}

#[async_trait]
impl RunSummaryPort for FileRunSummaryAdapter {
    async fn write_summary(&self, report: &RunReport) -> anyhow::Result<()> {
        if let Some(dir) = self.file_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_string_pretty(report)?;
        tokio::fs::write(&self.file_path, json).await?;
        info!("Run summary written to {}", self.file_path.display());
        Ok(())
    }
}
