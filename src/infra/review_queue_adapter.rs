use async_trait::async_trait;
use std::path::Path;

use crate::app::ports::ReviewQueuePort;
use crate::domain::RoutedFailure;
use crate::infra::ndjson::NdjsonFileWriter;

/// File-based review queue: one routed failure per line, raw record included
pub struct FileReviewQueueAdapter {
    writer: NdjsonFileWriter,
}

impl FileReviewQueueAdapter {
    pub fn new(file_path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            writer: NdjsonFileWriter::create(file_path)?,
        })
    }
}

#[async_trait]
impl ReviewQueuePort for FileReviewQueueAdapter {
    async fn route_failure(&self, failure: &RoutedFailure) -> anyhow::Result<()> {
        self.writer.write_line(failure)
    }
}
