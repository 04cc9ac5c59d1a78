use async_trait::async_trait;
use std::path::Path;

use crate::app::ports::OutcomeSinkPort;
use crate::infra::ndjson::NdjsonFileWriter;
use crate::pipeline::processing::validate::ValidationOutcome;

/// Writes full validation outcomes, provenance included, to an NDJSON file
pub struct FileOutcomeOutputAdapter {
    writer: NdjsonFileWriter,
}

impl FileOutcomeOutputAdapter {
    pub fn new(file_path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            writer: NdjsonFileWriter::create(file_path)?,
        })
    }

    pub fn file_path(&self) -> &Path {
        self.writer.file_path()
    }
}

#[async_trait]
impl OutcomeSinkPort for FileOutcomeOutputAdapter {
    async fn write_outcome(&self, outcome: &ValidationOutcome) -> anyhow::Result<()> {
        self.writer.write_line(outcome)
    }
}

/// Writes the flat storage rows handed to the persistence layer
pub struct FileStorageRowAdapter {
    writer: NdjsonFileWriter,
}

impl FileStorageRowAdapter {
    pub fn new(file_path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            writer: NdjsonFileWriter::create(file_path)?,
        })
    }
}

#[async_trait]
impl OutcomeSinkPort for FileStorageRowAdapter {
    async fn write_outcome(&self, outcome: &ValidationOutcome) -> anyhow::Result<()> {
        self.writer.write_line(&outcome.to_storage_row())
    }
}
