use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Line-per-document JSON writer shared by the file adapters
pub struct NdjsonFileWriter {
    file_writer: Mutex<BufWriter<File>>,
    file_path: PathBuf,
}

impl NdjsonFileWriter {
    /// Create (or truncate) the file, creating parent directories
    pub fn create(file_path: &Path) -> anyhow::Result<Self> {
        if let Some(dir) = file_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        info!("Creating output file: {}", file_path.display());

        let file_writer = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(file_path)?,
        );

        Ok(Self {
            file_writer: Mutex::new(file_writer),
            file_path: file_path.to_path_buf(),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn write_line<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let json_line = serde_json::to_string(value)?;

        let mut writer = self
            .file_writer
            .lock()
            .map_err(|_| anyhow::anyhow!("writer for {} poisoned", self.file_path.display()))?;
        writeln!(writer, "{}", json_line)?;
        writer.flush()?;

        Ok(())
    }
}
