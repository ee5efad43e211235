//! JSON-lines file backend

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use crate::store::error::{StorageError, StorageResult};
use crate::store::traits::StepStorage;
use crate::store::Step;

/// Steps stored one JSON object per line, appended in order
pub struct FileStepStorage {
    path: PathBuf,
}

impl FileStepStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure directory exists
    async fn ensure_dir(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StepStorage for FileStepStorage {
    async fn persist(&self, step: &Step) -> StorageResult<()> {
        self.ensure_dir().await?;

        let mut line = serde_json::to_string(step)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;

        trace!("Appended step {} to {}", step.id, self.path.display());
        Ok(())
    }

    async fn load_all(&self) -> StorageResult<Vec<Step>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let steps = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|e| StorageError::Corrupted {
                    path: self.path.clone(),
                    line: index + 1,
                    message: e.to_string(),
                })
            })
            .collect::<StorageResult<Vec<Step>>>()?;

        debug!("Loaded {} steps from {}", steps.len(), self.path.display());
        Ok(steps)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
