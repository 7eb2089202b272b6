//! Cursor persistence.
//!
//! The poll loop saves the cursor after every batch that advanced it and once
//! more on stop. Saving is best effort: a failed save is logged and polling
//! continues, which can only cause redelivery after a restart.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use courier_core::UpdateId;

/// Errors from a [`CheckpointStore`].
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Reading or writing the backing store failed.
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored data could not be parsed.
    #[error("invalid checkpoint data: {0}")]
    Format(String),
}

/// Durable storage for the polling cursor.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Returns the saved cursor, or `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<UpdateId>, CheckpointError>;

    /// Persists `cursor`.
    async fn save(&self, cursor: UpdateId) -> Result<(), CheckpointError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    cursor: UpdateId,
}

/// Stores the cursor as `{"cursor": n}` in a JSON file.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so readers never see a partial file.
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    /// Creates a store backed by `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpoint {
    async fn load(&self) -> Result<Option<UpdateId>, CheckpointError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let file: CheckpointFile = serde_json::from_slice(&bytes)
            .map_err(|e| CheckpointError::Format(e.to_string()))?;
        if file.cursor < 0 {
            return Err(CheckpointError::Format(format!(
                "negative cursor {}",
                file.cursor
            )));
        }
        Ok(Some(file.cursor))
    }

    async fn save(&self, cursor: UpdateId) -> Result<(), CheckpointError> {
        let body = serde_json::to_vec(&CheckpointFile { cursor })
            .map_err(|e| CheckpointError::Format(e.to_string()))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, body).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        trace!(cursor, path = %self.path.display(), "Checkpoint saved");
        Ok(())
    }
}
