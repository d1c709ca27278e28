//! Recording stores.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::dto::RecordingDto;
use crate::utils::fs::ensure_parent_dir_with_op;
use crate::{Error, Result};

/// Loads and saves the full list of recordings.
#[async_trait]
pub trait RecordingStore: Send + Sync {
    async fn load_recordings(&self) -> Result<Vec<RecordingDto>>;

    async fn save_recordings(&self, recordings: &[RecordingDto]) -> Result<()>;
}

/// A pretty-printed JSON array in a single file.
///
/// Writes go to a sibling `.tmp` file which is then renamed over the target,
/// so a crash mid-write leaves the previous list intact. Saves are
/// serialized; clones share the write lock.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

#[async_trait]
impl RecordingStore for JsonFileStore {
    async fn load_recordings(&self) -> Result<Vec<RecordingDto>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no recordings file yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::io_path("reading recordings", &self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn save_recordings(&self, recordings: &[RecordingDto]) -> Result<()> {
        let json = serde_json::to_string_pretty(recordings)?;
        let _guard = self.write_lock.lock().await;
        ensure_parent_dir_with_op("creating recordings directory", &self.path).await?;

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json)
            .await
            .map_err(|e| Error::io_path("writing recordings", &temp_path, e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::io_path("replacing recordings", &self.path, e))?;

        debug!(count = recordings.len(), path = %self.path.display(), "recordings saved");
        Ok(())
    }
}

/// Keeps the list in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    recordings: Mutex<Vec<RecordingDto>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recordings(recordings: Vec<RecordingDto>) -> Self {
        Self {
            recordings: Mutex::new(recordings),
        }
    }

    /// Last saved list.
    pub fn snapshot(&self) -> Vec<RecordingDto> {
        self.recordings.lock().clone()
    }
}

#[async_trait]
impl RecordingStore for MemoryStore {
    async fn load_recordings(&self) -> Result<Vec<RecordingDto>> {
        Ok(self.snapshot())
    }

    async fn save_recordings(&self, recordings: &[RecordingDto]) -> Result<()> {
        *self.recordings.lock() = recordings.to_vec();
        Ok(())
    }
}
