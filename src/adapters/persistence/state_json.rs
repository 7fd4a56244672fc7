//! Implements WatermarkStore using a JSON file.
//!
//! Tracks the id of the newest fully imported message: `{"last_seen_message_id": "..."}`.

use crate::domain::{DomainError, MessageId};
use crate::ports::WatermarkStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateData {
    last_seen_message_id: Option<MessageId>,
}

/// JSON file-based watermark storage.
pub struct StateJson {
    path: PathBuf,
    cache: tokio::sync::RwLock<StateData>,
}

impl StateJson {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: tokio::sync::RwLock::new(StateData::default()),
        }
    }

    /// Load state from disk. A missing file means "never imported".
    /// A corrupt file is reported instead of silently restarting from scratch.
    pub async fn load(&self) -> Result<(), DomainError> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(s) => serde_json::from_str(&s).map_err(|e| {
                DomainError::State(format!("corrupt state file {}: {}", self.path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateData::default(),
            Err(e) => return Err(DomainError::State(format!("read state file: {}", e))),
        };
        *self.cache.write().await = data;
        Ok(())
    }

    /// Atomic save using write-replace pattern.
    /// 1. Write to temp file
    /// 2. sync_all() to ensure flush to disk
    /// 3. Atomic rename to target path
    async fn save(&self, data: &StateData) -> Result<(), DomainError> {
        let json =
            serde_json::to_string_pretty(data).map_err(|e| DomainError::State(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::State(format!("create state dir: {}", e)))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path)
            .await
            .map_err(|e| DomainError::State(format!("create temp file: {}", e)))?;
        f.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::State(format!("write temp file: {}", e)))?;
        f.sync_all()
            .await
            .map_err(|e| DomainError::State(format!("sync temp file: {}", e)))?;
        drop(f);

        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            warn!(path = %self.path.display(), error = %e, "watermark rename failed");
            return Err(DomainError::State(format!("atomic rename failed: {}", e)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl WatermarkStore for StateJson {
    async fn read(&self) -> Result<Option<MessageId>, DomainError> {
        Ok(self.cache.read().await.last_seen_message_id.clone())
    }

    async fn write(&self, message_id: &MessageId) -> Result<(), DomainError> {
        let mut cache = self.cache.write().await;
        let next = StateData {
            last_seen_message_id: Some(message_id.clone()),
        };
        // Cache follows the file: a failed save leaves the old watermark in place.
        self.save(&next).await?;
        *cache = next;
        Ok(())
    }
}
