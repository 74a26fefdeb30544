// Requirements store - persistence for the business requirements artifact
//
// A single current version, overwritten on every save. Concurrent runs
// against the same file are not coordinated.

use super::types::BusinessRequirements;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[async_trait]
pub trait RequirementsStore: Send + Sync {
    /// Replace the stored artifact
    async fn save(&self, artifact: &BusinessRequirements) -> Result<(), StoreError>;

    /// Last saved artifact, or `None` if nothing was ever saved
    async fn load(&self) -> Result<Option<BusinessRequirements>, StoreError>;
}

/// Stores the artifact as a pretty-printed JSON file
pub struct FileRequirementsStore {
    path: PathBuf,
}

impl FileRequirementsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "business_requirements.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl RequirementsStore for FileRequirementsStore {
    async fn save(&self, artifact: &BusinessRequirements) -> Result<(), StoreError> {
        let contents = serde_json::to_vec_pretty(artifact).map_err(StoreError::Serialize)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        // Write beside the target, then rename over it
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| self.io_error(e))?;

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(self.io_error(e));
        }

        tracing::debug!(path = %self.path.display(), "saved business requirements");
        Ok(())
    }

    async fn load(&self) -> Result<Option<BusinessRequirements>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }
}

/// In-process store, for tests and dry runs
#[derive(Default)]
pub struct InMemoryRequirementsStore {
    slot: Mutex<Option<BusinessRequirements>>,
}

impl InMemoryRequirementsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact(artifact: BusinessRequirements) -> Self {
        Self {
            slot: Mutex::new(Some(artifact)),
        }
    }
}

#[async_trait]
impl RequirementsStore for InMemoryRequirementsStore {
    async fn save(&self, artifact: &BusinessRequirements) -> Result<(), StoreError> {
        *self.slot.lock().await = Some(artifact.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<BusinessRequirements>, StoreError> {
        Ok(self.slot.lock().await.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("requirements file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize requirements: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("requirements file {} is not valid: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
