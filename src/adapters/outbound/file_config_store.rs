//! File Config Store
//!
//! Implements ConfigStore by writing the rendered configuration to disk.
//! The hash goes to a sibling `.hash` file that a supervisor can watch to
//! trigger an HAProxy reload.

use crate::domain::errors::StoreError;
use crate::domain::ports::ConfigStore;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File-backed config store.
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the hash marker file.
    pub fn hash_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".hash");
        PathBuf::from(name)
    }

    /// Write via a temp file and rename so readers never see partial content.
    async fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::write(&tmp, content).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn apply(&self, content: &str, content_hash: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
        }

        Self::write_atomic(&self.path, content).await?;
        Self::write_atomic(&self.hash_path(), content_hash).await?;

        tracing::info!("wrote haproxy configuration to {}", self.path.display());
        Ok(())
    }
}
