use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{ServiceError, ServiceResult};
use crate::storage::KeyValueStore;

/// Stores each item in its own file under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn build_path(&self, name: &str) -> ServiceResult<PathBuf> {
        validate_key(name)?;
        Ok(self.root.join(format!("{name}.json")))
    }

    async fn ensure_root(&self) -> ServiceResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|error| {
                ServiceError::Storage(format!(
                    "failed to create storage directory {}: {error}",
                    self.root.display()
                ))
            })
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_item(&self, name: &str) -> ServiceResult<Option<String>> {
        let path = self.build_path(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(ServiceError::Storage(format!(
                "failed to read storage file {}: {error}",
                path.display()
            ))),
        }
    }

    async fn set_item(&self, name: &str, value: &str) -> ServiceResult<()> {
        let path = self.build_path(name)?;
        self.ensure_root().await?;

        // Write to temp file first for atomic operation
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, value.as_bytes())
            .await
            .map_err(|error| {
                ServiceError::Storage(format!(
                    "failed to write storage file {}: {error}",
                    tmp_path.display()
                ))
            })?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|error| {
                ServiceError::Storage(format!(
                    "failed to finalize storage file {}: {error}",
                    path.display()
                ))
            })?;

        tracing::debug!("wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    async fn remove_item(&self, name: &str) -> ServiceResult<bool> {
        let path = self.build_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(ServiceError::Storage(format!(
                "failed to remove storage file {}: {error}",
                path.display()
            ))),
        }
    }
}

fn validate_key(key: &str) -> ServiceResult<()> {
    if key.is_empty() || key == "." || key == ".." {
        return Err(ServiceError::InvalidInput(format!(
            "invalid storage key {key:?}"
        )));
    }
    if key.contains('/') || key.contains('\\') {
        return Err(ServiceError::InvalidInput(format!(
            "invalid storage key {key:?}"
        )));
    }
    Ok(())
}
