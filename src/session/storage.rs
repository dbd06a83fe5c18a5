//! Durable backends for the credential.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::credential::Credential;

/// Errors raised by a [`CredentialStorage`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted record exists but is not a valid credential.
    #[error("persisted credential is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Key-value persistence for the session credential.
///
/// Implementations hold at most one credential. `save` must replace the whole
/// record so a later `load` never sees fields from two different credentials.
#[async_trait]
pub trait CredentialStorage: Send + Sync + std::fmt::Debug {
    async fn load(&self) -> Result<Option<Credential>, StorageError>;
    async fn save(&self, credential: &Credential) -> Result<(), StorageError>;
    async fn remove(&self) -> Result<(), StorageError>;
}

/// In-process storage. Survives nothing but is handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: RwLock<Option<Credential>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with a credential, as if a previous run had saved it.
    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: RwLock::new(Some(credential)),
        }
    }
}

#[async_trait]
impl CredentialStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<Credential>, StorageError> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        *self.slot.write().await = Some(credential.clone());
        Ok(())
    }

    async fn remove(&self) -> Result<(), StorageError> {
        self.slot.write().await.take();
        Ok(())
    }
}

/// JSON file storage.
///
/// Writes go to a sibling temp file that is then renamed over the target, so a
/// concurrent reader sees either the old record or the new one.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| "session".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CredentialStorage for FileStorage {
    async fn load(&self) -> Result<Option<Credential>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.staging_path();
        let bytes = serde_json::to_vec_pretty(credential)?;
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    async fn remove(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample() -> Credential {
        Credential::new(
            "access",
            "refresh",
            Utc.with_ymd_and_hms(2030, 6, 1, 8, 30, 0).unwrap(),
            ["Admin", "Operator"],
        )
    }

    #[tokio::test]
    async fn test_memory_storage_lifecycle() {
        let storage = MemoryStorage::new();
        assert!(storage.load().await.unwrap().is_none());

        storage.save(&sample()).await.unwrap();
        assert_eq!(storage.load().await.unwrap(), Some(sample()));

        storage.remove().await.unwrap();
        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        FileStorage::new(&path).save(&sample()).await.unwrap();

        // A fresh handle on the same path plays the part of a reloaded page.
        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.load().await.unwrap(), Some(sample()));
        assert!(!reopened.staging_path().exists());

        reopened.remove().await.unwrap();
        assert!(reopened.load().await.unwrap().is_none());
        // Removing twice is fine.
        reopened.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_storage_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{\"token\": 42").unwrap();

        let err = FileStorage::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }
}
