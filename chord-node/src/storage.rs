//! Filesystem-backed `Storage`: the only place in this workspace that calls
//! `tokio::fs` directly. Four directories under a configurable base:
//! `local/` (origin staging), `shared/` (replicated chunk store),
//! `assemble/` (assembly scratch), `output/` (reconstructed files).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chord_core::{Storage, StorageError};

pub struct FsStorage {
    local: PathBuf,
    shared: PathBuf,
    assemble: PathBuf,
    output: PathBuf,
}

impl FsStorage {
    /// Create the four storage roots under `base_dir`, if they don't already
    /// exist.
    pub async fn new(base_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let base = base_dir.as_ref();
        let local = base.join("local");
        let shared = base.join("shared");
        let assemble = base.join("assemble");
        let output = base.join("output");
        for dir in [&local, &shared, &assemble, &output] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(Self { local, shared, assemble, output })
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io { path: path.display().to_string(), source }
}

async fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await.map_err(|e| io_err(&path, e))
}

async fn delete_file(dir: &Path, name: &str) -> Result<(), StorageError> {
    let path = dir.join(name);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(&path, e)),
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn write_local(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        write_file(&self.local, name, bytes).await
    }

    async fn delete_local(&self, name: &str) -> Result<(), StorageError> {
        delete_file(&self.local, name).await
    }

    async fn write_shared(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        write_file(&self.shared, name, bytes).await
    }

    async fn read_shared(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.shared.join(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    async fn delete_shared(&self, name: &str) -> Result<(), StorageError> {
        delete_file(&self.shared, name).await
    }

    async fn write_assemble(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        write_file(&self.assemble, name, bytes).await
    }

    async fn read_assemble(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.assemble.join(name);
        tokio::fs::read(&path).await.map_err(|e| io_err(&path, e))
    }

    async fn clear_assemble(&self) -> Result<(), StorageError> {
        let mut entries = tokio::fs::read_dir(&self.assemble)
            .await
            .map_err(|e| io_err(&self.assemble, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_err(&self.assemble, e))? {
            let path = entry.path();
            if path.is_file() {
                tokio::fs::remove_file(&path).await.map_err(|e| io_err(&path, e))?;
            }
        }
        Ok(())
    }

    async fn write_output(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        write_file(&self.output, name, bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_four_directories() {
        let tmp = tempfile::tempdir().unwrap();
        FsStorage::new(tmp.path()).await.unwrap();
        for sub in ["local", "shared", "assemble", "output"] {
            assert!(tmp.path().join(sub).is_dir());
        }
    }

    #[tokio::test]
    async fn round_trips_a_shared_chunk() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(tmp.path()).await.unwrap();
        storage.write_shared("a.chunk", b"hello").await.unwrap();
        assert_eq!(storage.read_shared("a.chunk").await.unwrap(), Some(b"hello".to_vec()));
        storage.delete_shared("a.chunk").await.unwrap();
        assert_eq!(storage.read_shared("a.chunk").await.unwrap(), None);
    }

    #[tokio::test]
    async fn deleting_a_missing_chunk_is_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(tmp.path()).await.unwrap();
        assert!(storage.delete_local("never-written").await.is_ok());
        assert!(storage.delete_shared("never-written").await.is_ok());
    }

    #[tokio::test]
    async fn clear_assemble_removes_staged_chunks_only() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(tmp.path()).await.unwrap();
        storage.write_assemble("c1", b"one").await.unwrap();
        storage.write_assemble("c2", b"two").await.unwrap();
        storage.clear_assemble().await.unwrap();
        assert!(storage.read_assemble("c1").await.is_err());
    }
}
