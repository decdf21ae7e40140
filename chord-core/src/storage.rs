//! The local storage layer as an interface (§6): three named directories —
//! local staging, replicated shared store, and assembly scratch/output — with
//! read/write/delete semantics. Core algorithms in this crate only ever see
//! `&dyn Storage`; `chord-node` supplies the filesystem-backed implementation
//! so this crate never calls `std::fs` directly.

use async_trait::async_trait;

use crate::error::StorageError;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Write a chunk to the local staging directory (origin side, during
    /// send).
    async fn write_local(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;
    /// Delete a staged chunk. Missing files are not an error.
    async fn delete_local(&self, name: &str) -> Result<(), StorageError>;

    /// Write a chunk to the replicated shared store (primary or replica
    /// side, on `ReceiveChunk`).
    async fn write_shared(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;
    /// Read a chunk from the shared store. `None` means this peer doesn't
    /// have it — not an error.
    async fn read_shared(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;
    /// Delete a chunk from the shared store. Missing files are not an error.
    async fn delete_shared(&self, name: &str) -> Result<(), StorageError>;

    /// Write a fetched chunk into the assembly scratch directory (target
    /// side, during assembly).
    async fn write_assemble(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;
    /// Read a chunk back out of the assembly scratch directory.
    async fn read_assemble(&self, name: &str) -> Result<Vec<u8>, StorageError>;
    /// Clear the assembly scratch directory after a transfer completes.
    async fn clear_assemble(&self) -> Result<(), StorageError>;

    /// Write the final reconstructed file to the output directory.
    async fn write_output(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;
}

/// An in-memory `Storage` used by this crate's own tests (and available to
/// `chord-node`'s integration tests) so the transfer and assembly algorithms
/// can be exercised without touching a filesystem.
#[derive(Default)]
pub struct MemoryStorage {
    local: tokio::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
    shared: tokio::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
    assemble: tokio::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
    output: tokio::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn output_files(&self) -> std::collections::HashMap<String, Vec<u8>> {
        self.output.lock().await.clone()
    }

    pub async fn shared_contains(&self, name: &str) -> bool {
        self.shared.lock().await.contains_key(name)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn write_local(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.local.lock().await.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete_local(&self, name: &str) -> Result<(), StorageError> {
        self.local.lock().await.remove(name);
        Ok(())
    }

    async fn write_shared(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.shared.lock().await.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read_shared(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.shared.lock().await.get(name).cloned())
    }

    async fn delete_shared(&self, name: &str) -> Result<(), StorageError> {
        self.shared.lock().await.remove(name);
        Ok(())
    }

    async fn write_assemble(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.assemble.lock().await.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read_assemble(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.assemble
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::Io {
                path: name.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "chunk not staged"),
            })
    }

    async fn clear_assemble(&self) -> Result<(), StorageError> {
        self.assemble.lock().await.clear();
        Ok(())
    }

    async fn write_output(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.output.lock().await.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}
