//! The chunk-transfer half of the wire protocol (§4.6–§4.8): confirming a
//! transfer, pushing chunk bytes, delivering a manifest, pulling a chunk
//! back, and cleanup. Kept as its own trait, separate from `ring::RpcClient`,
//! so ring-maintenance code never has to know these RPCs exist; `chord-node`
//! implements both traits on the same TCP client.

use async_trait::async_trait;

use crate::error::RpcError;
use crate::message::{ChunkManifest, DirectoryTag};
use crate::peer::PeerRef;

#[async_trait]
pub trait ChunkClient: Send + Sync {
    /// Ask `target` to accept an incoming transfer. `Ok(false)` is an
    /// explicit rejection, not an error.
    async fn confirm_transfer(
        &self,
        target: &PeerRef,
        sender_address: &str,
        base_file_name: &str,
    ) -> Result<bool, RpcError>;

    /// Push one chunk's bytes to `target`'s shared store.
    async fn receive_chunk(&self, target: &PeerRef, name: &str, bytes: Vec<u8>) -> Result<(), RpcError>;

    /// Hand `target` the manifest driving an assembly.
    async fn deliver_manifest(&self, target: &PeerRef, manifest: ChunkManifest) -> Result<(), RpcError>;

    /// Fetch a chunk's bytes from `target`. An empty vec means `target`
    /// doesn't have it — not an error.
    async fn get_chunk(&self, target: &PeerRef, name: &str) -> Result<Vec<u8>, RpcError>;

    /// Delete the named chunks from the tagged directory on `target`.
    /// Missing files are not an error on the receiving end.
    async fn remove_chunks(
        &self,
        target: &PeerRef,
        directory: DirectoryTag,
        names: Vec<String>,
    ) -> Result<(), RpcError>;
}
