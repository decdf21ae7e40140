//! Error kinds, grouped the way §7 of the spec groups them: transport,
//! routing, storage, validation, timeout. Background ring-maintenance tasks
//! only ever see `RpcError`, which they log and swallow; foreground transfer
//! and assembly paths propagate `TransferError`/`AssemblyError` after
//! exhausting retries.

use thiserror::Error;

/// A single RPC call failed: connection refused, reset, or timed out. Callers
/// treat this uniformly as "peer suspected dead" — never a reason to exit.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),
    #[error("call timed out")]
    Timeout,
    #[error("unexpected reply variant")]
    UnexpectedReply,
    #[error("peer returned an error: {0}")]
    Remote(String),
    #[error("frame encode error: {0}")]
    Encode(#[from] crate::wire::FrameEncodeError),
    #[error("frame decode error: {0}")]
    Decode(#[from] crate::wire::FrameDecodeError),
}

impl From<std::io::Error> for RpcError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            RpcError::Timeout
        } else {
            RpcError::Transport(e)
        }
    }
}

/// `find_successor` could not make progress: every candidate (successor plus
/// its whole successor list) is unreachable.
#[derive(Debug, Error)]
#[error("routing failed: no reachable successor for id {id}")]
pub struct RoutingError {
    pub id: crate::identifier::Identifier,
}

/// A local storage operation (read, write, delete, or list) failed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors during chunk placement and manifest delivery, surfaced to the CLI.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("target rejected the transfer")]
    Rejected,
    #[error("could not reach target to confirm transfer: {0}")]
    ConfirmFailed(#[source] RpcError),
    #[error("routing failure during placement: {0}")]
    Routing(#[from] RoutingError),
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("manifest delivery timed out after retry window")]
    ManifestDeliveryTimedOut,
    #[error("source file not found: {0}")]
    FileNotFound(String),
}

/// Errors during manifest receipt and assembly.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("manifest is empty")]
    EmptyManifest,
    #[error("assembly deadline exceeded")]
    DeadlineExceeded,
    #[error("exhausted retries retrieving chunk {chunk_name}")]
    ChunkUnavailable { chunk_name: String },
    #[error("routing failure: {0}")]
    Routing(#[from] RoutingError),
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}
