//! Chord DHT overlay: identifier arithmetic, ring maintenance, chunk
//! placement/replication, and assembly. Transport, CLI, and filesystem I/O
//! live in `chord-node`; this crate stays free of sockets and `std::fs`.

pub mod assembler;
pub mod chunk;
pub mod chunk_rpc;
pub mod error;
pub mod identifier;
pub mod message;
pub mod peer;
pub mod retry;
pub mod ring;
pub mod storage;
pub mod transfer;
pub mod wire;

pub use chunk::{output_file_name, plan_chunks, PlannedChunk, DEFAULT_CHUNK_SIZE};
pub use chunk_rpc::ChunkClient;
pub use error::{AssemblyError, RoutingError, RpcError, StorageError, TransferError};
pub use identifier::{between, finger_start, hash, Identifier};
pub use message::{ChunkInfo, ChunkManifest, DirectoryTag, Message};
pub use peer::{PeerRef, PeerState, RingParams};
pub use ring::{Ring, RpcClient};
pub use storage::{MemoryStorage, Storage};
