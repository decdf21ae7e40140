//! Wire message types: one `serde`-tagged enum covering every RPC request and
//! reply shape in the overlay (see REDESIGN FLAGS in SPEC_FULL.md — the
//! original source used one args/reply struct pair per RPC method; this
//! collapses them into a single sum type dispatched through one table).

use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;
use crate::peer::PeerRef;

/// One chunk's placement key and on-disk name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub key: Identifier,
    pub name: String,
}

/// The ordered list of chunks making up one transfer, as sent from origin to
/// target. Order is the assembly order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub origin_peer_id: Identifier,
    pub chunks: Vec<ChunkInfo>,
}

impl ChunkManifest {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Which named on-disk directory a `RemoveChunks` cleanup applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryTag {
    /// The origin's local staging directory.
    Local,
    /// The replicated shared chunk store.
    Shared,
}

/// Every request and reply shape the overlay's RPC service can carry.
/// Request and reply share this type; each handler only produces the reply
/// variants documented against its request variant below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    // --- ring maintenance ---
    /// Request: route `id` to its responsible peer. Reply: `Successor`.
    FindSuccessor { id: Identifier },
    /// Reply to `FindSuccessor`.
    Successor { peer: PeerRef },

    /// Request: this peer's immediate successor. Reply: `Successor`.
    GetSuccessor,

    /// Request: this peer's successor list. Reply: `SuccessorList`.
    GetSuccessorList,
    /// Reply to `GetSuccessorList`.
    SuccessorList { peers: Vec<PeerRef> },

    /// Request: this peer's predecessor, if any. Reply: `Predecessor`.
    GetPredecessor,
    /// Reply to `GetPredecessor`.
    Predecessor { peer: Option<PeerRef> },

    /// Request: notify the receiver that `peer` believes itself to be its
    /// predecessor. Reply: `Ack`.
    Notify { peer: PeerRef },

    /// Liveness probe. Reply: `Ack`.
    Ping,

    /// Generic acknowledgement, used by RPCs with no payload reply.
    Ack,

    // --- chunk placement & transfer ---
    /// Request: ask the target to accept an incoming transfer. Reply: `TransferDecision`.
    ConfirmTransfer {
        sender_address: String,
        base_file_name: String,
    },
    /// Reply to `ConfirmTransfer`.
    TransferDecision { accepted: bool },

    /// Request: store a chunk's bytes under `name`. Reply: `Ack`.
    ReceiveChunk { name: String, bytes: Vec<u8> },

    /// Request: hand the target the manifest driving an assembly. Reply: `Ack`.
    DeliverManifest { manifest: ChunkManifest },

    /// Request: fetch a chunk's bytes by name. Reply: `ChunkData`.
    GetChunk { name: String },
    /// Reply to `GetChunk`. Empty `bytes` means the responder doesn't have it.
    ChunkData { bytes: Vec<u8> },

    /// Request: delete the named chunks from the tagged directory. Reply: `Ack`.
    RemoveChunks {
        directory: DirectoryTag,
        names: Vec<String>,
    },

    // --- test hook ---
    /// Request: suspend RPC handling on the receiver for `millis`. Reply: `Ack`.
    Sleep { millis: u64 },

    /// Reply used to surface an error without tearing down the connection.
    Error { reason: String },
}
