//! Peer identity and per-process state.

use serde::{Deserialize, Serialize};

use crate::identifier::{hash, Identifier};

/// A reference to a peer: its ring identifier and its dial address.
/// Immutable once constructed — `address` is the sole source of `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerRef {
    pub id: Identifier,
    pub address: String,
}

impl PeerRef {
    pub fn new(address: impl Into<String>, m: u32) -> Self {
        let address = address.into();
        let id = hash(&address, m);
        Self { id, address }
    }
}

/// Ring and replication parameters fixed for the lifetime of a deployment.
/// All peers in a deployment must agree on these.
#[derive(Debug, Clone, Copy)]
pub struct RingParams {
    /// Width of the identifier space in bits: the ring is `[0, 2^m)`.
    pub m: u32,
    /// Replication factor: number of successors (beyond the primary) that
    /// hold a copy of each chunk.
    pub replication_factor: usize,
}

impl Default for RingParams {
    fn default() -> Self {
        Self {
            m: 64,
            replication_factor: 3,
        }
    }
}

/// Mutable ring-maintenance state for one peer, guarded by a single lock at
/// the call site (see `chord_node::peer_state` for the `tokio::sync::Mutex`
/// wrapper). Kept here as a plain struct so the pure ring algorithms in
/// `ring` can operate on snapshots without depending on any particular lock
/// type.
#[derive(Debug, Clone)]
pub struct PeerState {
    pub me: PeerRef,
    pub successor: PeerRef,
    pub predecessor: Option<PeerRef>,
    pub finger_table: Vec<PeerRef>,
    pub successor_list: Vec<PeerRef>,
    pub params: RingParams,
}

impl PeerState {
    /// Bootstrap state for the first peer in a ring: everything points at self.
    pub fn bootstrap(me: PeerRef, params: RingParams) -> Self {
        let finger_table = vec![me.clone(); params.m as usize];
        Self {
            successor: me.clone(),
            predecessor: None,
            finger_table,
            successor_list: Vec::new(),
            me,
            params,
        }
    }

    /// State for a peer that is about to join via `successor`. Finger table
    /// starts pointing at the successor until `fix_fingers` converges it.
    pub fn joining(me: PeerRef, successor: PeerRef, params: RingParams) -> Self {
        let finger_table = vec![successor.clone(); params.m as usize];
        Self {
            successor,
            predecessor: None,
            finger_table,
            successor_list: Vec::new(),
            me,
            params,
        }
    }

    pub fn is_alone(&self) -> bool {
        self.successor.id == self.me.id
    }
}
