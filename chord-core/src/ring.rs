//! Ring maintenance: `find_successor`, `closest_preceding_node`, stabilize,
//! fix_fingers, check_predecessor, and the single lock guarding `PeerState`.
//!
//! These functions are generic over an `RpcClient` so this crate stays free
//! of any particular transport; `chord-node` supplies the TCP-backed
//! implementation. The governing rule throughout (§5 of the spec): never
//! hold the lock while making an RPC call — snapshot, release, call, then
//! reacquire to apply any update.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{RoutingError, RpcError};
use crate::identifier::{between, finger_start, Identifier};
use crate::peer::{PeerRef, PeerState};

/// Everything a ring-maintenance routine needs to say to another peer.
/// Implemented by `chord-node`'s TCP client; a fake in tests can answer
/// without any sockets at all.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn find_successor(&self, target: &PeerRef, id: Identifier) -> Result<PeerRef, RpcError>;
    async fn get_successor(&self, target: &PeerRef) -> Result<PeerRef, RpcError>;
    async fn get_successor_list(&self, target: &PeerRef) -> Result<Vec<PeerRef>, RpcError>;
    async fn get_predecessor(&self, target: &PeerRef) -> Result<Option<PeerRef>, RpcError>;
    async fn notify(&self, target: &PeerRef, me: &PeerRef) -> Result<(), RpcError>;
    async fn ping(&self, target: &PeerRef) -> Result<(), RpcError>;
}

/// A `PeerState` behind the one lock the spec calls for. All ring-level
/// mutation goes through here so no caller can forget the snapshot-release-
/// call-reacquire discipline.
pub struct Ring {
    state: Mutex<PeerState>,
}

impl Ring {
    pub fn new(state: PeerState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// A cheap, consistent copy of the current state for read-only use
    /// (algorithms below, or the CLI's "show finger table" commands).
    pub async fn snapshot(&self) -> PeerState {
        self.state.lock().await.clone()
    }

    pub async fn me(&self) -> PeerRef {
        self.state.lock().await.me.clone()
    }

    async fn set_successor(&self, successor: PeerRef) {
        self.state.lock().await.successor = successor;
    }

    async fn set_successor_list(&self, list: Vec<PeerRef>) {
        self.state.lock().await.successor_list = list;
    }

    async fn set_finger(&self, i: usize, peer: PeerRef) {
        let mut guard = self.state.lock().await;
        if i < guard.finger_table.len() {
            guard.finger_table[i] = peer;
        }
    }

    async fn clear_predecessor(&self) {
        self.state.lock().await.predecessor = None;
    }

    /// `Notify(caller)`: adopt `caller` as predecessor iff we have none, or
    /// `caller` lies strictly between our current predecessor and us.
    pub async fn on_notify(&self, caller: PeerRef) {
        let mut guard = self.state.lock().await;
        let should_adopt = match &guard.predecessor {
            None => true,
            Some(p) => between(caller.id, p.id, guard.me.id, false),
        };
        if should_adopt {
            tracing::debug!(node = %guard.me.id, new_predecessor = %caller.id, "adopted predecessor");
            guard.predecessor = Some(caller);
        }
    }

    /// `closest_preceding_node(id)`: scan the finger table from the top;
    /// return the first entry strictly inside `(self.id, id)`. Falls back to
    /// `self` when none qualifies.
    pub async fn closest_preceding_node(&self, id: Identifier) -> PeerRef {
        let guard = self.state.lock().await;
        for finger in guard.finger_table.iter().rev() {
            if between(finger.id, guard.me.id, id, false) {
                return finger.clone();
            }
        }
        guard.me.clone()
    }

    /// `find_successor(id)`: returns the current best-estimate peer
    /// responsible for `id`, self-correcting via successor-list failover and
    /// single-hop forwarding (see §4.3).
    pub async fn find_successor(
        &self,
        client: &dyn RpcClient,
        id: Identifier,
    ) -> Result<PeerRef, RoutingError> {
        let (me, successor) = {
            let guard = self.state.lock().await;
            (guard.me.clone(), guard.successor.clone())
        };

        if between(id, me.id, successor.id, true) {
            match self.probe_or_failover(client, successor).await {
                Some(live) => return Ok(live),
                None => return Ok(me),
            }
        }

        let closest = self.closest_preceding_node(id).await;
        if closest.id == me.id {
            return Ok(me);
        }
        match client.find_successor(&closest, id).await {
            Ok(answer) => Ok(answer),
            Err(_) => Err(RoutingError { id }),
        }
    }

    /// Probe `candidate`; on failure, fail over through the successor list
    /// (updating `successor` to the first live entry found). Returns `None`
    /// only when every candidate, including self, is unreachable (the caller
    /// then treats `self` as the answer, per §4.3 step 1).
    async fn probe_or_failover(&self, client: &dyn RpcClient, candidate: PeerRef) -> Option<PeerRef> {
        if client.ping(&candidate).await.is_ok() {
            return Some(candidate);
        }
        let list = self.state.lock().await.successor_list.clone();
        for next in list {
            if next.id == candidate.id {
                continue;
            }
            if client.ping(&next).await.is_ok() {
                self.set_successor(next.clone()).await;
                return Some(next);
            }
        }
        let me = self.me().await;
        self.set_successor(me).await;
        None
    }

    /// One stabilization round (§4.4).
    pub async fn stabilize(&self, client: &dyn RpcClient) {
        let (me, successor) = {
            let guard = self.state.lock().await;
            (guard.me.clone(), guard.successor.clone())
        };

        let successor = match client.get_predecessor(&successor).await {
            Ok(x) => {
                if let Some(x) = x {
                    if between(x.id, me.id, successor.id, false) {
                        self.set_successor(x.clone()).await;
                        x
                    } else {
                        successor
                    }
                } else {
                    successor
                }
            }
            Err(_) => match self.probe_or_failover(client, successor.clone()).await {
                Some(live) => live,
                None => me.clone(),
            },
        };

        if client.notify(&successor, &me).await.is_err() {
            tracing::warn!(node = %me.id, successor = %successor.id, "notify failed during stabilize");
        }

        self.refresh_successor_list(client, successor).await;
    }

    /// Walk successor-of-successor via `GetSuccessor`, collecting up to
    /// `replication_factor` peers, ignoring individual failures.
    async fn refresh_successor_list(&self, client: &dyn RpcClient, successor: PeerRef) {
        let (me, r) = {
            let guard = self.state.lock().await;
            (guard.me.clone(), guard.params.replication_factor)
        };
        let mut list = Vec::with_capacity(r);
        let mut current = successor;
        while list.len() < r {
            if current.id == me.id {
                break;
            }
            list.push(current.clone());
            match client.get_successor(&current).await {
                Ok(next) if next.id != current.id => current = next,
                _ => break,
            }
        }
        self.set_successor_list(list).await;
    }

    /// One `fix_fingers` sweep (§4.5): recompute every finger-table entry.
    pub async fn fix_fingers(&self, client: &dyn RpcClient) {
        let (me, m) = {
            let guard = self.state.lock().await;
            (guard.me.clone(), guard.finger_table.len() as u32)
        };
        for i in 0..m {
            let start = finger_start(me.id, i, m);
            if let Ok(peer) = self.find_successor(client, start).await {
                self.set_finger(i as usize, peer).await;
            }
        }
    }

    /// One `check_predecessor` tick (§4.5): ping the predecessor, clearing it
    /// on failure.
    pub async fn check_predecessor(&self, client: &dyn RpcClient) {
        let predecessor = self.state.lock().await.predecessor.clone();
        if let Some(p) = predecessor {
            if client.ping(&p).await.is_err() {
                tracing::info!(predecessor = %p.id, "predecessor unresponsive, clearing");
                self.clear_predecessor().await;
            }
        }
    }

    /// Walk `successor` pointers starting from self, for the CLI's "list
    /// ring members" command. Stops when it returns to self or after
    /// `max_hops` (guards against a still-inconsistent ring looping forever).
    pub async fn walk_ring(&self, client: &dyn RpcClient, max_hops: usize) -> Vec<PeerRef> {
        let me = self.me().await;
        let mut out = vec![me.clone()];
        let mut current = self.state.lock().await.successor.clone();
        for _ in 0..max_hops {
            if current.id == me.id {
                break;
            }
            out.push(current.clone());
            match client.get_successor(&current).await {
                Ok(next) => current = next,
                Err(_) => break,
            }
        }
        out
    }
}
