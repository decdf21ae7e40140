//! The wire-level RPC service: a TCP client implementing `chord_core`'s
//! `RpcClient`/`ChunkClient` traits, and a server that accepts one frame per
//! connection (request in, reply out, close) per §6 — the simplicity of the
//! source's one-call-per-TCP-connection `net/rpc` design, re-expressed as a
//! typed async client/server pair instead of Go's reflection-based dispatch
//! (see REDESIGN FLAGS).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chord_core::{
    ChunkClient, ChunkManifest, DirectoryTag, Message, PeerRef, RpcClient, RpcError, Storage,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::AppState;

const RPC_TIMEOUT: Duration = Duration::from_secs(3);

/// One confirm-transfer decision the RPC server hands off to the CLI task,
/// since accepting a transfer is an operator decision (§9: unauthenticated,
/// decided interactively).
pub struct ConfirmRequest {
    pub sender_address: String,
    pub base_file_name: String,
    pub reply: oneshot::Sender<bool>,
}

/// A TCP-backed client: connect, write one length-prefixed frame, read one
/// back, close.
pub struct TcpClient;

impl TcpClient {
    async fn call(&self, target: &PeerRef, request: Message) -> Result<Message, RpcError> {
        let frame = chord_core::wire::encode_frame(&request)?;
        let connect = TcpStream::connect(target.address.as_str());
        let mut stream = tokio::time::timeout(RPC_TIMEOUT, connect)
            .await
            .map_err(|_| RpcError::Timeout)??;
        tokio::time::timeout(RPC_TIMEOUT, stream.write_all(&frame))
            .await
            .map_err(|_| RpcError::Timeout)??;

        let mut len_buf = [0u8; chord_core::wire::LEN_PREFIX_SIZE];
        tokio::time::timeout(RPC_TIMEOUT, stream.read_exact(&mut len_buf))
            .await
            .map_err(|_| RpcError::Timeout)??;
        let len = chord_core::wire::decode_len_prefix(len_buf)?;
        let mut payload = vec![0u8; len];
        tokio::time::timeout(RPC_TIMEOUT, stream.read_exact(&mut payload))
            .await
            .map_err(|_| RpcError::Timeout)??;

        let mut full = Vec::with_capacity(len_buf.len() + payload.len());
        full.extend_from_slice(&len_buf);
        full.extend_from_slice(&payload);
        let (reply, _) = chord_core::wire::decode_frame(&full)?;
        Ok(reply)
    }
}

#[async_trait]
impl RpcClient for TcpClient {
    async fn find_successor(&self, target: &PeerRef, id: u64) -> Result<PeerRef, RpcError> {
        match self.call(target, Message::FindSuccessor { id }).await? {
            Message::Successor { peer } => Ok(peer),
            _ => Err(RpcError::UnexpectedReply),
        }
    }

    async fn get_successor(&self, target: &PeerRef) -> Result<PeerRef, RpcError> {
        match self.call(target, Message::GetSuccessor).await? {
            Message::Successor { peer } => Ok(peer),
            _ => Err(RpcError::UnexpectedReply),
        }
    }

    async fn get_successor_list(&self, target: &PeerRef) -> Result<Vec<PeerRef>, RpcError> {
        match self.call(target, Message::GetSuccessorList).await? {
            Message::SuccessorList { peers } => Ok(peers),
            _ => Err(RpcError::UnexpectedReply),
        }
    }

    async fn get_predecessor(&self, target: &PeerRef) -> Result<Option<PeerRef>, RpcError> {
        match self.call(target, Message::GetPredecessor).await? {
            Message::Predecessor { peer } => Ok(peer),
            _ => Err(RpcError::UnexpectedReply),
        }
    }

    async fn notify(&self, target: &PeerRef, me: &PeerRef) -> Result<(), RpcError> {
        match self.call(target, Message::Notify { peer: me.clone() }).await? {
            Message::Ack => Ok(()),
            _ => Err(RpcError::UnexpectedReply),
        }
    }

    async fn ping(&self, target: &PeerRef) -> Result<(), RpcError> {
        match self.call(target, Message::Ping).await? {
            Message::Ack => Ok(()),
            _ => Err(RpcError::UnexpectedReply),
        }
    }
}

#[async_trait]
impl ChunkClient for TcpClient {
    async fn confirm_transfer(
        &self,
        target: &PeerRef,
        sender_address: &str,
        base_file_name: &str,
    ) -> Result<bool, RpcError> {
        match self
            .call(
                target,
                Message::ConfirmTransfer {
                    sender_address: sender_address.to_string(),
                    base_file_name: base_file_name.to_string(),
                },
            )
            .await?
        {
            Message::TransferDecision { accepted } => Ok(accepted),
            _ => Err(RpcError::UnexpectedReply),
        }
    }

    async fn receive_chunk(&self, target: &PeerRef, name: &str, bytes: Vec<u8>) -> Result<(), RpcError> {
        match self
            .call(target, Message::ReceiveChunk { name: name.to_string(), bytes })
            .await?
        {
            Message::Ack => Ok(()),
            _ => Err(RpcError::UnexpectedReply),
        }
    }

    async fn deliver_manifest(&self, target: &PeerRef, manifest: ChunkManifest) -> Result<(), RpcError> {
        match self.call(target, Message::DeliverManifest { manifest }).await? {
            Message::Ack => Ok(()),
            _ => Err(RpcError::UnexpectedReply),
        }
    }

    async fn get_chunk(&self, target: &PeerRef, name: &str) -> Result<Vec<u8>, RpcError> {
        match self.call(target, Message::GetChunk { name: name.to_string() }).await? {
            Message::ChunkData { bytes } => Ok(bytes),
            _ => Err(RpcError::UnexpectedReply),
        }
    }

    async fn remove_chunks(
        &self,
        target: &PeerRef,
        directory: DirectoryTag,
        names: Vec<String>,
    ) -> Result<(), RpcError> {
        match self.call(target, Message::RemoveChunks { directory, names }).await? {
            Message::Ack => Ok(()),
            _ => Err(RpcError::UnexpectedReply),
        }
    }
}

/// Tracks the `Sleep` test hook: while `Some(deadline)`, the server delays
/// handling every subsequent request until `deadline` elapses.
pub type SleepGate = Arc<Mutex<Option<tokio::time::Instant>>>;

pub async fn run_server(
    listener: TcpListener,
    state: Arc<AppState>,
    confirm_tx: mpsc::UnboundedSender<ConfirmRequest>,
    sleep_gate: SleepGate,
) -> std::io::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let state = state.clone();
        let confirm_tx = confirm_tx.clone();
        let sleep_gate = sleep_gate.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, state, confirm_tx, sleep_gate).await {
                tracing::debug!(error = %e, "rpc connection error");
            }
        });
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    state: Arc<AppState>,
    confirm_tx: mpsc::UnboundedSender<ConfirmRequest>,
    sleep_gate: SleepGate,
) -> std::io::Result<()> {
    let mut len_buf = [0u8; chord_core::wire::LEN_PREFIX_SIZE];
    stream.read_exact(&mut len_buf).await?;
    let len = chord_core::wire::decode_len_prefix(len_buf)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    let mut full = Vec::with_capacity(len_buf.len() + payload.len());
    full.extend_from_slice(&len_buf);
    full.extend_from_slice(&payload);
    let (request, _) = chord_core::wire::decode_frame(&full)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    if let Some(deadline) = *sleep_gate.lock().await {
        tokio::time::sleep_until(deadline).await;
    }

    let reply = dispatch(request, &state, &confirm_tx, &sleep_gate).await;
    let frame = chord_core::wire::encode_frame(&reply)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    stream.write_all(&frame).await
}

async fn dispatch(
    request: Message,
    state: &Arc<AppState>,
    confirm_tx: &mpsc::UnboundedSender<ConfirmRequest>,
    sleep_gate: &SleepGate,
) -> Message {
    match request {
        Message::FindSuccessor { id } => match state.ring.find_successor(state.client.as_ref(), id).await {
            Ok(peer) => Message::Successor { peer },
            Err(e) => Message::Error { reason: e.to_string() },
        },
        Message::GetSuccessor => Message::Successor { peer: state.ring.snapshot().await.successor },
        Message::GetSuccessorList => Message::SuccessorList { peers: state.ring.snapshot().await.successor_list },
        Message::GetPredecessor => Message::Predecessor { peer: state.ring.snapshot().await.predecessor },
        Message::Notify { peer } => {
            state.ring.on_notify(peer).await;
            Message::Ack
        }
        Message::Ping => Message::Ack,
        Message::ConfirmTransfer { sender_address, base_file_name } => {
            let (reply_tx, reply_rx) = oneshot::channel();
            if confirm_tx
                .send(ConfirmRequest { sender_address, base_file_name, reply: reply_tx })
                .is_err()
            {
                return Message::TransferDecision { accepted: false };
            }
            let accepted = reply_rx.await.unwrap_or(false);
            Message::TransferDecision { accepted }
        }
        Message::ReceiveChunk { name, bytes } => match state.storage.write_shared(&name, &bytes).await {
            Ok(()) => Message::Ack,
            Err(e) => Message::Error { reason: e.to_string() },
        },
        Message::DeliverManifest { manifest } => {
            if manifest.is_empty() {
                return Message::Error { reason: "empty manifest".to_string() };
            }
            let ring = state.ring.clone();
            let client = state.client.clone();
            let storage = state.storage.clone();
            tokio::spawn(async move {
                match chord_core::assembler::assemble_with_deadline(&ring, client.as_ref(), storage.as_ref(), &manifest).await {
                    Ok(output_name) => tracing::info!(file = %output_name, "assembly complete"),
                    Err(e) => tracing::warn!(error = %e, "assembly failed"),
                }
            });
            Message::Ack
        }
        Message::GetChunk { name } => match state.storage.read_shared(&name).await {
            Ok(bytes) => Message::ChunkData { bytes: bytes.unwrap_or_default() },
            Err(e) => Message::Error { reason: e.to_string() },
        },
        Message::RemoveChunks { directory, names } => {
            for name in names {
                let result = match directory {
                    DirectoryTag::Local => state.storage.delete_local(&name).await,
                    DirectoryTag::Shared => state.storage.delete_shared(&name).await,
                };
                if let Err(e) = result {
                    tracing::warn!(error = %e, chunk = %name, "cleanup failed");
                }
            }
            Message::Ack
        }
        Message::Sleep { millis } => {
            *sleep_gate.lock().await = Some(tokio::time::Instant::now() + Duration::from_millis(millis));
            Message::Ack
        }
        other => Message::Error { reason: format!("unexpected request variant: {other:?}") },
    }
}
