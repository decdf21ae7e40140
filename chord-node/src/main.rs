//! Chord peer daemon: RPC server, operator CLI, and periodic ring
//! maintenance, one `tokio::spawn` per subsystem — the same shape the
//! teacher's Linux daemon used for its proxy/discovery/transport trio,
//! carried over here as rpc_server/cli/periodic tickers.

mod cli;
mod config;
mod discovery;
mod rpc;
mod storage;

use std::sync::Arc;
use std::time::Duration;

use chord_core::{PeerState, Ring, RingParams, RpcClient};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tracing_subscriber::EnvFilter;

use crate::rpc::{SleepGate, TcpClient};
use crate::storage::FsStorage;

const STABILIZE_PERIOD: Duration = Duration::from_secs(5);
const FIX_FINGERS_PERIOD: Duration = Duration::from_secs(7);
const CHECK_PREDECESSOR_PERIOD: Duration = Duration::from_secs(1);

/// Shared daemon state: the ring, the RPC client used to talk to other
/// peers, and this peer's storage roots.
pub struct AppState {
    pub ring: Arc<Ring>,
    pub client: Arc<TcpClient>,
    pub storage: Arc<FsStorage>,
}

#[derive(Parser, Debug)]
#[command(
    name = "chord-node",
    version,
    about = "Chord DHT peer daemon: ring maintenance, replicated chunk storage, file transfer"
)]
struct Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::load();
    let ip = discovery::discover_ipv4(&config.interface)?;
    let address = format!("{ip}:{}", config.port);
    tracing::info!(%address, interface = %config.interface, "resolved bind address");

    let storage = Arc::new(FsStorage::new(&config.data_dir).await?);
    let client = Arc::new(TcpClient);
    let params = RingParams {
        m: config.m,
        replication_factor: config.replication_factor,
    };
    let me = chord_core::PeerRef::new(address.clone(), config.m);

    let ring = match &config.bootstrap_addr {
        None => {
            tracing::info!(node = %me.id, "starting a new ring");
            Arc::new(Ring::new(PeerState::bootstrap(me.clone(), params)))
        }
        Some(bootstrap_addr) => {
            let bootstrap = chord_core::PeerRef::new(bootstrap_addr.clone(), config.m);
            let successor = client.find_successor(&bootstrap, me.id).await?;
            tracing::info!(node = %me.id, successor = %successor.id, "joined ring via bootstrap peer");
            let ring = Arc::new(Ring::new(PeerState::joining(me.clone(), successor.clone(), params)));
            client.notify(&successor, &me).await?;
            ring
        }
    };

    let state = Arc::new(AppState { ring, client, storage });

    let listener = TcpListener::bind(address.as_str()).await?;
    let (confirm_tx, confirm_rx) = mpsc::unbounded_channel();
    let sleep_gate: SleepGate = Arc::new(Mutex::new(None));

    let rpc_task = tokio::spawn(rpc::run_server(listener, state.clone(), confirm_tx, sleep_gate.clone()));
    let cli_task = tokio::spawn(cli::run_cli(state.clone(), confirm_rx, sleep_gate));
    let ticker_task = tokio::spawn(run_periodic_tasks(state.clone()));

    tokio::select! {
        result = rpc_task => result??,
        result = cli_task => result??,
        result = ticker_task => result?,
        _ = shutdown_signal() => tracing::info!("shutdown signal received"),
    }

    Ok(())
}

/// Stabilize, fix_fingers, and check_predecessor on their own intervals
/// (§4.4/§4.5), each a separate ticker so a slow sweep on one never delays
/// the others.
async fn run_periodic_tasks(state: Arc<AppState>) {
    let stabilize_state = state.clone();
    let stabilize = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STABILIZE_PERIOD);
        loop {
            ticker.tick().await;
            stabilize_state.ring.stabilize(stabilize_state.client.as_ref()).await;
        }
    });

    let fix_fingers_state = state.clone();
    let fix_fingers = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(FIX_FINGERS_PERIOD);
        loop {
            ticker.tick().await;
            fix_fingers_state.ring.fix_fingers(fix_fingers_state.client.as_ref()).await;
        }
    });

    let check_predecessor_state = state;
    let check_predecessor = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CHECK_PREDECESSOR_PERIOD);
        loop {
            ticker.tick().await;
            check_predecessor_state
                .ring
                .check_predecessor(check_predecessor_state.client.as_ref())
                .await;
        }
    });

    let _ = tokio::join!(stabilize, fix_fingers, check_predecessor);
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let Ok(mut sigterm) = signal(SignalKind::terminate()) else {
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
