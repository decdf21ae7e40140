//! The operator-facing line-oriented menu (§6): one task alongside the RPC
//! server and periodic tickers, reading `tokio::io::stdin()` through a
//! `BufReader`. Out of scope for exact wording — this just needs to expose
//! the ring-inspection and transfer-initiation surface the CLI contract
//! calls for.

use std::io::Write as _;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};

use crate::rpc::{ConfirmRequest, SleepGate};
use crate::AppState;

struct SharedStdin(Mutex<BufReader<tokio::io::Stdin>>);

impl SharedStdin {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(BufReader::new(tokio::io::stdin()))))
    }

    /// Read one line, trimmed. `None` on EOF.
    async fn read_line(&self) -> std::io::Result<Option<String>> {
        let mut guard = self.0.lock().await;
        let mut line = String::new();
        let n = guard.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

/// Waits on `confirm_rx` and answers each request from the operator, sharing
/// `stdin` with the menu loop so the two never read concurrently.
async fn run_confirm_handler(mut confirm_rx: mpsc::UnboundedReceiver<ConfirmRequest>, stdin: Arc<SharedStdin>) {
    while let Some(req) = confirm_rx.recv().await {
        println!(
            "\nincoming transfer: '{}' from {} -- accept? [y/N]",
            req.base_file_name, req.sender_address
        );
        let _ = std::io::stdout().flush();
        let answer = stdin.read_line().await.ok().flatten().unwrap_or_default();
        let accepted = answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes");
        let _ = req.reply.send(accepted);
    }
}

fn print_menu() {
    println!(
        "\ncommands: [f]ingers  [s]uccessor  [p]redecessor  [l]ist ring  \
         [r]eplica list  [t]ransfer  sle[e]p  [q]uit"
    );
}

pub async fn run_cli(
    state: Arc<AppState>,
    confirm_rx: mpsc::UnboundedReceiver<ConfirmRequest>,
    sleep_gate: SleepGate,
) -> anyhow::Result<()> {
    let stdin = SharedStdin::new();
    tokio::spawn(run_confirm_handler(confirm_rx, stdin.clone()));

    print_menu();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = stdin.read_line().await? else {
            break;
        };
        match line.as_str() {
            "" => continue,
            "q" | "quit" => break,
            "f" | "fingers" => show_fingers(&state).await,
            "s" | "successor" => show_successor(&state).await,
            "p" | "predecessor" => show_predecessor(&state).await,
            "r" | "replicas" => show_successor_list(&state).await,
            "l" | "list" => show_ring(&state).await,
            "t" | "transfer" => {
                if let Err(e) = initiate_transfer(&state, &stdin).await {
                    println!("transfer failed: {e}");
                }
            }
            "e" | "sleep" => {
                if let Err(e) = simulate_sleep(&stdin, &sleep_gate).await {
                    println!("sleep command failed: {e}");
                }
            }
            other => println!("unrecognized command: {other}"),
        }
    }
    Ok(())
}

async fn show_fingers(state: &AppState) {
    let snapshot = state.ring.snapshot().await;
    for (i, finger) in snapshot.finger_table.iter().enumerate() {
        println!("  [{i}] id={} addr={}", finger.id, finger.address);
    }
}

async fn show_successor(state: &AppState) {
    let snapshot = state.ring.snapshot().await;
    println!("successor: id={} addr={}", snapshot.successor.id, snapshot.successor.address);
}

async fn show_predecessor(state: &AppState) {
    match state.ring.snapshot().await.predecessor {
        Some(p) => println!("predecessor: id={} addr={}", p.id, p.address),
        None => println!("predecessor: none"),
    }
}

async fn show_successor_list(state: &AppState) {
    let snapshot = state.ring.snapshot().await;
    for peer in &snapshot.successor_list {
        println!("  id={} addr={}", peer.id, peer.address);
    }
}

async fn show_ring(state: &AppState) {
    let members = state.ring.walk_ring(state.client.as_ref(), 64).await;
    for peer in &members {
        println!("  id={} addr={}", peer.id, peer.address);
    }
}

async fn prompt(stdin: &SharedStdin, label: &str) -> anyhow::Result<String> {
    print!("{label}: ");
    std::io::stdout().flush()?;
    let line = stdin
        .read_line()
        .await?
        .ok_or_else(|| anyhow::anyhow!("stdin closed"))?;
    Ok(line)
}

async fn initiate_transfer(state: &AppState, stdin: &SharedStdin) -> anyhow::Result<()> {
    let target_id: u64 = prompt(stdin, "target peer id").await?.parse()?;
    let file_path = prompt(stdin, "file path to send").await?;

    let target = state
        .ring
        .find_successor(state.client.as_ref(), target_id)
        .await
        .map_err(|e| anyhow::anyhow!("could not route to target: {e}"))?;

    let data = tokio::fs::read(&file_path).await?;
    let base_file_name = std::path::Path::new(&file_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("transfer.bin")
        .to_string();
    let timestamp_millis = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64;

    let me = state.ring.me().await;
    chord_core::transfer::send_file(
        &state.ring,
        state.client.as_ref(),
        state.storage.as_ref(),
        &me,
        &target,
        &base_file_name,
        &data,
        timestamp_millis,
        chord_core::DEFAULT_CHUNK_SIZE,
    )
    .await?;

    println!("sent '{base_file_name}' to id={} addr={}", target.id, target.address);
    Ok(())
}

async fn simulate_sleep(stdin: &SharedStdin, sleep_gate: &SleepGate) -> anyhow::Result<()> {
    let millis: u64 = prompt(stdin, "sleep for how many milliseconds").await?.parse()?;
    *sleep_gate.lock().await = Some(tokio::time::Instant::now() + std::time::Duration::from_millis(millis));
    println!("suspending RPC handling for {millis}ms");
    Ok(())
}
