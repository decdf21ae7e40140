//! Startup configuration: defaults merged with environment overrides, the
//! same layering the teacher's config loader used (default, then override),
//! but sourced purely from the environment — §6 specifies an env-only
//! contract, no config file.

use std::path::PathBuf;

/// Daemon configuration, assembled once at startup.
///
/// Env vars (all optional):
/// - `BOOTSTRAP_ADDR` — host:port of an existing peer to join; empty/unset
///   means become the ring founder.
/// - `CHORD_PORT` — the port this peer binds (default 45679, reusing the
///   teacher's transport port as the reference value).
/// - `CHORD_INTERFACE` — network interface to read this peer's IPv4 address
///   from (default `eth0`).
/// - `CHORD_M` — identifier space width in bits (default 64, the widest the
///   `u64`-backed identifier space supports; set small for
///   local test rings).
/// - `CHORD_REPLICATION` — replication factor `r` (default 3).
/// - `CHORD_DATA_DIR` — base directory for the `local/`, `shared/`,
///   `assemble/`, `output/` storage roots (default `./data`).
#[derive(Debug, Clone)]
pub struct Config {
    pub bootstrap_addr: Option<String>,
    pub port: u16,
    pub interface: String,
    pub m: u32,
    pub replication_factor: usize,
    pub data_dir: PathBuf,
}

fn default_port() -> u16 {
    45679
}
fn default_interface() -> String {
    "eth0".to_string()
}
fn default_m() -> u32 {
    64
}
fn default_replication_factor() -> usize {
    3
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bootstrap_addr: None,
            port: default_port(),
            interface: default_interface(),
            m: default_m(),
            replication_factor: default_replication_factor(),
            data_dir: default_data_dir(),
        }
    }
}

/// Load config: defaults, then environment overrides.
pub fn load() -> Config {
    let mut c = Config::default();

    if let Ok(addr) = std::env::var("BOOTSTRAP_ADDR") {
        if !addr.is_empty() {
            c.bootstrap_addr = Some(addr);
        }
    }
    if let Ok(s) = std::env::var("CHORD_PORT") {
        if let Ok(p) = s.parse::<u16>() {
            c.port = p;
        }
    }
    if let Ok(s) = std::env::var("CHORD_INTERFACE") {
        if !s.is_empty() {
            c.interface = s;
        }
    }
    if let Ok(s) = std::env::var("CHORD_M") {
        if let Ok(m) = s.parse::<u32>() {
            c.m = m;
        }
    }
    if let Ok(s) = std::env::var("CHORD_REPLICATION") {
        if let Ok(r) = s.parse::<usize>() {
            c.replication_factor = r;
        }
    }
    if let Ok(s) = std::env::var("CHORD_DATA_DIR") {
        if !s.is_empty() {
            c.data_dir = PathBuf::from(s);
        }
    }
    c
}
