//! Chunk splitting and naming (§4.6). Pure: takes file bytes, returns planned
//! chunks with their keys and names; I/O (writing to the local staging
//! directory) is the caller's job via the `Storage` trait.

use crate::identifier::{hash, Identifier};

/// Reference chunk size from the original source (`chunkSize := 1024`).
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// One chunk ready to be staged: its placement key, its on-disk name, and
/// its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChunk {
    pub key: Identifier,
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Split `data` into fixed-size blocks named
/// `"<base>-chunk-<idx>-<origin_id>-<timestamp><ext>"`, each keyed by
/// `hash(name)`. `idx` is 1-based, matching the original source. `timestamp`
/// is sanitized (no `:`) so the name is valid on every target filesystem —
/// the original source did not sanitize this and could produce colon-bearing
/// names that fail to write on some platforms.
pub fn plan_chunks(
    data: &[u8],
    base_file_name: &str,
    origin_id: Identifier,
    timestamp_millis: u64,
    chunk_size: usize,
    m: u32,
) -> Vec<PlannedChunk> {
    let chunk_size = if chunk_size == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        chunk_size
    };
    let (base, ext) = split_base_ext(base_file_name);
    let timestamp = sanitize_timestamp(timestamp_millis);

    data.chunks(chunk_size)
        .enumerate()
        .map(|(i, block)| {
            let idx = i + 1;
            let name = format!("{base}-chunk-{idx}-{origin_id}-{timestamp}{ext}");
            let key = hash(&name, m);
            PlannedChunk {
                key,
                name,
                bytes: block.to_vec(),
            }
        })
        .collect()
}

/// Split `"name.ext"` into `("name", ".ext")`. Files without an extension, and
/// dotfiles, return an empty `ext`.
pub fn split_base_ext(file_name: &str) -> (String, String) {
    match file_name.rfind('.') {
        Some(0) => (file_name.to_string(), String::new()),
        Some(i) => (file_name[..i].to_string(), file_name[i..].to_string()),
        None => (file_name.to_string(), String::new()),
    }
}

/// Filesystem-safe rendering of a millisecond timestamp: decimal digits only.
fn sanitize_timestamp(timestamp_millis: u64) -> String {
    timestamp_millis.to_string()
}

/// Derive the assembled output file's name from one chunk's name and the
/// origin peer id: `"<base>_from_<origin_id><ext>"`. Looks for the last
/// `-chunk-` marker rather than assuming a fixed position.
pub fn output_file_name(chunk_name: &str, origin_peer_id: Identifier) -> Option<String> {
    let marker = "-chunk-";
    let pos = chunk_name.find(marker)?;
    let base = &chunk_name[..pos];
    let ext_start = chunk_name.rfind('.').filter(|&i| i > pos);
    let ext = ext_start.map(|i| &chunk_name[i..]).unwrap_or("");
    Some(format!("{base}_from_{origin_peer_id}{ext}"))
}
