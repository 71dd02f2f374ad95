//! Snapshot data model and JSON store.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Per-file metadata at the source commit. `time` and `hash` always come from
/// the same history query: they describe one commit, never two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileRecord {
    /// Byte length of the blob.
    pub size: u64,
    /// Unix timestamp of the most recent commit touching the path.
    pub time: i64,
    /// Full hex id of that commit.
    pub hash: String,
}

/// Complete per-path metadata for one source commit. A `BTreeMap` keeps the
/// serialized key order stable so published JSON diffs cleanly.
pub type Snapshot = BTreeMap<String, FileRecord>;

/// Writes a snapshot as pretty-printed JSON, creating parent directories as
/// needed. Output is UTF-8 with `\n` newlines and a trailing newline.
pub fn save(path: &Path, snapshot: &Snapshot) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut json = serde_json::to_string_pretty(snapshot)?;
    json.push('\n');
    fs::write(path, json)?;
    info!(path = %path.display(), entries = snapshot.len(), "Snapshot saved");
    Ok(())
}
