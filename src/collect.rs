//! Tree metadata collector: turns a commit into a [`Snapshot`].
//!
//! One `ls-tree` enumerates every path with its blob size, then one
//! `git log -1` per path resolves the most recent commit touching it. The
//! per-path lookups are independent, so they fan out with bounded
//! concurrency; results merge order-independently into the snapshot map.

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::contract::{argv, GitError, GitRunner};
use crate::path_codec::{self, PathCodecError};
use crate::snapshot::{FileRecord, Snapshot};

/// Any collection failure is fatal: a partial snapshot must never be
/// published.
#[derive(Debug)]
pub enum CollectError {
    Git(GitError),
    MalformedPath(PathCodecError),
    /// A tree-listed path yielded no history result. Every tracked file has
    /// at least the commit that added it, so this means the tree and the
    /// history disagree; no default record is invented.
    MissingHistory { path: String },
    /// A listing or history record did not match the expected wire shape.
    /// Also covers gitlink (submodule) entries, whose `%(objectsize)` is `-`
    /// rather than a blob size.
    BadOutput {
        what: &'static str,
        raw: Vec<u8>,
    },
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Git(e) => write!(f, "git command failed during collection: {e}"),
            CollectError::MalformedPath(e) => write!(f, "invalid git ls-tree output: {e}"),
            CollectError::MissingHistory { path } => {
                write!(f, "no history record for tree-listed path `{path}`")
            }
            CollectError::BadOutput { what, raw } => write!(
                f,
                "unexpected {what} in git output: `{}`",
                String::from_utf8_lossy(raw)
            ),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Git(e) => Some(e),
            CollectError::MalformedPath(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GitError> for CollectError {
    fn from(e: GitError) -> Self {
        CollectError::Git(e)
    }
}

impl From<PathCodecError> for CollectError {
    fn from(e: PathCodecError) -> Self {
        CollectError::MalformedPath(e)
    }
}

/// Collects the full snapshot for `commit`, with at most `concurrency`
/// history queries in flight at once.
pub async fn collect<R: GitRunner + ?Sized>(
    runner: &R,
    commit: &str,
    concurrency: usize,
) -> Result<Snapshot, CollectError> {
    // Warm the commit-graph so the per-file log queries below are fast.
    runner
        .run(argv(&["commit-graph", "write", "--reachable"]))
        .await?;

    let listing = runner
        .run(argv(&[
            "ls-tree",
            "-r",
            commit,
            "--format=%(objectsize)%x00%(path)",
        ]))
        .await?;

    let mut sized_paths: Vec<(String, u64)> = Vec::new();
    for line in listing.split(|&b| b == b'\n').filter(|l| !l.is_empty()) {
        let nul = line
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| CollectError::BadOutput {
                what: "ls-tree record",
                raw: line.to_vec(),
            })?;
        let size_raw = &line[..nul];
        if size_raw == b"-" {
            // Gitlinks have no blob: %(objectsize) prints `-` for them.
            return Err(CollectError::BadOutput {
                what: "gitlink (submodule) entry",
                raw: line.to_vec(),
            });
        }
        let size = parse_int::<u64>(size_raw, "blob size")?;
        let path = path_codec::decode(&line[nul + 1..])?;
        sized_paths.push((path, size));
    }
    info!(commit, files = sized_paths.len(), "Tree listed");

    let lookups = sized_paths.into_iter().map(|(path, size)| async move {
        let record = latest_commit_for(runner, commit, &path).await?;
        debug!(path = %path, hash = %record.1, "Resolved last-modifying commit");
        Ok::<_, CollectError>((
            path,
            FileRecord {
                size,
                time: record.0,
                hash: record.1,
            },
        ))
    });

    let records: Vec<(String, FileRecord)> = stream::iter(lookups)
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;

    let snapshot: Snapshot = records.into_iter().collect();
    info!(commit, entries = snapshot.len(), "Snapshot collected");
    Ok(snapshot)
}

/// Timestamp and full hash of the most recent commit touching `path`,
/// reachable from `commit`.
async fn latest_commit_for<R: GitRunner + ?Sized>(
    runner: &R,
    commit: &str,
    path: &str,
) -> Result<(i64, String), CollectError> {
    let output = runner
        .run(argv(&[
            "log",
            "-1",
            "--format=%cd%x00%H",
            "--date=unix",
            commit,
            "--",
            path,
        ]))
        .await?;

    if output.is_empty() {
        return Err(CollectError::MissingHistory {
            path: path.to_string(),
        });
    }

    let nul = output
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| CollectError::BadOutput {
            what: "history record",
            raw: output.clone(),
        })?;
    let time = parse_int::<i64>(&output[..nul], "commit timestamp")?;
    let hash = std::str::from_utf8(&output[nul + 1..])
        .map_err(|_| CollectError::BadOutput {
            what: "commit hash",
            raw: output.clone(),
        })?
        .to_string();
    Ok((time, hash))
}

fn parse_int<T: std::str::FromStr>(
    raw: &[u8],
    what: &'static str,
) -> Result<T, CollectError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| CollectError::BadOutput {
            what,
            raw: raw.to_vec(),
        })
}
