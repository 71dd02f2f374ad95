//! Publish state machine: decides whether a fresh snapshot is needed and, if
//! so, collects it, switches to the worktree branch, writes both store files
//! and commits/pushes them.
//!
//! The ordering invariant that makes the destructive branch switch safe:
//! collection always completes in memory from the source state before the
//! working tree is touched. A failed run therefore leaves the target branch
//! exactly as it was.

use std::sync::LazyLock;

use regex::bytes::Regex;
use tracing::{debug, info};

use crate::collect::{self, CollectError};
use crate::config::PublishConfig;
use crate::contract::{argv, GitError, GitRunner};
use crate::snapshot;

/// Rolling latest view, overwritten on every publish.
pub const LATEST_FILE: &str = "worktree.json";
/// Append-only audit trail, one file per published source commit.
pub const HISTORY_DIR: &str = "history";

// The marker token wrapping a source commit hash in the published commit
// message, e.g. `update worktree info for <|3f2c...|>`.
static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\|([0-9a-z]+)\|>").expect("marker pattern compiles"));

#[derive(Debug)]
pub enum PublishError {
    Git(GitError),
    Collect(CollectError),
    Store(std::io::Error),
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Git(e) => write!(f, "git command failed during publish: {e}"),
            PublishError::Collect(e) => write!(f, "snapshot collection failed: {e}"),
            PublishError::Store(e) => write!(f, "failed to write snapshot file: {e}"),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::Git(e) => Some(e),
            PublishError::Collect(e) => Some(e),
            PublishError::Store(e) => Some(e),
        }
    }
}

impl From<GitError> for PublishError {
    fn from(e: GitError) -> Self {
        PublishError::Git(e)
    }
}

impl From<CollectError> for PublishError {
    fn from(e: CollectError) -> Self {
        PublishError::Collect(e)
    }
}

impl From<std::io::Error> for PublishError {
    fn from(e: std::io::Error) -> Self {
        PublishError::Store(e)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The target branch already carries a marker for this source commit; no
    /// mutation was performed.
    UpToDate { source_commit: String },
    Published { source_commit: String },
}

/// Runs the full pipeline. Re-running against an unchanged source commit is a
/// no-op ending in [`PublishOutcome::UpToDate`].
pub async fn publish<R: GitRunner + ?Sized>(
    runner: &R,
    config: &PublishConfig,
) -> Result<PublishOutcome, PublishError> {
    let source_commit = resolve_head(runner).await?;
    debug!(source_commit = %source_commit, "Resolved source commit");

    if let Some(published) = last_published_target(runner, config).await? {
        if published == source_commit {
            info!(
                branch = %config.branch,
                source_commit = %source_commit,
                "Worktree branch is up-to-date, nothing to do"
            );
            return Ok(PublishOutcome::UpToDate { source_commit });
        }
        info!(
            published = %published,
            source_commit = %source_commit,
            "Published marker is stale, collecting fresh snapshot"
        );
    }

    // Collect fully in memory before any branch mutation.
    let snapshot = collect::collect(runner, &source_commit, config.history_concurrency).await?;

    checkout_or_create_branch(runner, config).await?;

    snapshot::save(&config.repo_dir.join(LATEST_FILE), &snapshot)?;
    snapshot::save(
        &config
            .repo_dir
            .join(HISTORY_DIR)
            .join(format!("{source_commit}.json")),
        &snapshot,
    )?;

    commit_and_push(runner, config, &source_commit).await?;
    info!(
        branch = %config.branch,
        source_commit = %source_commit,
        "Worktree info collected and published"
    );
    Ok(PublishOutcome::Published { source_commit })
}

/// Resolves the current commit the snapshot will be derived from.
pub async fn resolve_head<R: GitRunner + ?Sized>(runner: &R) -> Result<String, PublishError> {
    let out = runner.run(argv(&["rev-parse", "HEAD"])).await?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Source commit hash recorded by the latest publish, if any. A failed probe
/// (branch or remote ref does not exist yet) means "no marker", not an error.
async fn last_published_target<R: GitRunner + ?Sized>(
    runner: &R,
    config: &PublishConfig,
) -> Result<Option<String>, PublishError> {
    let refname = format!("{}/{}", config.remote, config.branch);
    let message = match runner
        .run(argv(&["log", "-1", "--oneline", &refname, "--"]))
        .await
    {
        Ok(out) => out,
        Err(GitError::CommandFailed { .. }) => {
            info!(branch = %config.branch, "Worktree branch has no published commit yet");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    debug!(message = %String::from_utf8_lossy(&message), "Last published commit message");
    Ok(extract_marker(&message))
}

/// Extracts the marker hash from a commit message. Anything other than
/// exactly one match means the message carries no usable marker.
fn extract_marker(message: &[u8]) -> Option<String> {
    let mut matches = MARKER.captures_iter(message);
    let first = matches.next()?;
    if matches.next().is_some() {
        info!("Last commit message contains more than one marker token, ignoring");
        return None;
    }
    // [0-9a-z]+ is ASCII by construction.
    Some(String::from_utf8_lossy(&first[1]).into_owned())
}

/// Checks out the target branch, creating it as an empty orphan when it does
/// not exist. The `git rm -rf .` clears tracked content from the fresh orphan
/// so only snapshot files land in the published tree.
async fn checkout_or_create_branch<R: GitRunner + ?Sized>(
    runner: &R,
    config: &PublishConfig,
) -> Result<(), PublishError> {
    match runner.run(argv(&["checkout", &config.branch])).await {
        Ok(_) => {
            info!(branch = %config.branch, "Switched to existing worktree branch");
            Ok(())
        }
        Err(GitError::CommandFailed { .. }) => {
            info!(branch = %config.branch, "Creating new empty orphan worktree branch");
            runner
                .run(argv(&["checkout", "--orphan", &config.branch]))
                .await?;
            runner.run(argv(&["rm", "-rf", "."])).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn commit_and_push<R: GitRunner + ?Sized>(
    runner: &R,
    config: &PublishConfig,
    source_commit: &str,
) -> Result<(), PublishError> {
    runner
        .run(argv(&["config", "--local", "user.email", &config.user_email]))
        .await?;
    runner
        .run(argv(&["config", "--local", "user.name", &config.user_name]))
        .await?;

    runner
        .run(argv(&["add", LATEST_FILE, HISTORY_DIR]))
        .await?;
    let message = format!("update worktree info for <|{source_commit}|>");
    runner.run(argv(&["commit", "-m", &message])).await?;
    runner
        .run(argv(&[
            "push",
            "--set-upstream",
            &config.remote,
            &config.branch,
        ]))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{extract_marker, publish, PublishOutcome};
    use crate::config::PublishConfig;
    use crate::contract::MockGitRunner;

    #[test]
    fn marker_extracts_single_delimited_hash() {
        assert_eq!(
            extract_marker(b"1a2b3c4 update worktree info for <|deadbeef01|>"),
            Some("deadbeef01".to_string())
        );
    }

    #[test]
    fn marker_absent_or_ambiguous_yields_none() {
        assert_eq!(extract_marker(b"initial commit"), None);
        assert_eq!(extract_marker(b"<|aaa|> and <|bbb|>"), None);
        // Delimiters without content do not match.
        assert_eq!(extract_marker(b"<||>"), None);
    }

    #[tokio::test]
    async fn matching_marker_short_circuits_to_up_to_date() {
        let mut mock = MockGitRunner::new();
        mock.expect_run()
            .withf(|args| args.first().map(String::as_str) == Some("rev-parse"))
            .returning(|_| Ok(b"abc123".to_vec()));
        mock.expect_run()
            .withf(|args| args.first().map(String::as_str) == Some("log"))
            .returning(|_| Ok(b"f00 update worktree info for <|abc123|>".to_vec()));
        // No further expectations: any collect/checkout/commit call would
        // panic the mock.

        let config = PublishConfig::default();
        let outcome = publish(&mock, &config).await.unwrap();
        assert_eq!(
            outcome,
            PublishOutcome::UpToDate {
                source_commit: "abc123".to_string()
            }
        );
    }
}
