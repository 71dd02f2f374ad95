//! Interface between the pipeline and the external `git` tool.
//!
//! The pipeline never touches the repository directly: every read and write
//! goes through [`GitRunner`]. The trait is annotated for `mockall` so the
//! collector and publisher can be unit-tested against canned command output
//! without a real repository.

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Failure of a single external `git` invocation.
///
/// `CommandFailed` is a normal, recoverable outcome at probe call sites
/// (branch existence, marker lookup); everywhere else callers propagate it
/// and the run aborts at the top-level boundary.
#[derive(Debug)]
pub enum GitError {
    /// The `git` process could not be started at all.
    Spawn {
        args: Vec<String>,
        source: std::io::Error,
    },
    /// The command ran and exited non-zero.
    CommandFailed {
        args: Vec<String>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        code: Option<i32>,
    },
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::Spawn { args, source } => {
                write!(f, "failed to spawn `git {}`: {}", args.join(" "), source)
            }
            GitError::CommandFailed { args, stderr, code, .. } => {
                write!(
                    f,
                    "`git {}` exited with {:?}: {}",
                    args.join(" "),
                    code,
                    String::from_utf8_lossy(stderr).trim()
                )
            }
        }
    }
}

impl std::error::Error for GitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GitError::Spawn { source, .. } => Some(source),
            GitError::CommandFailed { .. } => None,
        }
    }
}

/// Executes one `git` subcommand and returns its trimmed stdout bytes.
///
/// Implemented by the real [`GitGateway`](crate::git::GitGateway) and by
/// test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run `git <args>`, capturing stdout and stderr. Returns stdout with
    /// leading/trailing ASCII whitespace stripped, or a [`GitError`] on any
    /// failure. Never terminates the process.
    async fn run(&self, args: Vec<String>) -> Result<Vec<u8>, GitError>;
}

/// Builds an owned argument vector for [`GitRunner::run`].
pub fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
