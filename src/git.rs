use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::contract::{GitError, GitRunner};

/// Concrete [`GitRunner`] backed by the `git` binary.
///
/// Carries the working directory so a run can target any repository (the
/// integration tests point it at throwaway repos under a tempdir).
pub struct GitGateway {
    cwd: PathBuf,
}

impl GitGateway {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }
}

#[async_trait]
impl GitRunner for GitGateway {
    async fn run(&self, args: Vec<String>) -> Result<Vec<u8>, GitError> {
        debug!(args = ?args, cwd = %self.cwd.display(), "Running git command");

        let output = Command::new("git")
            .args(&args)
            .current_dir(&self.cwd)
            .output()
            .await
            .map_err(|e| {
                warn!(args = ?args, error = ?e, "Failed to launch git process");
                GitError::Spawn {
                    args: args.clone(),
                    source: e,
                }
            })?;

        if !output.status.success() {
            warn!(
                args = ?args,
                stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                code = ?output.status.code(),
                "Git command exited non-zero"
            );
            return Err(GitError::CommandFailed {
                args,
                stdout: output.stdout,
                stderr: output.stderr,
                code: output.status.code(),
            });
        }

        Ok(trim_ascii_whitespace(&output.stdout).to_vec())
    }
}

/// Strips leading and trailing ASCII whitespace, matching the stdout
/// normalisation every caller expects.
fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::trim_ascii_whitespace;

    #[test]
    fn trims_trailing_newline_and_leading_spaces() {
        assert_eq!(trim_ascii_whitespace(b"  abc\n"), b"abc");
        assert_eq!(trim_ascii_whitespace(b"abc"), b"abc");
        assert_eq!(trim_ascii_whitespace(b"\n\t \n"), b"");
        assert_eq!(trim_ascii_whitespace(b""), b"");
    }

    #[test]
    fn preserves_interior_whitespace() {
        assert_eq!(trim_ascii_whitespace(b"a\0b c\n"), b"a\0b c");
    }
}
