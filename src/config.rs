use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Settings for one publish run. Every field has a default, so a missing
/// config file or a partial one is fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Repository to operate in; the gateway's working directory.
    pub repo_dir: PathBuf,
    /// Orphan branch the snapshots are published to.
    pub branch: String,
    /// Remote the branch is pushed to and whose ref is probed for the marker.
    pub remote: String,
    /// Deterministic commit identity for the publish commit.
    pub user_name: String,
    pub user_email: String,
    /// Maximum per-file history queries in flight at once.
    pub history_concurrency: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            repo_dir: PathBuf::from("."),
            branch: "worktree".to_string(),
            remote: "origin".to_string(),
            user_name: "GitHub Actions".to_string(),
            user_email: "action@github.com".to_string(),
            history_concurrency: 8,
        }
    }
}

impl PublishConfig {
    pub fn trace_loaded(&self) {
        info!(
            repo_dir = %self.repo_dir.display(),
            branch = %self.branch,
            remote = %self.remote,
            history_concurrency = self.history_concurrency,
            "Loaded PublishConfig"
        );
        debug!(?self, "PublishConfig loaded (full debug)");
    }
}
