//! End-to-end tests against real throwaway repositories with a bare origin.

use std::path::{Path, PathBuf};
use std::process::Command;

use worktree_info::config::PublishConfig;
use worktree_info::git::GitGateway;
use worktree_info::publish::{publish, PublishOutcome};
use worktree_info::snapshot::Snapshot;

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git binary is available");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn commit_file(repo: &Path, name: &str, content: &[u8], message: &str) {
    std::fs::write(repo.join(name), content).expect("write file");
    git(repo, &["add", name]);
    git(repo, &["commit", "-m", message]);
}

/// Bare origin plus a working clone wired to it, with deterministic identity.
fn setup_repo(root: &Path) -> (PathBuf, PathBuf) {
    let origin = root.join("origin.git");
    let repo = root.join("repo");
    git(root, &["init", "--bare", "origin.git"]);
    git(root, &["init", "repo"]);
    git(repo.as_path(), &["config", "user.email", "dev@example.com"]);
    git(repo.as_path(), &["config", "user.name", "Dev"]);
    git(repo.as_path(), &["config", "commit.gpgsign", "false"]);
    git(repo.as_path(), &["config", "core.quotepath", "true"]);
    git(
        repo.as_path(),
        &["remote", "add", "origin", origin.to_str().expect("utf-8 path")],
    );
    (origin, repo)
}

fn config_for(repo: &Path) -> PublishConfig {
    PublishConfig {
        repo_dir: repo.to_path_buf(),
        ..PublishConfig::default()
    }
}

fn read_snapshot(path: &Path) -> Snapshot {
    let raw = std::fs::read_to_string(path).expect("snapshot file exists");
    serde_json::from_str(&raw).expect("snapshot parses")
}

#[tokio::test]
async fn publish_then_rerun_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let (origin, repo) = setup_repo(tmp.path());

    commit_file(&repo, "a.txt", b"hello", "add a");
    let a_commit = git(&repo, &["rev-parse", "HEAD"]);
    commit_file(&repo, "b.txt", b"0123456789", "add b");
    let b_commit = git(&repo, &["rev-parse", "HEAD"]);
    let source_branch = git(&repo, &["rev-parse", "--abbrev-ref", "HEAD"]);

    let gateway = GitGateway::new(&repo);
    let config = config_for(&repo);

    let outcome = publish(&gateway, &config).await.unwrap();
    assert_eq!(
        outcome,
        PublishOutcome::Published {
            source_commit: b_commit.clone()
        }
    );

    // Exactly one commit on the worktree branch, carrying the marker.
    assert_eq!(git(&repo, &["rev-list", "--count", "worktree"]), "1");
    let message = git(&repo, &["log", "-1", "--format=%s", "worktree"]);
    assert_eq!(message, format!("update worktree info for <|{b_commit}|>"));

    // The branch made it to the origin as well.
    assert_eq!(git(&origin, &["rev-list", "--count", "worktree"]), "1");

    // Both destination files exist and carry identical content.
    let latest = std::fs::read(repo.join("worktree.json")).unwrap();
    let history = std::fs::read(repo.join("history").join(format!("{b_commit}.json"))).unwrap();
    assert_eq!(latest, history);

    let snapshot = read_snapshot(&repo.join("worktree.json"));
    assert_eq!(snapshot.len(), 2);
    let a = &snapshot["a.txt"];
    assert_eq!(a.size, 5);
    assert_eq!(a.hash, a_commit);
    let b = &snapshot["b.txt"];
    assert_eq!(b.size, 10);
    assert_eq!(b.hash, b_commit);
    assert!(a.time <= b.time);

    // A fresh run from the source branch finds the marker and does nothing.
    git(&repo, &["checkout", &source_branch]);
    let outcome = publish(&gateway, &config).await.unwrap();
    assert_eq!(
        outcome,
        PublishOutcome::UpToDate {
            source_commit: b_commit
        }
    );
    assert_eq!(git(&repo, &["rev-list", "--count", "worktree"]), "1");
    assert_eq!(git(&origin, &["rev-list", "--count", "worktree"]), "1");
}

#[tokio::test]
async fn stale_marker_triggers_a_second_publish() {
    let tmp = tempfile::tempdir().unwrap();
    let (origin, repo) = setup_repo(tmp.path());

    commit_file(&repo, "a.txt", b"one", "add a");
    let first_commit = git(&repo, &["rev-parse", "HEAD"]);
    let source_branch = git(&repo, &["rev-parse", "--abbrev-ref", "HEAD"]);

    let gateway = GitGateway::new(&repo);
    let config = config_for(&repo);
    publish(&gateway, &config).await.unwrap();

    // New source commit invalidates the marker.
    git(&repo, &["checkout", &source_branch]);
    commit_file(&repo, "a.txt", b"two!", "change a");
    let second_commit = git(&repo, &["rev-parse", "HEAD"]);

    let outcome = publish(&gateway, &config).await.unwrap();
    assert_eq!(
        outcome,
        PublishOutcome::Published {
            source_commit: second_commit.clone()
        }
    );

    assert_eq!(git(&origin, &["rev-list", "--count", "worktree"]), "2");

    // The audit trail keeps one file per published source commit.
    let history_dir = repo.join("history");
    assert!(history_dir.join(format!("{first_commit}.json")).exists());
    assert!(history_dir.join(format!("{second_commit}.json")).exists());

    let snapshot = read_snapshot(&repo.join("worktree.json"));
    assert_eq!(snapshot["a.txt"].size, 4);
    assert_eq!(snapshot["a.txt"].hash, second_commit);
}

#[tokio::test]
async fn republishing_after_a_revert_keeps_history_files_immutable() {
    let tmp = tempfile::tempdir().unwrap();
    let (origin, repo) = setup_repo(tmp.path());

    commit_file(&repo, "a.txt", b"one", "add a");
    let commit_a = git(&repo, &["rev-parse", "HEAD"]);
    let source_branch = git(&repo, &["rev-parse", "--abbrev-ref", "HEAD"]);

    let gateway = GitGateway::new(&repo);
    let config = config_for(&repo);
    publish(&gateway, &config).await.unwrap();

    let history_a = repo.join("history").join(format!("{commit_a}.json"));
    let a_bytes = std::fs::read(&history_a).unwrap();
    assert_eq!(std::fs::read(repo.join("worktree.json")).unwrap(), a_bytes);

    // Move the source branch forward and publish the new commit.
    git(&repo, &["checkout", &source_branch]);
    commit_file(&repo, "a.txt", b"two!", "change a");
    publish(&gateway, &config).await.unwrap();

    // Revert the source branch to A and publish once more.
    git(&repo, &["checkout", &source_branch]);
    git(&repo, &["reset", "--hard", &commit_a]);
    let outcome = publish(&gateway, &config).await.unwrap();
    assert_eq!(
        outcome,
        PublishOutcome::Published {
            source_commit: commit_a.clone()
        }
    );

    // The tree at A is unchanged, so its serialization is byte-identical:
    // the audit trail entry stays as written and the latest view reverts
    // to A's snapshot.
    assert_eq!(std::fs::read(&history_a).unwrap(), a_bytes);
    assert_eq!(std::fs::read(repo.join("worktree.json")).unwrap(), a_bytes);
    assert_eq!(git(&origin, &["rev-list", "--count", "worktree"]), "3");
}

#[tokio::test]
async fn non_ascii_paths_survive_the_codec_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let (_origin, repo) = setup_repo(tmp.path());

    commit_file(&repo, "caf\u{e9}.txt", b"abc", "add accented file");
    let head = git(&repo, &["rev-parse", "HEAD"]);

    let gateway = GitGateway::new(&repo);
    let snapshot = worktree_info::collect::collect(&gateway, &head, 4)
        .await
        .unwrap();

    // core.quotepath makes ls-tree emit the octal-escaped form; the decoded
    // snapshot key must be the real path.
    let record = &snapshot["caf\u{e9}.txt"];
    assert_eq!(record.size, 3);
    assert_eq!(record.hash, head);
}
