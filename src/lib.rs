pub mod collect;
pub mod config;
pub mod contract;
pub mod git;
pub mod load_config;
pub mod path_codec;
pub mod publish;
pub mod snapshot;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use git::GitGateway;
use load_config::load_config;
use publish::PublishOutcome;

/// CLI for worktree-info: collect per-file git metadata and publish JSON
/// snapshots to a dedicated worktree branch.
#[derive(Parser)]
#[clap(
    name = "worktree-info",
    version,
    about = "Collect per-file git metadata and publish it as JSON snapshots to a worktree branch"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect metadata for HEAD and publish it to the worktree branch
    /// (no-op when the branch already records this commit)
    Publish {
        /// Path to the YAML config file; defaults apply when omitted
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Collect metadata for HEAD and print the snapshot JSON to stdout
    /// without touching any branch
    Collect {
        /// Path to the YAML config file; defaults apply when omitted
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Publish { config } => {
            let config = load_config(config.as_deref())?;
            let gateway = GitGateway::new(&config.repo_dir);
            match publish::publish(&gateway, &config).await? {
                PublishOutcome::UpToDate { source_commit } => {
                    println!("Worktree branch `{}` already up to date for {source_commit}.", config.branch);
                }
                PublishOutcome::Published { source_commit } => {
                    println!("Published worktree info for {source_commit} to branch `{}`.", config.branch);
                }
            }
            Ok(())
        }
        Commands::Collect { config } => {
            let config = load_config(config.as_deref())?;
            let gateway = GitGateway::new(&config.repo_dir);
            let head = publish::resolve_head(&gateway).await?;
            let snapshot = collect::collect(&gateway, &head, config.history_concurrency).await?;
            let mut json = serde_json::to_string_pretty(&snapshot)?;
            json.push('\n');
            print!("{json}");
            Ok(())
        }
    }
}
