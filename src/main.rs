use clap::Parser;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = worktree_info::Cli::parse();
    if let Err(e) = worktree_info::run(cli).await {
        tracing::error!(error = ?e, "Run failed");
        eprintln!("[ERROR] {e:#}");
        std::process::exit(1);
    }
}
