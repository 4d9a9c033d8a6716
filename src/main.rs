use clap::Parser;
use tracing_subscriber::EnvFilter;

use glint::cli::{self, Args};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GLINT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(err) = cli::run(args).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
