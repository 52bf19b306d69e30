use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

use cli::{Cli, Commands};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match &cli.command {
        Commands::Scan(args) => cli::run_scan(&cli, args).await,
        Commands::Propose(args) => cli::run_propose(&cli, args).await,
        Commands::Watch(args) => cli::run_watch(&cli, args).await,
        Commands::Monitor(args) => cli::run_monitor(&cli, args).await,
    }
}
