mod commands;
mod config;
mod diff;
mod error;
mod notify;
mod report;
mod schedule;
mod snapshot;
mod state;
mod watcher;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use commands::Cli;
use config::WatchConfig;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load env
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("STATUSWATCH_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = WatchConfig::from_env()?;
    info!(
        records = %config.records_path.display(),
        data_dir = %config.data_dir.display(),
        "Configuration loaded"
    );

    let state = AppState::init(config).await?;
    commands::dispatch(&state, cli.command).await
}
