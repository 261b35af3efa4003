mod history;
mod run;
mod watch;

use clap::{Parser, Subcommand};

use crate::state::AppState;

/// Periodic status-page watcher: snapshot, compare, notify.
#[derive(Parser, Debug)]
#[command(name = "statuswatch", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check every record once and print the per-record results.
    Run {
        /// Only check these records (repeatable). Watch-list order is kept.
        #[arg(long = "record")]
        records: Vec<String>,
    },
    /// Check on the watch-list schedule until interrupted.
    Watch,
    /// List stored snapshots for a record, newest first.
    History {
        #[arg(long)]
        record: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub async fn dispatch(state: &AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Run { records } => run::run(state, &records).await,
        Command::Watch => watch::watch(state).await,
        Command::History { record, limit } => history::history(state, &record, limit).await,
    }
}
