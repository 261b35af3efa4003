use anyhow::{Context, Result};
use tracing::info;

use crate::state::AppState;
use crate::watcher::{Outcome, RecordResult};

/// One pass over the selected records.
pub async fn run(state: &AppState, only: &[String]) -> Result<()> {
    let list = state.watch_list()?;
    let records = list.select(only)?;
    info!(records = records.len(), "Run started");

    let results = state
        .watcher
        .run_all(&records, state.config.record_delay)
        .await?;

    print_results(&results)
}

/// Result surface: one JSON object per record, in input order.
pub(crate) fn print_results(results: &[RecordResult]) -> Result<()> {
    for result in results {
        let line = serde_json::to_string(result).context("serialize run result")?;
        println!("{line}");
    }
    let failed = results
        .iter()
        .filter(|r| r.outcome == Outcome::Error)
        .count();
    info!(total = results.len(), failed, "Run complete");
    Ok(())
}
