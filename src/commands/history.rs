use anyhow::Result;

use crate::state::AppState;

/// Print stored snapshot entries for a record, newest first.
pub async fn history(state: &AppState, record: &str, limit: usize) -> Result<()> {
    let store = state.watcher.store();
    let entries = store.history(record).await?;

    if entries.is_empty() {
        println!("No snapshots stored for `{record}` yet.");
        return Ok(());
    }

    println!("Snapshots for `{}` ({} total)", record, entries.len());
    for entry in entries.iter().rev().take(limit) {
        println!(
            "  {}  {}  {}",
            entry.captured_at.to_rfc3339(),
            entry.record_id,
            entry.path.display()
        );
    }
    Ok(())
}
