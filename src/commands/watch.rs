use anyhow::Result;
use chrono::Local;
use tracing::{info, warn};

use super::run::print_results;
use crate::config::WatchList;
use crate::state::AppState;

/// Run a pass, sleep until the next scheduled time, repeat.
pub async fn watch(state: &AppState) -> Result<()> {
    // Startup must see a valid list; later reload failures keep the last one.
    let mut list = state.watch_list()?;
    loop {
        let records = list.select(&[])?;

        match state
            .watcher
            .run_all(&records, state.config.record_delay)
            .await
        {
            Ok(results) => print_results(&results)?,
            Err(rejected) => warn!("Skipping scheduled pass: {}", rejected),
        }

        let now = Local::now().naive_local();
        let Some(next) = list.schedule.next_run_after(now) else {
            warn!("Schedule has no upcoming run; stopping");
            return Ok(());
        };
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next = %next, wait_secs = wait.as_secs(), "Next pass scheduled");
        tokio::time::sleep(wait).await;

        // Reloaded every pass so edits to the watch list take effect.
        list = refresh(list, state.watch_list());
    }
}

fn refresh(current: WatchList, reloaded: Result<WatchList>) -> WatchList {
    match reloaded {
        Ok(list) => list,
        Err(e) => {
            warn!(
                records = current.records.len(),
                "Watch list reload failed, keeping previous list: {:#}", e
            );
            current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordConfig;
    use crate::schedule::Schedule;

    fn list(ids: &[&str]) -> WatchList {
        WatchList {
            schedule: Schedule::default(),
            records: ids
                .iter()
                .map(|id| RecordConfig {
                    id: id.to_string(),
                    url: format!("https://example.test/{id}"),
                    selector: None,
                    identity_selector: None,
                    label: None,
                })
                .collect(),
        }
    }

    #[test]
    fn broken_reload_keeps_previous_list() {
        let kept = refresh(list(&["a", "b"]), Err(anyhow::anyhow!("bad json")));
        assert_eq!(kept, list(&["a", "b"]));

        let replaced = refresh(kept, Ok(list(&["c"])));
        assert_eq!(replaced, list(&["c"]));
    }
}
