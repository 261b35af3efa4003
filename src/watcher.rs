use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::RecordConfig;
use crate::diff::{diff, ChangeCategory};
use crate::error::WatchError;
use crate::notify::{Notice, Notifier, Report};
use crate::report::{detailed_report, error_report, summary_message};
use crate::snapshot::extract::PageFetcher;
use crate::snapshot::types::Snapshot;
use crate::snapshot::SnapshotStore;

/// Where a single record's run is. `Error` absorbs from any step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Fetching,
    Comparing,
    Reporting,
    Done,
    Error,
}

/// What a successful run found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Baseline,
    Unchanged,
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

/// Per-record entry of a run, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResult {
    pub record_id: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<RunKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<ChangeCategory>,
}

impl RecordResult {
    fn success(record_id: &str, kind: RunKind, categories: Vec<ChangeCategory>) -> Self {
        Self {
            record_id: record_id.to_string(),
            outcome: Outcome::Success,
            error: None,
            change: Some(kind),
            categories,
        }
    }

    fn failure(record_id: &str, message: String) -> Self {
        Self {
            record_id: record_id.to_string(),
            outcome: Outcome::Error,
            error: Some(message),
            change: None,
            categories: Vec::new(),
        }
    }
}

/// An invocation refused by the run-state guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunRejected {
    AlreadyRunning,
}

impl fmt::Display for RunRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "a watch run is already in progress"),
        }
    }
}

impl std::error::Error for RunRejected {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatcherState {
    Idle,
    Running,
}

/// Resets the watcher to `Idle` when the run ends, however it ends.
struct RunGuard<'a> {
    state: &'a Mutex<WatcherState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = WatcherState::Idle;
    }
}

/// Ties fetch, store, diff and notify together for each record.
pub struct Watcher<F, N>
where
    F: PageFetcher,
    N: Notifier,
{
    store: Arc<SnapshotStore>,
    fetcher: F,
    notifier: N,
    state: Mutex<WatcherState>,
}

impl<F, N> Watcher<F, N>
where
    F: PageFetcher,
    N: Notifier,
{
    pub fn new(store: Arc<SnapshotStore>, fetcher: F, notifier: N) -> Self {
        Self {
            store,
            fetcher,
            notifier,
            state: Mutex::new(WatcherState::Idle),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    fn begin(&self) -> Result<RunGuard<'_>, RunRejected> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == WatcherState::Running {
            return Err(RunRejected::AlreadyRunning);
        }
        *state = WatcherState::Running;
        Ok(RunGuard { state: &self.state })
    }

    /// Check one record. Failures are reported, not returned.
    pub async fn run_record(&self, record: &RecordConfig) -> Result<RecordResult, RunRejected> {
        let _guard = self.begin()?;
        Ok(self.process_record(record).await)
    }

    /// Check every record in order, pausing `delay` between records. One
    /// record's failure never stops the others.
    pub async fn run_all(
        &self,
        records: &[RecordConfig],
        delay: Duration,
    ) -> Result<Vec<RecordResult>, RunRejected> {
        let _guard = self.begin()?;
        info!(records = records.len(), "watch run started");

        let mut results = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                debug!(delay_ms = delay.as_millis() as u64, "pausing between records");
                tokio::time::sleep(delay).await;
            }
            results.push(self.process_record(record).await);
        }

        let failed = results
            .iter()
            .filter(|r| r.outcome == Outcome::Error)
            .count();
        info!(records = results.len(), failed, "watch run finished");
        Ok(results)
    }

    async fn process_record(&self, record: &RecordConfig) -> RecordResult {
        let mut phase = RunPhase::Fetching;
        match self.check(record, &mut phase).await {
            Ok((kind, categories)) => {
                phase = RunPhase::Done;
                info!(record = %record.id, ?phase, ?kind, ?categories, "record checked");
                RecordResult::success(&record.id, kind, categories)
            }
            Err(err) => {
                let failed_in = phase;
                phase = RunPhase::Error;
                error!(record = %record.id, ?failed_in, ?phase, "record check failed: {}", err);
                let message = err.to_string();
                self.dispatch_notice(&Notice::new(
                    format!("{}: check failed", display_name(record)),
                    message.clone(),
                ))
                .await;
                self.dispatch_report(&error_report(&record.id, Utc::now(), &message))
                    .await;
                RecordResult::failure(&record.id, message)
            }
        }
    }

    async fn check(
        &self,
        record: &RecordConfig,
        phase: &mut RunPhase,
    ) -> Result<(RunKind, Vec<ChangeCategory>), WatchError> {
        let previous = self.store.latest(&record.id).await?;

        let raw = self.fetcher.fetch(record).await?;
        let captured_at = next_capture_time(Utc::now(), previous.as_ref());
        let current = Snapshot::capture(&record.id, captured_at, raw);

        // Every capture is kept, changed or not.
        let locator = self.store.append(&current).await?;
        debug!(record = %record.id, path = %locator.path.display(), "snapshot stored");

        let name = display_name(record);
        let Some(previous) = previous else {
            *phase = RunPhase::Reporting;
            self.dispatch_notice(&Notice::new(
                format!("{name}: baseline established"),
                format!("First snapshot saved for {}; later checks compare against it.", record.id),
            ))
            .await;
            return Ok((RunKind::Baseline, Vec::new()));
        };

        *phase = RunPhase::Comparing;
        let result = diff(&previous, &current)?;

        *phase = RunPhase::Reporting;
        if !result.has_changes() {
            self.dispatch_notice(&Notice::new(
                format!("{name}: no changes"),
                format!("Status page unchanged since {}.", previous.captured_at().to_rfc3339()),
            ))
            .await;
            return Ok((RunKind::Unchanged, Vec::new()));
        }

        self.dispatch_notice(&Notice::new(
            format!("{name}: changes detected"),
            summary_message(&result),
        ))
        .await;
        let report = detailed_report(&result, &previous, &current, &record.id).into_report();
        self.dispatch_report(&report).await;

        Ok((RunKind::Changed, result.categories))
    }

    async fn dispatch_notice(&self, notice: &Notice) {
        if let Err(e) = self.notifier.notify(notice).await {
            warn!(title = %notice.title, "notification not delivered: {}", e);
        }
    }

    async fn dispatch_report(&self, report: &Report) {
        if let Err(e) = self.notifier.send_report(report).await {
            warn!(subject = %report.subject, "report not delivered: {}", e);
        }
    }
}

fn display_name(record: &RecordConfig) -> &str {
    record.label.as_deref().unwrap_or(&record.id)
}

/// Capture time at store resolution, strictly after the previous capture.
fn next_capture_time(now: DateTime<Utc>, previous: Option<&Snapshot>) -> DateTime<Utc> {
    let now = now.trunc_subsecs(6);
    match previous {
        Some(prev) if now <= prev.captured_at() => {
            prev.captured_at() + chrono::Duration::microseconds(1)
        }
        _ => now,
    }
}
