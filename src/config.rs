use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::schedule::Schedule;
use crate::snapshot::is_valid_record_id;

/// One monitored record from the watch list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordConfig {
    pub id: String,
    pub url: String,
    /// Root element holding the status content; defaults to `body`.
    #[serde(default)]
    pub selector: Option<String>,
    /// Element whose text identifies the record (e.g. its application number).
    #[serde(default)]
    pub identity_selector: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// Contents of the watch-list file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WatchList {
    #[serde(default)]
    pub schedule: Schedule,
    pub records: Vec<RecordConfig>,
}

impl WatchList {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read watch list {}", path.display()))?;
        let list: WatchList = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse watch list {}", path.display()))?;
        list.validate()?;
        Ok(list)
    }

    pub fn validate(&self) -> Result<()> {
        self.schedule.validate()?;
        let mut seen = HashSet::new();
        for record in &self.records {
            if !is_valid_record_id(&record.id) {
                bail!(
                    "record id `{}` must be non-empty and use only letters, digits, '-' or '_'",
                    record.id
                );
            }
            if !seen.insert(record.id.as_str()) {
                bail!("duplicate record id `{}`", record.id);
            }
            if record.url.trim().is_empty() {
                bail!("record `{}` has no url", record.id);
            }
        }
        Ok(())
    }

    /// Records named in `only`, in watch-list order. Empty `only` keeps all.
    pub fn select(&self, only: &[String]) -> Result<Vec<RecordConfig>> {
        if let Some(missing) = only.iter().find(|id| !self.records.iter().any(|r| &r.id == *id)) {
            bail!("unknown record `{}`", missing);
        }
        Ok(self
            .records
            .iter()
            .filter(|r| only.is_empty() || only.contains(&r.id))
            .cloned()
            .collect())
    }
}

/// Retry and timeout knobs for the page fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub attempts: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Process-level settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub data_dir: PathBuf,
    pub records_path: PathBuf,
    pub webhook_url: Option<String>,
    pub record_delay: Duration,
    pub fetch: FetchSettings,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/snapshots"),
            records_path: PathBuf::from("./records.json"),
            webhook_url: None,
            record_delay: Duration::from_secs(5),
            fetch: FetchSettings::default(),
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Result<Duration> {
    match dotenv::var(key) {
        Ok(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{key} must be a whole number of seconds"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}

impl WatchConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let data_dir = dotenv::var("STATUSWATCH_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let records_path = dotenv::var("STATUSWATCH_RECORDS")
            .map(PathBuf::from)
            .unwrap_or(defaults.records_path);
        let webhook_url = dotenv::var("STATUSWATCH_WEBHOOK_URL")
            .ok()
            .filter(|u| !u.trim().is_empty());

        let attempts = match dotenv::var("STATUSWATCH_FETCH_ATTEMPTS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .context("STATUSWATCH_FETCH_ATTEMPTS must be a positive integer")?
                .max(1),
            Err(_) => defaults.fetch.attempts,
        };

        Ok(Self {
            data_dir,
            records_path,
            webhook_url,
            record_delay: env_secs("STATUSWATCH_RECORD_DELAY_SECS", defaults.record_delay)?,
            fetch: FetchSettings {
                attempts,
                retry_delay: env_secs("STATUSWATCH_FETCH_RETRY_SECS", defaults.fetch.retry_delay)?,
                timeout: env_secs("STATUSWATCH_FETCH_TIMEOUT_SECS", defaults.fetch.timeout)?,
            },
        })
    }
}
