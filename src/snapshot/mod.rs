pub mod extract;
pub mod types;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::PersistenceError;
use types::{Snapshot, SnapshotLocator};

// Fixed width and zero padded, so name order is capture order.
const NAME_TIME_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";
const NAME_TIME_PARSE: &str = "%Y%m%dT%H%M%S%.fZ";
const ENTRY_EXT: &str = "json";

fn entry_name(snapshot: &Snapshot) -> String {
    format!(
        "{}_{}.{}",
        snapshot.captured_at().format(NAME_TIME_FORMAT),
        snapshot.record_id(),
        ENTRY_EXT
    )
}

/// Capture time encoded in an entry's file name, if it is one of ours.
fn parse_entry_name(file_name: &str, record_id: &str) -> Option<DateTime<Utc>> {
    let stem = file_name.strip_suffix(&format!(".{ENTRY_EXT}"))?;
    let (stamp, record) = stem.split_once('_')?;
    if record != record_id {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, NAME_TIME_PARSE)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Record ids double as directory names.
pub fn is_valid_record_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Append-only, per-record snapshot history on the local filesystem.
///
/// Layout: `<root>/<record>/<timestamp>_<record>.json`. Entries are never
/// rewritten or removed.
pub struct SnapshotStore {
    root: PathBuf,
    /// Last snapshot read or written per record. Only trusted while it is
    /// still the newest entry on disk.
    latest_cache: tokio::sync::RwLock<HashMap<String, Snapshot>>,
}

impl SnapshotStore {
    pub async fn new(root: &Path) -> Result<Self, PersistenceError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| PersistenceError::io(root, e))?;
        Ok(Self {
            root: root.to_path_buf(),
            latest_cache: tokio::sync::RwLock::new(HashMap::new()),
        })
    }

    fn record_dir(&self, record_id: &str) -> Result<PathBuf, PersistenceError> {
        if !is_valid_record_id(record_id) {
            return Err(PersistenceError::InvalidRecordId(record_id.to_string()));
        }
        Ok(self.root.join(record_id))
    }

    /// Most recently captured snapshot, or `None` before the first run.
    ///
    /// The directory listing is authoritative: another process may have
    /// appended since the cache was filled.
    pub async fn latest(&self, record_id: &str) -> Result<Option<Snapshot>, PersistenceError> {
        let Some(newest) = self.history(record_id).await?.pop() else {
            return Ok(None);
        };

        {
            let cache = self.latest_cache.read().await;
            if let Some(snapshot) = cache.get(record_id) {
                if snapshot.captured_at() == newest.captured_at {
                    return Ok(Some(snapshot.clone()));
                }
            }
        }

        let snapshot = self.load(&newest).await?;
        debug!(record = record_id, path = %newest.path.display(), "latest snapshot reloaded");

        {
            let mut cache = self.latest_cache.write().await;
            cache.insert(record_id.to_string(), snapshot.clone());
        }
        Ok(Some(snapshot))
    }

    /// Durably write `snapshot` as a new entry. Never replaces an existing one.
    pub async fn append(&self, snapshot: &Snapshot) -> Result<SnapshotLocator, PersistenceError> {
        let dir = self.record_dir(snapshot.record_id())?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PersistenceError::io(&dir, e))?;

        let name = entry_name(snapshot);
        let path = dir.join(&name);
        let tmp = dir.join(format!(".{name}.tmp"));

        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|source| PersistenceError::Encode { source })?;

        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| PersistenceError::io(&tmp, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| PersistenceError::io(&tmp, e))?;
        file.sync_all()
            .await
            .map_err(|e| PersistenceError::io(&tmp, e))?;
        drop(file);

        // hard_link refuses to replace an existing entry and publishes the
        // complete file in one step.
        let published = tokio::fs::hard_link(&tmp, &path).await;
        if let Err(e) = tokio::fs::remove_file(&tmp).await {
            warn!(path = %tmp.display(), "failed to remove temp snapshot: {}", e);
        }
        match published {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(PersistenceError::Collision { path });
            }
            Err(e) => return Err(PersistenceError::io(&path, e)),
        }

        {
            let mut cache = self.latest_cache.write().await;
            let newer = cache
                .get(snapshot.record_id())
                .map_or(true, |cached| cached.captured_at() < snapshot.captured_at());
            if newer {
                cache.insert(snapshot.record_id().to_string(), snapshot.clone());
            }
        }

        debug!(
            record = snapshot.record_id(),
            path = %path.display(),
            size = bytes.len(),
            "snapshot appended"
        );
        Ok(SnapshotLocator {
            record_id: snapshot.record_id().to_string(),
            captured_at: snapshot.captured_at(),
            path,
        })
    }

    /// All entries for a record, oldest first.
    pub async fn history(&self, record_id: &str) -> Result<Vec<SnapshotLocator>, PersistenceError> {
        let dir = self.record_dir(record_id)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::io(&dir, e)),
        };

        let mut named = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PersistenceError::io(&dir, e))?
        {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(captured_at) = parse_entry_name(file_name, record_id) {
                named.push((file_name.to_string(), captured_at));
            }
        }

        named.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(named
            .into_iter()
            .map(|(file_name, captured_at)| SnapshotLocator {
                record_id: record_id.to_string(),
                captured_at,
                path: dir.join(file_name),
            })
            .collect())
    }

    pub async fn load(&self, locator: &SnapshotLocator) -> Result<Snapshot, PersistenceError> {
        let bytes = tokio::fs::read(&locator.path)
            .await
            .map_err(|e| PersistenceError::io(&locator.path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Decode {
            path: locator.path.clone(),
            source,
        })
    }
}
