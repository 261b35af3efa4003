use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of a monitored record. Also used as its store namespace.
pub type RecordId = String;

/// Ordered tables; each table is ordered rows of ordered cells.
pub type Tables = Vec<Vec<Vec<String>>>;

/// What the page fetcher hands back for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawExtractedData {
    pub main_text: String,
    pub tables: Tables,
    pub numeric_tokens: Vec<String>,
    pub source_url: String,
    /// Text of the record's identity element (e.g. its application number).
    pub element_text: String,
}

/// Structured fields the differ compares group by group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub tables: Tables,
    pub numbers: Vec<String>,
}

/// One immutable capture of a record's page state.
///
/// Persisted as-is, one JSON document per entry:
/// `recordId, timestamp, url, mainText, elementText, fields.{tables,numbers}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    record_id: RecordId,
    #[serde(rename = "timestamp")]
    captured_at: DateTime<Utc>,
    #[serde(rename = "url")]
    source_url: String,
    main_text: String,
    #[serde(default)]
    element_text: String,
    fields: ExtractedFields,
}

impl Snapshot {
    /// Normalize fetched data into a snapshot. Text fields are trimmed here so
    /// comparisons never see leading or trailing whitespace.
    pub fn capture(record_id: &str, captured_at: DateTime<Utc>, raw: RawExtractedData) -> Self {
        Self {
            record_id: record_id.to_string(),
            captured_at,
            source_url: raw.source_url.trim().to_string(),
            main_text: raw.main_text.trim().to_string(),
            element_text: raw.element_text.trim().to_string(),
            fields: ExtractedFields {
                tables: raw.tables,
                numbers: raw.numeric_tokens,
            },
        }
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn main_text(&self) -> &str {
        &self.main_text
    }

    pub fn element_text(&self) -> &str {
        &self.element_text
    }

    pub fn tables(&self) -> &Tables {
        &self.fields.tables
    }

    pub fn numeric_tokens(&self) -> &[String] {
        &self.fields.numbers
    }
}

/// Where a persisted snapshot lives, plus the capture time parsed from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLocator {
    pub record_id: RecordId,
    pub captured_at: DateTime<Utc>,
    pub path: std::path::PathBuf,
}
