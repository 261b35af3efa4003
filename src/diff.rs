use std::fmt;

use serde::Serialize;

use crate::error::InvalidComparisonError;
use crate::snapshot::types::Snapshot;

/// Coarse group of fields that changed between two captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeCategory {
    #[serde(rename = "content-change")]
    Content,
    #[serde(rename = "table-change")]
    Table,
    #[serde(rename = "numeric-change")]
    Numeric,
}

impl ChangeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content-change",
            Self::Table => "table-change",
            Self::Numeric => "numeric-change",
        }
    }

    /// Label used in notifications and reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Content => "Page content",
            Self::Table => "Tables",
            Self::Numeric => "Numbers",
        }
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    /// Evaluation order, no duplicates.
    pub categories: Vec<ChangeCategory>,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        !self.categories.is_empty()
    }

    pub fn contains(&self, category: ChangeCategory) -> bool {
        self.categories.contains(&category)
    }
}

/// Compare two captures of the same record, field group by field group.
///
/// Every check runs; none short-circuits. Tables and numbers compare as whole
/// ordered sequences, so a reordered row is a change.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Result<DiffResult, InvalidComparisonError> {
    if previous.record_id() != current.record_id() {
        return Err(InvalidComparisonError {
            previous: previous.record_id().to_string(),
            current: current.record_id().to_string(),
        });
    }

    let checks = [
        (ChangeCategory::Content, previous.main_text() != current.main_text()),
        (ChangeCategory::Table, previous.tables() != current.tables()),
        (
            ChangeCategory::Numeric,
            previous.numeric_tokens() != current.numeric_tokens(),
        ),
    ];

    Ok(DiffResult {
        categories: checks
            .into_iter()
            .filter_map(|(category, changed)| changed.then_some(category))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::types::{RawExtractedData, Tables};
    use chrono::{TimeZone, Utc};

    fn snap(record: &str, text: &str, tables: Tables, numbers: &[&str]) -> Snapshot {
        Snapshot::capture(
            record,
            Utc.with_ymd_and_hms(2024, 2, 2, 10, 0, 0).unwrap(),
            RawExtractedData {
                main_text: text.to_string(),
                tables,
                numeric_tokens: numbers.iter().map(|s| s.to_string()).collect(),
                source_url: "https://example.test".to_string(),
                element_text: String::new(),
            },
        )
    }

    fn table(rows: &[&[&str]]) -> Tables {
        vec![rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()]
    }

    #[test]
    fn identical_snapshot_has_no_changes() {
        let s = snap("r", "hello", table(&[&["a", "b"]]), &["1", "2"]);
        let result = diff(&s, &s).unwrap();
        assert!(!result.has_changes());
        assert!(result.categories.is_empty());
    }

    #[test]
    fn cell_order_is_significant() {
        let a = snap("r", "same", table(&[&["1", "2"]]), &[]);
        let b = snap("r", "same", table(&[&["2", "1"]]), &[]);
        let result = diff(&a, &b).unwrap();
        assert_eq!(result.categories, vec![ChangeCategory::Table]);
    }

    #[test]
    fn row_reorder_is_a_table_change() {
        let a = snap("r", "same", table(&[&["x"], &["y"]]), &[]);
        let b = snap("r", "same", table(&[&["y"], &["x"]]), &[]);
        assert!(diff(&a, &b).unwrap().contains(ChangeCategory::Table));
    }

    #[test]
    fn numeric_only_change_is_isolated() {
        let a = snap("r", "Fee", table(&[&["k", "v"]]), &["10"]);
        let b = snap("r", "Fee", table(&[&["k", "v"]]), &["11"]);
        assert_eq!(diff(&a, &b).unwrap().categories, vec![ChangeCategory::Numeric]);
    }

    #[test]
    fn empty_versus_present_is_a_change() {
        let a = snap("r", "t", Vec::new(), &[]);
        let b = snap("r", "t", table(&[&["x"]]), &["1"]);
        assert_eq!(
            diff(&a, &b).unwrap().categories,
            vec![ChangeCategory::Table, ChangeCategory::Numeric]
        );
    }

    #[test]
    fn all_categories_reported_in_evaluation_order() {
        let a = snap("r", "old", table(&[&["1"]]), &["1"]);
        let b = snap("r", "new", table(&[&["2"]]), &["2"]);
        assert_eq!(
            diff(&a, &b).unwrap().categories,
            vec![
                ChangeCategory::Content,
                ChangeCategory::Table,
                ChangeCategory::Numeric
            ]
        );
    }

    #[test]
    fn different_records_are_rejected() {
        let a = snap("first", "t", Vec::new(), &[]);
        let b = snap("second", "t", Vec::new(), &[]);
        let err = diff(&a, &b).unwrap_err();
        assert_eq!(err.previous, "first");
        assert_eq!(err.current, "second");
    }

    #[test]
    fn category_names_are_stable() {
        let json = serde_json::to_string(&ChangeCategory::Numeric).unwrap();
        assert_eq!(json, "\"numeric-change\"");
        assert_eq!(ChangeCategory::Table.to_string(), "table-change");
    }
}
