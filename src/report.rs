use std::fmt::Write;

use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::diff::{ChangeCategory, DiffResult};
use crate::notify::Report;
use crate::snapshot::types::{Snapshot, Tables};

const NO_DATA: &str = "No data";
const NUMBER_SEPARATOR: &str = ", ";

/// One-line summary for short alerts. Only called when there are changes.
pub fn summary_message(diff: &DiffResult) -> String {
    let names: Vec<&str> = diff.categories.iter().map(|c| c.display_name()).collect();
    format!("Changes detected: {}", names.join(", "))
}

/// A before/after pair, or a placeholder when a side has nothing to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View<T> {
    Data(T),
    NoData,
}

impl View<Tables> {
    /// Tables without a single non-empty row count as no data.
    fn of_tables(tables: &Tables) -> Self {
        let kept: Tables = tables
            .iter()
            .filter(|table| table.iter().any(|row| !row.is_empty()))
            .cloned()
            .collect();
        if kept.is_empty() {
            Self::NoData
        } else {
            Self::Data(kept)
        }
    }
}

impl View<String> {
    fn of_numbers(numbers: &[String]) -> Self {
        if numbers.is_empty() {
            Self::NoData
        } else {
            Self::Data(numbers.join(NUMBER_SEPARATOR))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison<T> {
    pub before: View<T>,
    pub after: View<T>,
}

/// Long-form description of one detected change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailedReport {
    pub record_id: String,
    pub captured_at: DateTime<Utc>,
    /// The record's identity field (application number or equivalent).
    pub application_number: String,
    pub categories: Vec<ChangeCategory>,
    pub tables: Option<Comparison<Tables>>,
    pub numbers: Option<Comparison<String>>,
    pub source_url: String,
}

/// Build the detailed report. Before/after views are only included for the
/// categories that actually changed.
pub fn detailed_report(
    diff: &DiffResult,
    previous: &Snapshot,
    current: &Snapshot,
    record_id: &str,
) -> DetailedReport {
    let application_number = if current.element_text().is_empty() {
        previous.element_text().to_string()
    } else {
        current.element_text().to_string()
    };

    DetailedReport {
        record_id: record_id.to_string(),
        captured_at: current.captured_at(),
        application_number,
        categories: diff.categories.clone(),
        tables: diff.contains(ChangeCategory::Table).then(|| Comparison {
            before: View::of_tables(previous.tables()),
            after: View::of_tables(current.tables()),
        }),
        numbers: diff.contains(ChangeCategory::Numeric).then(|| Comparison {
            before: View::of_numbers(previous.numeric_tokens()),
            after: View::of_numbers(current.numeric_tokens()),
        }),
        source_url: current.source_url().to_string(),
    }
}

impl DetailedReport {
    pub fn subject(&self) -> String {
        format!("[statuswatch] {}: changes detected", self.record_id)
    }

    pub fn to_html(&self) -> String {
        let mut html = String::new();
        let _ = write!(
            html,
            "<h2>Status change for {}</h2>\n<ul>\n<li><b>Record:</b> {}</li>\n\
             <li><b>Captured:</b> {}</li>\n<li><b>Application number:</b> {}</li>\n</ul>\n",
            encode_text(&self.record_id),
            encode_text(&self.record_id),
            self.captured_at.to_rfc3339(),
            if self.application_number.is_empty() {
                NO_DATA.to_string()
            } else {
                encode_text(&self.application_number).into_owned()
            },
        );

        html.push_str("<h3>Changed</h3>\n<ul>\n");
        for category in &self.categories {
            let _ = writeln!(html, "<li>{}</li>", category.display_name());
        }
        html.push_str("</ul>\n");

        if let Some(tables) = &self.tables {
            html.push_str("<h3>Tables</h3>\n");
            render_tables(&mut html, "Before", &tables.before);
            render_tables(&mut html, "After", &tables.after);
        }

        if let Some(numbers) = &self.numbers {
            html.push_str("<h3>Numbers</h3>\n<table border=\"1\">\n<tr><th>Before</th><th>After</th></tr>\n");
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td></tr>\n</table>",
                number_cell(&numbers.before),
                number_cell(&numbers.after)
            );
        }

        let _ = writeln!(
            html,
            "<p><a href=\"{}\">{}</a></p>",
            encode_double_quoted_attribute(&self.source_url),
            encode_text(&self.source_url)
        );
        html
    }

    pub fn into_report(self) -> Report {
        Report {
            subject: self.subject(),
            html_body: self.to_html(),
        }
    }
}

/// Long-form notice for a failed run.
pub fn error_report(record_id: &str, at: DateTime<Utc>, message: &str) -> Report {
    Report {
        subject: format!("[statuswatch] {record_id}: check failed"),
        html_body: format!(
            "<h2>Check failed for {0}</h2>\n<ul>\n<li><b>Record:</b> {0}</li>\n\
             <li><b>Time:</b> {1}</li>\n</ul>\n<pre>{2}</pre>\n",
            encode_text(record_id),
            at.to_rfc3339(),
            encode_text(message)
        ),
    }
}

fn number_cell(view: &View<String>) -> String {
    match view {
        View::Data(joined) => encode_text(joined).into_owned(),
        View::NoData => format!("<i>{NO_DATA}</i>"),
    }
}

fn render_tables(html: &mut String, label: &str, view: &View<Tables>) {
    let _ = writeln!(html, "<h4>{label}</h4>");
    let tables = match view {
        View::Data(tables) => tables,
        View::NoData => {
            let _ = writeln!(html, "<p><i>{NO_DATA}</i></p>");
            return;
        }
    };

    for (index, table) in tables.iter().enumerate() {
        let _ = writeln!(html, "<p>Table {}</p>\n<table border=\"1\">", index + 1);
        for (row_index, row) in table.iter().enumerate() {
            // First row is the header.
            let tag = if row_index == 0 { "th" } else { "td" };
            html.push_str("<tr>");
            for cell in row {
                let _ = write!(html, "<{tag}>{}</{tag}>", encode_text(cell));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</table>\n");
    }
}
