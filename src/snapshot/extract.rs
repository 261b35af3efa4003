use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use super::types::{RawExtractedData, Tables};
use crate::config::{FetchSettings, RecordConfig};
use crate::error::FetchError;

const USER_AGENT: &str = "statuswatch/0.1";
const DEFAULT_ROOT_SELECTOR: &str = "body";
const TEXT_WIDTH: usize = 120;

/// Produces raw extracted data for one record. Owns its own retry policy.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, record: &RecordConfig) -> Result<RawExtractedData, FetchError>;
}

/// Plain HTTP fetcher: GET the record page and extract text, tables and numbers.
pub struct HttpFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl HttpFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client, settings })
    }

    async fn get_body(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, record: &RecordConfig) -> Result<RawExtractedData, FetchError> {
        let attempts = self.settings.attempts.max(1);
        let mut last = String::new();

        for attempt in 1..=attempts {
            debug!(record = %record.id, attempt, url = %record.url, "fetching page");
            match self.get_body(&record.url).await {
                Ok(body) => {
                    let data = extract_page(&body, record)?;
                    info!(
                        record = %record.id,
                        attempt,
                        text_len = data.main_text.len(),
                        tables = data.tables.len(),
                        numbers = data.numeric_tokens.len(),
                        "page extracted"
                    );
                    return Ok(data);
                }
                Err(e) => {
                    warn!(record = %record.id, attempt, attempts, "fetch attempt failed: {}", e);
                    last = e.to_string();
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.retry_delay).await;
            }
        }

        Err(FetchError::Exhausted { attempts, last })
    }
}

fn parse_selector(raw: &str) -> Result<Selector, FetchError> {
    Selector::parse(raw).map_err(|_| FetchError::InvalidSelector {
        selector: raw.to_string(),
    })
}

/// Pull the comparable pieces out of a fetched page.
pub fn extract_page(html: &str, record: &RecordConfig) -> Result<RawExtractedData, FetchError> {
    let document = Html::parse_document(html);

    let root_raw = record.selector.as_deref().unwrap_or(DEFAULT_ROOT_SELECTOR);
    let root_selector = parse_selector(root_raw)?;
    let root = document
        .select(&root_selector)
        .next()
        .ok_or_else(|| FetchError::ContentNotFound {
            selector: root_raw.to_string(),
        })?;

    let root_html = root.html();
    let main_text = html2text::from_read(root_html.as_bytes(), TEXT_WIDTH)
        .unwrap_or_else(|_| collapse_text(&root))
        .trim()
        .to_string();

    let element_text = match record.identity_selector.as_deref() {
        Some(raw) => {
            let selector = parse_selector(raw)?;
            document
                .select(&selector)
                .next()
                .map(|el| collapse_text(&el))
                .unwrap_or_default()
        }
        None => String::new(),
    };

    Ok(RawExtractedData {
        numeric_tokens: numeric_tokens(&main_text),
        tables: extract_tables(&root),
        main_text,
        source_url: record.url.clone(),
        element_text,
    })
}

fn extract_tables(root: &ElementRef<'_>) -> Tables {
    let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("th, td"),
    ) else {
        return Vec::new();
    };

    // Nested tables are listed on their own; their rows and cells never
    // leak into the enclosing table.
    root.select(&table_sel)
        .map(|table| {
            table
                .select(&row_sel)
                .filter(|row| is_owned_by(row, "table", &table))
                .map(|row| {
                    row.select(&cell_sel)
                        .filter(|cell| is_owned_by(cell, "tr", &row))
                        .map(|cell| collapse_text(&cell))
                        .collect()
                })
                .collect()
        })
        .collect()
}

/// Whether the nearest `tag` ancestor of `el` is `owner`.
fn is_owned_by(el: &ElementRef<'_>, tag: &str, owner: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == tag)
        .is_some_and(|ancestor| ancestor.id() == owner.id())
}

fn collapse_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Maximal runs of digits, optionally joined by single dots (`12`, `3.5`,
/// `01.02.2024`). Order and duplicates are kept.
pub fn numeric_tokens(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        while i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        // ASCII-only slice bounds, always on char boundaries.
        tokens.push(text[start..i].to_string());
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(selector: Option<&str>, identity: Option<&str>) -> RecordConfig {
        RecordConfig {
            id: "app-1".to_string(),
            url: "https://example.test/status/1".to_string(),
            selector: selector.map(str::to_string),
            identity_selector: identity.map(str::to_string),
            label: None,
        }
    }

    const PAGE: &str = r#"
        <html><body>
          <nav>Menu 99</nav>
          <div id="status">
            <h2 class="app-no">Application 2024.118</h2>
            <p>Submitted 01.02.2024, reviewed 3 times.</p>
            <table>
              <tr><th>Step</th><th>Date</th></tr>
              <tr><td>Filed</td><td> 01.02.2024 </td></tr>
            </table>
          </div>
        </body></html>"#;

    #[test]
    fn extracts_root_tables_and_identity() {
        let data = extract_page(PAGE, &record(Some("#status"), Some(".app-no"))).unwrap();
        assert_eq!(data.element_text, "Application 2024.118");
        assert_eq!(data.source_url, "https://example.test/status/1");
        assert_eq!(
            data.tables,
            vec![vec![
                vec!["Step".to_string(), "Date".to_string()],
                vec!["Filed".to_string(), "01.02.2024".to_string()],
            ]]
        );
        assert!(data.main_text.contains("Submitted 01.02.2024"));
        assert!(!data.main_text.contains("Menu"));
        assert!(data.numeric_tokens.starts_with(&[
            "2024.118".to_string(),
            "01.02.2024".to_string(),
            "3".to_string(),
        ]));
    }

    #[test]
    fn nested_table_rows_stay_with_their_table() {
        let page = r#"
            <html><body><table>
              <tr><th>Step</th><th>Detail</th></tr>
              <tr><td>Filed</td><td><table><tr><td>inner</td></tr></table></td></tr>
            </table></body></html>"#;
        let data = extract_page(page, &record(None, None)).unwrap();
        assert_eq!(data.tables.len(), 2);
        assert_eq!(data.tables[0].len(), 2);
        assert_eq!(
            data.tables[0][1],
            vec!["Filed".to_string(), "inner".to_string()]
        );
        assert_eq!(data.tables[1], vec![vec!["inner".to_string()]]);
    }

    #[test]
    fn missing_root_is_content_not_found() {
        let err = extract_page(PAGE, &record(Some("#missing"), None)).unwrap_err();
        assert!(matches!(err, FetchError::ContentNotFound { .. }));
    }

    #[test]
    fn invalid_selector_is_reported() {
        let err = extract_page(PAGE, &record(Some("[[["), None)).unwrap_err();
        assert!(matches!(err, FetchError::InvalidSelector { .. }));
    }

    #[test]
    fn numeric_tokens_keep_order_and_duplicates() {
        assert_eq!(
            numeric_tokens("No. 12, due 05.06.2024; fee 12. Ref 1.2.3x and 7."),
            vec!["12", "05.06.2024", "12", "1.2.3", "7"]
        );
        assert!(numeric_tokens("no digits here").is_empty());
    }
}
