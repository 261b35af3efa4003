use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::NotificationDispatchError;

/// Webhook message bodies are capped at 2000 chars; leave headroom.
const MAX_CONTENT_LEN: usize = 1990;

/// Short-form alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Long-form report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub subject: String,
    pub html_body: String,
}

/// Best-effort delivery of alerts and reports. Callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &Notice) -> Result<(), NotificationDispatchError>;

    async fn send_report(&self, report: &Report) -> Result<(), NotificationDispatchError>;
}

/// Writes every alert and report to the log. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &Notice) -> Result<(), NotificationDispatchError> {
        info!(title = %notice.title, "{}", notice.message);
        Ok(())
    }

    async fn send_report(&self, report: &Report) -> Result<(), NotificationDispatchError> {
        info!(subject = %report.subject, size = report.html_body.len(), "report ready");
        debug!("{}", report.html_body);
        Ok(())
    }
}

/// Discord-compatible webhook: alerts as message content, reports as an
/// attached HTML file.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotificationDispatchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn check(resp: reqwest::Response) -> Result<(), NotificationDispatchError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(NotificationDispatchError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    async fn post_content(&self, content: &str) -> Result<(), NotificationDispatchError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { content })
            .send()
            .await?;
        Self::check(resp).await
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: &Notice) -> Result<(), NotificationDispatchError> {
        let text = format!("**{}**\n{}", notice.title, notice.message);
        for chunk in split_chunks(&text, MAX_CONTENT_LEN) {
            self.post_content(chunk).await?;
        }
        debug!(title = %notice.title, "webhook notice sent");
        Ok(())
    }

    async fn send_report(&self, report: &Report) -> Result<(), NotificationDispatchError> {
        let subject: String = report.subject.chars().take(MAX_CONTENT_LEN).collect();
        let payload = serde_json::to_string(&WebhookPayload { content: &subject })
            .map_err(NotificationDispatchError::Encode)?;
        let file = Part::bytes(report.html_body.clone().into_bytes())
            .file_name("report.html")
            .mime_str("text/html")?;
        let form = Form::new()
            .text("payload_json", payload)
            .part("files[0]", file);

        let resp = self.client.post(&self.url).multipart(form).send().await?;
        Self::check(resp).await?;
        debug!(subject = %report.subject, "webhook report sent");
        Ok(())
    }
}

/// Split on line or word boundaries so each piece fits in `max` bytes.
fn split_chunks(text: &str, max: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        if remaining.len() <= max {
            chunks.push(remaining);
            break;
        }
        let mut limit = max;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }
        let split_at = remaining[..limit]
            .rfind('\n')
            .or_else(|| remaining[..limit].rfind(' '))
            .map(|i| i + 1)
            .unwrap_or(limit);
        chunks.push(&remaining[..split_at]);
        remaining = &remaining[split_at..];
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_chunks("hello", 10), vec!["hello"]);
        assert!(split_chunks("", 10).is_empty());
    }

    #[test]
    fn long_text_splits_on_newlines_then_spaces() {
        let text = "first line\nsecond line here";
        let chunks = split_chunks(text, 12);
        assert_eq!(chunks[0], "first line\n");
        assert!(chunks.iter().all(|c| c.len() <= 12));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn splitting_respects_char_boundaries() {
        let text = "ääääää";
        let chunks = split_chunks(text, 3);
        assert!(chunks.iter().all(|c| c.len() <= 3));
        assert_eq!(chunks.concat(), text);
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        let notifier = LogNotifier;
        notifier.notify(&Notice::new("t", "m")).await.unwrap();
        notifier
            .send_report(&Report {
                subject: "s".to_string(),
                html_body: "<p>x</p>".to_string(),
            })
            .await
            .unwrap();
    }
}
