use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::{WatchConfig, WatchList};
use crate::error::NotificationDispatchError;
use crate::notify::{LogNotifier, Notice, Notifier, Report, WebhookNotifier};
use crate::snapshot::extract::HttpFetcher;
use crate::snapshot::SnapshotStore;
use crate::watcher::Watcher;

/// Notifier picked at startup from the environment.
pub enum ConfiguredNotifier {
    Log(LogNotifier),
    Webhook(WebhookNotifier),
}

#[async_trait]
impl Notifier for ConfiguredNotifier {
    async fn notify(&self, notice: &Notice) -> Result<(), NotificationDispatchError> {
        match self {
            ConfiguredNotifier::Log(n) => n.notify(notice).await,
            ConfiguredNotifier::Webhook(n) => n.notify(notice).await,
        }
    }

    async fn send_report(&self, report: &Report) -> Result<(), NotificationDispatchError> {
        match self {
            ConfiguredNotifier::Log(n) => n.send_report(report).await,
            ConfiguredNotifier::Webhook(n) => n.send_report(report).await,
        }
    }
}

pub type AppWatcher = Watcher<HttpFetcher, ConfiguredNotifier>;

pub struct AppState {
    pub config: WatchConfig,
    pub watcher: AppWatcher,
}

impl AppState {
    pub async fn init(config: WatchConfig) -> Result<Self> {
        let store = Arc::new(
            SnapshotStore::new(&config.data_dir)
                .await
                .context("Failed to open snapshot store")?,
        );
        info!("Snapshot store initialized at {:?}", config.data_dir);

        let fetcher =
            HttpFetcher::new(config.fetch.clone()).context("Failed to create page fetcher")?;

        let notifier = match &config.webhook_url {
            Some(url) => {
                info!("Webhook notifier configured");
                ConfiguredNotifier::Webhook(
                    WebhookNotifier::new(url, config.fetch.timeout)
                        .context("Failed to create webhook notifier")?,
                )
            }
            None => {
                info!("No webhook configured; notifications go to the log");
                ConfiguredNotifier::Log(LogNotifier)
            }
        };

        Ok(Self {
            watcher: Watcher::new(store, fetcher, notifier),
            config,
        })
    }

    pub fn watch_list(&self) -> Result<WatchList> {
        WatchList::load(&self.config.records_path)
    }
}
