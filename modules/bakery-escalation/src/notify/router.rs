use async_trait::async_trait;

use bakery_common::{AppConfig, Notification};

use super::backend::NotifyBackend;
use super::slack::SlackWebhook;
use crate::escalation::ScanReport;

/// Routes notifications to different backends based on configuration.
/// Supports separate Slack channels for scan digests vs individual alerts.
pub struct NotifyRouter {
    alerts_backend: Box<dyn NotifyBackend>,
    digest_backend: Box<dyn NotifyBackend>,
}

impl NotifyRouter {
    pub fn new(alerts_backend: Box<dyn NotifyBackend>, digest_backend: Box<dyn NotifyBackend>) -> Self {
        Self {
            alerts_backend,
            digest_backend,
        }
    }

    /// Build a router from the Slack settings in `config`, or `None` when no
    /// default webhook is configured.
    ///
    /// `SLACK_WEBHOOK_URL_ALERTS` and `SLACK_WEBHOOK_URL_DIGEST` override the
    /// default `SLACK_WEBHOOK_URL` per channel.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let default_url = config.slack_webhook_url.clone()?;

        let alerts_url = config
            .slack_webhook_url_alerts
            .clone()
            .unwrap_or_else(|| default_url.clone());
        let digest_url = config
            .slack_webhook_url_digest
            .clone()
            .unwrap_or(default_url);

        Some(Self::new(
            Box::new(SlackWebhook::new(alerts_url)),
            Box::new(SlackWebhook::new(digest_url)),
        ))
    }
}

#[async_trait]
impl NotifyBackend for NotifyRouter {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        self.alerts_backend.send(notification).await
    }

    async fn send_digest(&self, report: &ScanReport) -> anyhow::Result<()> {
        self.digest_backend.send_digest(report).await
    }
}
