use async_trait::async_trait;

use bakery_common::Notification;

use super::backend::NotifyBackend;
use crate::escalation::ScanReport;

/// Used when no webhook is configured.
pub struct NoopBackend;

#[async_trait]
impl NotifyBackend for NoopBackend {
    async fn send(&self, _notification: &Notification) -> anyhow::Result<()> {
        Ok(())
    }

    async fn send_digest(&self, _report: &ScanReport) -> anyhow::Result<()> {
        Ok(())
    }
}
