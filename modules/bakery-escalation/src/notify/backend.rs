use async_trait::async_trait;

use bakery_common::Notification;

use crate::escalation::ScanReport;

/// Pluggable outbound channel for notifications that staff should see
/// outside the in-app inbox.
#[async_trait]
pub trait NotifyBackend: Send + Sync {
    /// Forward one newly created notification.
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;

    /// Send a summary of one escalation scan.
    async fn send_digest(&self, report: &ScanReport) -> anyhow::Result<()>;
}
