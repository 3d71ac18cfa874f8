use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use bakery_common::{Notification, Priority};

use super::backend::NotifyBackend;
use crate::escalation::{EscalationAction, ScanReport};

/// Slack incoming webhook notification backend.
pub struct SlackWebhook {
    webhook_url: String,
    http: reqwest::Client,
}

impl SlackWebhook {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            http: reqwest::Client::new(),
        }
    }

    fn priority_emoji(priority: Priority) -> &'static str {
        match priority {
            Priority::Low => ":information_source:",
            Priority::Medium => ":bell:",
            Priority::High => ":rotating_light:",
        }
    }

    fn notification_text(notification: &Notification) -> String {
        let mut text = format!(
            "{} *Bakery: {}* (for {})\n{}",
            Self::priority_emoji(notification.priority),
            notification.notification_type,
            notification.recipient_role,
            notification.message,
        );
        if let Some(link) = &notification.link_url {
            text.push_str(&format!("\n<{link}|Open>"));
        }
        text
    }

    /// `None` when the scan found nothing worth reporting.
    fn digest_text(report: &ScanReport) -> Option<String> {
        if report.orders.is_empty() && report.failures.is_empty() {
            return None;
        }

        let mut lines = vec![format!(
            ":alarm_clock: *Bakery {} escalation scan*",
            report.category
        )];

        for escalated in &report.orders {
            let action = match &escalated.action {
                EscalationAction::Rescheduled { to, .. } => format!("pickup moved to {to}"),
                EscalationAction::Flagged => "flagged".to_string(),
                EscalationAction::Advanced { to } => format!("moved to {to}"),
            };
            lines.push(format!("  - Order {}: {action}", escalated.order_number));
        }

        if !report.failures.is_empty() {
            lines.push(format!("*Failures:* {}", report.failures.len()));
            for failure in &report.failures {
                lines.push(format!("  - Order {}: {}", failure.order_number, failure.error));
            }
        }

        if report.aborted {
            lines.push("_Scan aborted early; remaining orders will be retried next run_".to_string());
        } else if report.has_more {
            lines.push("_More overdue orders are waiting for the next run_".to_string());
        }

        Some(lines.join("\n"))
    }

    async fn post(&self, text: String) -> anyhow::Result<()> {
        let payload = json!({
            "text": text,
            "unfurl_links": false,
        });

        let resp = self
            .http
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Slack webhook returned non-success");
            anyhow::bail!("Slack webhook returned {status}");
        }

        Ok(())
    }
}

#[async_trait]
impl NotifyBackend for SlackWebhook {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
        self.post(Self::notification_text(notification)).await
    }

    async fn send_digest(&self, report: &ScanReport) -> anyhow::Result<()> {
        match Self::digest_text(report) {
            Some(text) => self.post(text).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakery_common::{EscalationCategory, NotificationDraft, Role};
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use crate::escalation::{EscalatedOrder, ScanFailure};

    #[test]
    fn notification_text_includes_link() {
        let notification = NotificationDraft {
            recipient_role: Role::StoreManager,
            notification_type: "pickup_overdue".into(),
            message: "Order 12 was not collected".into(),
            related_entity_id: None,
            link_url: Some("/orders/abc".into()),
            priority: Priority::High,
            dedupe_key: "k".into(),
        }
        .into_notification(Utc::now());

        let text = SlackWebhook::notification_text(&notification);
        assert!(text.starts_with(":rotating_light: *Bakery: pickup_overdue* (for store_manager)"));
        assert!(text.ends_with("\n</orders/abc|Open>"));
    }

    #[test]
    fn empty_scan_has_no_digest() {
        let report = ScanReport::new(EscalationCategory::Delivery);
        assert!(SlackWebhook::digest_text(&report).is_none());
    }

    #[test]
    fn digest_lists_orders_and_failures() {
        let mut report = ScanReport::new(EscalationCategory::Pickup);
        report.orders.push(EscalatedOrder {
            order_id: Uuid::new_v4(),
            order_number: "12".into(),
            action: EscalationAction::Rescheduled {
                from: None,
                to: NaiveDate::from_ymd_opt(2026, 3, 5).unwrap(),
            },
            deadline: Utc::now(),
            notified: true,
        });
        report.failures.push(ScanFailure {
            order_id: Uuid::new_v4(),
            order_number: "13".into(),
            error: "Store unavailable: timeout".into(),
        });
        report.aborted = true;

        let text = SlackWebhook::digest_text(&report).unwrap();
        assert!(text.contains("Order 12: pickup moved to 2026-03-05"));
        assert!(text.contains("*Failures:* 1"));
        assert!(text.contains("aborted"));
    }
}
