use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, Weekday};
use serde::Deserialize;

use crate::types::{EscalationCategory, Priority};

/// TOML-backed policy loaded from disk. Every section is optional and falls
/// back to the defaults below. Secrets (DB URL, webhooks) stay as env vars.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub escalation: EscalationPolicy,
    #[serde(default)]
    pub notifications: NotificationSettings,
    /// Replaces the built-in trigger rule table when set.
    #[serde(default)]
    pub rules_path: Option<PathBuf>,
}

/// Longest accepted window or SLA: one year.
pub const MAX_WINDOW_HOURS: i64 = 24 * 365;

/// Deadlines and resolution policy for the escalation processor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EscalationPolicy {
    pub pickup_window_hours: i64,
    pub delivery_window_hours: i64,
    pub baking_sla_hours: i64,
    /// Days the shop is closed; rescheduled pickups never land on them.
    pub closed_weekdays: Vec<Weekday>,
    /// Upper bound on orders handled by one scan call.
    pub batch_size: usize,
    pub auto_advance_delivery: bool,
    pub auto_advance_baking: bool,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            pickup_window_hours: 24,
            delivery_window_hours: 4,
            baking_sla_hours: 6,
            closed_weekdays: vec![Weekday::Sun],
            batch_size: 100,
            auto_advance_delivery: false,
            auto_advance_baking: false,
        }
    }
}

impl EscalationPolicy {
    pub fn pickup_window(&self) -> Duration {
        Duration::hours(self.pickup_window_hours)
    }

    pub fn delivery_window(&self) -> Duration {
        Duration::hours(self.delivery_window_hours)
    }

    pub fn baking_sla(&self) -> Duration {
        Duration::hours(self.baking_sla_hours)
    }

    /// Pickup escalation only reschedules; it never moves the order's stage.
    pub fn auto_advance(&self, category: EscalationCategory) -> bool {
        match category {
            EscalationCategory::Pickup => false,
            EscalationCategory::Delivery => self.auto_advance_delivery,
            EscalationCategory::Baking => self.auto_advance_baking,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, hours) in [
            ("pickup_window_hours", self.pickup_window_hours),
            ("delivery_window_hours", self.delivery_window_hours),
            ("baking_sla_hours", self.baking_sla_hours),
        ] {
            anyhow::ensure!(
                (1..=MAX_WINDOW_HOURS).contains(&hours),
                "{name} must be between 1 and {MAX_WINDOW_HOURS}, got {hours}"
            );
        }
        anyhow::ensure!(self.batch_size > 0, "batch_size must be positive");
        anyhow::ensure!(
            self.closed_weekdays.len() < 7,
            "closed_weekdays cannot close the shop every day"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationSettings {
    pub list_page_size: usize,
    pub admin_page_size: usize,
    /// Created notifications at or above this priority go to the outbound backend.
    pub forward_min_priority: Priority,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            list_page_size: 100,
            admin_page_size: 200,
            forward_min_priority: Priority::High,
        }
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(content)?;
    config.escalation.validate()?;
    Ok(config)
}
