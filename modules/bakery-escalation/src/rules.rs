//! Declarative trigger rules: lifecycle event → recipient, templates, priority.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use bakery_common::{
    BakeryError, BakeryResult, LifecycleEvent, NotificationDraft, Order, OrderType,
    PaymentStatus, Priority, Role,
};

use crate::template;

const DEFAULT_RULES: &str = include_str!("../rules/default.toml");

/// Placeholders a rule template may reference.
pub const PLACEHOLDERS: &[&str] = &[
    "order_id",
    "order_number",
    "order_type",
    "status",
    "customer_name",
    "customer_phone",
    "item_count",
    "order_value",
    "expected_pickup_date",
    "event_type",
    "bucket",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderPredicate {
    MinOrderValue { amount: f64 },
    #[serde(rename = "order_type")]
    OfType { order_type: OrderType },
    HasBakingItems,
    Unpaid,
}

impl OrderPredicate {
    pub fn matches(&self, order: &Order) -> bool {
        match self {
            Self::MinOrderValue { amount } => order.order_value() >= *amount,
            Self::OfType { order_type } => order.order_type == *order_type,
            Self::HasBakingItems => order.has_baking_item(),
            Self::Unpaid => order.payment_status == PaymentStatus::Unpaid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RecipientSelector {
    Role(Role),
    Conditional {
        when: OrderPredicate,
        role: Role,
        #[serde(default)]
        otherwise: Option<Role>,
    },
}

impl RecipientSelector {
    /// `None` when a conditional rule matches nobody.
    pub fn select(&self, order: &Order) -> Option<Role> {
        match self {
            Self::Role(role) => Some(*role),
            Self::Conditional {
                when,
                role,
                otherwise,
            } => {
                if when.matches(order) {
                    Some(*role)
                } else {
                    *otherwise
                }
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerRule {
    pub event_type: LifecycleEvent,
    pub recipient: RecipientSelector,
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default = "default_dedupe_key")]
    pub dedupe_key: String,
}

fn default_priority() -> Priority {
    Priority::Medium
}

fn default_dedupe_key() -> String {
    "{{event_type}}:{{order_id}}".to_string()
}

impl TriggerRule {
    fn validate(&self) -> Result<()> {
        template::validate(&self.message, PLACEHOLDERS).context("message")?;
        if let Some(link) = &self.link {
            template::validate(link, PLACEHOLDERS).context("link")?;
        }
        template::validate(&self.dedupe_key, PLACEHOLDERS).context("dedupe_key")?;
        if !self.dedupe_key.contains("{{order_id}}") {
            bail!("dedupe_key must include {{{{order_id}}}}");
        }
        if self.event_type.is_overdue() && !self.dedupe_key.contains("{{bucket}}") {
            bail!("dedupe_key of {} must include {{{{bucket}}}}", self.event_type);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesFile {
    #[serde(default)]
    rule: Vec<TriggerRule>,
}

/// Extra inputs to a rule besides the order itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventContext {
    /// Time bucket for events that may repeat, such as overdue escalations.
    pub bucket: Option<NaiveDate>,
}

impl EventContext {
    pub fn bucketed(bucket: NaiveDate) -> Self {
        Self {
            bucket: Some(bucket),
        }
    }
}

/// One rule per event type.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: HashMap<LifecycleEvent, TriggerRule>,
}

impl RuleSet {
    /// The table shipped with the crate.
    pub fn defaults() -> Result<Self> {
        Self::parse(DEFAULT_RULES).context("Built-in trigger rules are invalid")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse rules file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let file: RulesFile = toml::from_str(content)?;
        Self::from_rules(file.rule)
    }

    pub fn from_rules(rules: Vec<TriggerRule>) -> Result<Self> {
        let mut table = HashMap::with_capacity(rules.len());
        for rule in rules {
            rule.validate()
                .with_context(|| format!("Invalid rule for {}", rule.event_type))?;
            let event_type = rule.event_type;
            if table.insert(event_type, rule).is_some() {
                bail!("Duplicate rule for {event_type}");
            }
        }
        Ok(Self { rules: table })
    }

    pub fn rule(&self, event_type: LifecycleEvent) -> Option<&TriggerRule> {
        self.rules.get(&event_type)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Render the notification `event_type` produces for `order`.
    ///
    /// `Ok(None)` when the rule's selector picks nobody for this order.
    pub fn resolve(
        &self,
        event_type: LifecycleEvent,
        order: &Order,
        ctx: &EventContext,
    ) -> BakeryResult<Option<NotificationDraft>> {
        let rule = self
            .rule(event_type)
            .ok_or_else(|| BakeryError::UnknownEventType(event_type.to_string()))?;
        let Some(recipient_role) = rule.recipient.select(order) else {
            return Ok(None);
        };

        let vars = template_vars(event_type, order, ctx);
        Ok(Some(NotificationDraft {
            recipient_role,
            notification_type: event_type.to_string(),
            message: template::render(&rule.message, &vars),
            related_entity_id: Some(order.id),
            link_url: rule.link.as_deref().map(|link| template::render(link, &vars)),
            priority: rule.priority,
            dedupe_key: template::render(&rule.dedupe_key, &vars),
        }))
    }
}

fn template_vars(
    event_type: LifecycleEvent,
    order: &Order,
    ctx: &EventContext,
) -> HashMap<&'static str, String> {
    let or_dash = |value: Option<&str>| value.unwrap_or("-").to_string();
    HashMap::from([
        ("order_id", order.id.to_string()),
        ("order_number", order.order_number.clone()),
        ("order_type", order.order_type.to_string()),
        ("status", order.status.to_string()),
        ("customer_name", or_dash(order.customer_name.as_deref())),
        ("customer_phone", or_dash(order.customer_phone.as_deref())),
        ("item_count", order.item_count().to_string()),
        ("order_value", format!("{:.2}", order.order_value())),
        (
            "expected_pickup_date",
            order
                .effective_pickup_date()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
        ("event_type", event_type.to_string()),
        (
            "bucket",
            ctx.bucket.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakery_common::LineItem;
    use chrono::Utc;

    fn order(order_type: OrderType, items: Vec<LineItem>) -> Order {
        Order::new("B3", order_type, items, Utc::now())
    }

    #[test]
    fn defaults_cover_every_event() {
        let rules = RuleSet::defaults().unwrap();
        for event in LifecycleEvent::ALL {
            assert!(rules.rule(*event).is_some(), "missing rule for {event}");
        }
    }

    #[test]
    fn baking_order_goes_to_baker_keyed_by_order() {
        let rules = RuleSet::defaults().unwrap();
        let task = order(OrderType::BakingInternal, vec![LineItem::new("Rye", 2, 0.0).baked()]);
        let draft = rules
            .resolve(LifecycleEvent::BakingOrderCreated, &task, &EventContext::default())
            .unwrap()
            .unwrap();

        assert_eq!(draft.recipient_role, Role::Baker);
        assert_eq!(draft.notification_type, "baking_order_created");
        assert!(draft.dedupe_key.contains(&task.id.to_string()));
        assert_eq!(draft.message, "New baking task B3: 2 items");
        assert_eq!(draft.related_entity_id, Some(task.id));
    }

    #[test]
    fn overdue_key_carries_the_bucket() {
        let rules = RuleSet::defaults().unwrap();
        let o = order(OrderType::Pickup, vec![]);
        let day = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        let draft = rules
            .resolve(LifecycleEvent::PickupOverdue, &o, &EventContext::bucketed(day))
            .unwrap()
            .unwrap();
        assert_eq!(draft.dedupe_key, format!("pickup_overdue:{}:2026-03-04", o.id));
        assert_eq!(draft.recipient_role, Role::StoreManager);
        assert_eq!(draft.priority, Priority::High);
    }

    #[test]
    fn conditional_selector_uses_fallback_or_nobody() {
        let rules = RuleSet::defaults().unwrap();
        let small = order(OrderType::Delivery, vec![LineItem::new("Bun", 1, 2.0)]);
        let large = order(OrderType::Delivery, vec![LineItem::new("Cake", 1, 300.0)]);
        let ctx = EventContext::default();

        assert!(rules.resolve(LifecycleEvent::Delivered, &small, &ctx).unwrap().is_none());
        let draft = rules.resolve(LifecycleEvent::Delivered, &large, &ctx).unwrap().unwrap();
        assert_eq!(draft.recipient_role, Role::StoreManager);

        let picked = order(OrderType::Standard, vec![]);
        let draft = rules.resolve(LifecycleEvent::BakingDone, &picked, &ctx).unwrap().unwrap();
        assert_eq!(draft.recipient_role, Role::Picker);
        let driven = order(OrderType::Delivery, vec![]);
        let draft = rules.resolve(LifecycleEvent::BakingDone, &driven, &ctx).unwrap().unwrap();
        assert_eq!(draft.recipient_role, Role::Courier);
    }

    #[test]
    fn unregistered_event_is_unknown() {
        let rules = RuleSet::parse(
            r#"
            [[rule]]
            event_type = "order_created"
            recipient = "picker"
            message = "New order {{order_number}}"
            "#,
        )
        .unwrap();
        assert_eq!(rules.len(), 1);

        let err = rules
            .resolve(LifecycleEvent::Delivered, &order(OrderType::Pickup, vec![]), &EventContext::default())
            .unwrap_err();
        assert!(matches!(err, BakeryError::UnknownEventType(t) if t == "delivered"));
    }

    #[test]
    fn misspelt_role_is_a_load_error() {
        let result = RuleSet::parse(
            r#"
            [[rule]]
            event_type = "order_created"
            recipient = "store-manager"
            message = "New order"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_placeholder_is_a_load_error() {
        let result = RuleSet::parse(
            r#"
            [[rule]]
            event_type = "order_created"
            recipient = "picker"
            message = "New order for {{customer_email}}"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_rules_are_rejected() {
        let result = RuleSet::parse(
            r#"
            [[rule]]
            event_type = "order_created"
            recipient = "picker"
            message = "a"

            [[rule]]
            event_type = "order_created"
            recipient = "baker"
            message = "b"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn dedupe_key_must_name_the_order() {
        let result = RuleSet::parse(
            r#"
            [[rule]]
            event_type = "pickup_overdue"
            recipient = "store_manager"
            message = "late"
            dedupe_key = "{{event_type}}:{{bucket}}"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn overdue_dedupe_key_must_carry_the_bucket() {
        for event_type in ["pickup_overdue", "delivery_overdue", "baking_overdue"] {
            let err = RuleSet::parse(&format!(
                r#"
                [[rule]]
                event_type = "{event_type}"
                recipient = "store_manager"
                message = "late"
                dedupe_key = "{{{{event_type}}}}:{{{{order_id}}}}"
                "#
            ))
            .unwrap_err();
            assert!(format!("{err:#}").contains("{{bucket}}"), "{event_type}: {err:#}");
        }

        // Default key has no bucket either.
        let result = RuleSet::parse(
            r#"
            [[rule]]
            event_type = "delivery_overdue"
            recipient = "store_manager"
            message = "late"
            "#,
        );
        assert!(result.is_err());

        // Non-overdue events may omit it.
        let rules = RuleSet::parse(
            r#"
            [[rule]]
            event_type = "delivered"
            recipient = "store_manager"
            message = "done"
            dedupe_key = "{{event_type}}:{{order_id}}"
            "#,
        )
        .unwrap();
        assert_eq!(rules.len(), 1);
    }
}
