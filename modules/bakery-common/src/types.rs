use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roles::Role;

// --- Order enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Standard,
    Pickup,
    Delivery,
    BakingInternal,
}

text_enum!(OrderType, "order type" {
    Standard => "standard",
    Pickup => "pickup",
    Delivery => "delivery",
    BakingInternal => "baking_internal",
});

/// Top-level lifecycle stage of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Received,
    Picking,
    Baking,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    NotDelivered,
    Completed,
    Cancelled,
}

text_enum!(OrderStatus, "order status" {
    Received => "received",
    Picking => "picking",
    Baking => "baking",
    ReadyForPickup => "ready_for_pickup",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    NotDelivered => "not_delivered",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PickingStatus {
    NotStarted,
    InProgress,
    Done,
}

text_enum!(PickingStatus, "picking status" {
    NotStarted => "not_started",
    InProgress => "in_progress",
    Done => "done",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BakingStatus {
    Pending,
    InProgress,
    Done,
}

text_enum!(BakingStatus, "baking status" {
    Pending => "pending",
    InProgress => "in_progress",
    Done => "done",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

text_enum!(PaymentStatus, "payment status" {
    Unpaid => "unpaid",
    Paid => "paid",
});

// --- Order ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineItem {
    pub product_name: String,
    pub quantity: i32,
    #[serde(default)]
    pub unit_price: Option<f64>,
    pub line_total: f64,
    /// Items that go through the oven give the order a baking sub-state.
    #[serde(default)]
    pub requires_baking: bool,
    /// Warehouse location → quantity picked from it.
    #[serde(default)]
    pub locations: BTreeMap<String, i32>,
}

impl LineItem {
    pub fn new(product_name: impl Into<String>, quantity: i32, line_total: f64) -> Self {
        Self {
            product_name: product_name.into(),
            quantity,
            unit_price: None,
            line_total,
            requires_baking: false,
            locations: BTreeMap::new(),
        }
    }

    pub fn baked(mut self) -> Self {
        self.requires_baking = true;
        self
    }

    pub fn at_location(mut self, location: impl Into<String>, quantity: i32) -> Self {
        self.locations.insert(location.into(), quantity);
        self
    }
}

/// An order record. Field names are the wire contract shared with the
/// forms, delivery dialogs and backup tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub picking_status: PickingStatus,
    /// Only present for internal baking tasks and orders with a baked item.
    pub baking_status: Option<BakingStatus>,
    pub payment_status: PaymentStatus,
    pub items: Vec<LineItem>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub delivery_notes: Option<String>,
    pub expected_pickup_date: Option<NaiveDate>,
    pub escalated: bool,
    pub escalated_at: Option<DateTime<Utc>>,
    /// Day of the last overdue escalation. The order is not escalated again
    /// until the next day.
    #[serde(default)]
    pub last_overdue_bucket: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub picking_started_at: Option<DateTime<Utc>>,
    pub baking_started_at: Option<DateTime<Utc>>,
    pub ready_for_pickup_at: Option<DateTime<Utc>>,
    pub out_for_delivery_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency counter, bumped by every successful write.
    pub version: i64,
}

impl Order {
    /// A freshly received order. Baking sub-state is attached when the order needs it.
    pub fn new(
        order_number: impl Into<String>,
        order_type: OrderType,
        items: Vec<LineItem>,
        now: DateTime<Utc>,
    ) -> Self {
        let tracks_baking =
            order_type == OrderType::BakingInternal || items.iter().any(|i| i.requires_baking);
        Self {
            id: Uuid::new_v4(),
            order_number: order_number.into(),
            order_type,
            status: OrderStatus::Received,
            picking_status: PickingStatus::NotStarted,
            baking_status: tracks_baking.then_some(BakingStatus::Pending),
            payment_status: PaymentStatus::Unpaid,
            items,
            customer_name: None,
            customer_phone: None,
            delivery_notes: None,
            expected_pickup_date: None,
            escalated: false,
            escalated_at: None,
            last_overdue_bucket: None,
            created_at: now,
            updated_at: now,
            picking_started_at: None,
            baking_started_at: None,
            ready_for_pickup_at: None,
            out_for_delivery_at: None,
            closed_at: None,
            version: 1,
        }
    }

    pub fn has_baking_item(&self) -> bool {
        self.items.iter().any(|i| i.requires_baking)
    }

    pub fn tracks_baking(&self) -> bool {
        self.order_type == OrderType::BakingInternal || self.has_baking_item()
    }

    pub fn order_value(&self) -> f64 {
        self.items.iter().map(|i| i.line_total).sum()
    }

    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity as i64).sum()
    }

    /// The day the customer is currently expected to collect the order.
    pub fn effective_pickup_date(&self) -> Option<NaiveDate> {
        self.expected_pickup_date
            .or_else(|| self.ready_for_pickup_at.map(|t| t.date_naive()))
    }
}

// --- Notifications ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

text_enum!(Priority, "priority" {
    Low => "low",
    Medium => "medium",
    High => "high",
});

/// A persisted notification. Only `is_read` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_role: Role,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub message: String,
    pub related_entity_id: Option<Uuid>,
    pub link_url: Option<String>,
    pub priority: Priority,
    pub dedupe_key: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Rendered notification content, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDraft {
    pub recipient_role: Role,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub message: String,
    pub related_entity_id: Option<Uuid>,
    pub link_url: Option<String>,
    pub priority: Priority,
    pub dedupe_key: String,
}

impl NotificationDraft {
    pub fn into_notification(self, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient_role: self.recipient_role,
            notification_type: self.notification_type,
            message: self.message,
            related_entity_id: self.related_entity_id,
            link_url: self.link_url,
            priority: self.priority,
            dedupe_key: self.dedupe_key,
            is_read: false,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationFilter {
    Unread,
    All,
    /// Every role's notifications, for the admin monitoring view.
    AdminAll,
}

text_enum!(NotificationFilter, "notification filter" {
    Unread => "unread",
    All => "all",
    AdminAll => "admin_all",
});

/// Which notifications a store query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationScope {
    Role(Role),
    AllRoles,
}

impl NotificationScope {
    pub fn includes(&self, role: Role) -> bool {
        match self {
            Self::Role(r) => *r == role,
            Self::AllRoles => true,
        }
    }
}

// --- Escalation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationCategory {
    Pickup,
    Delivery,
    Baking,
}

text_enum!(EscalationCategory, "escalation category" {
    Pickup => "pickup",
    Delivery => "delivery",
    Baking => "baking",
});
