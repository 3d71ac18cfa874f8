//! Lifecycle event tags. These strings key the trigger rule table and become
//! the `type` of the notifications they produce.

use serde::{Deserialize, Serialize};

use crate::types::{BakingStatus, EscalationCategory, OrderStatus, OrderType, PickingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    OrderCreated,
    BakingOrderCreated,
    PickingStarted,
    PickingInProgress,
    BakingStarted,
    BakingInProgress,
    BakingDone,
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    NotDelivered,
    OrderCompleted,
    BakingCompleted,
    OrderCancelled,
    PickupOverdue,
    DeliveryOverdue,
    BakingOverdue,
}

text_enum!(LifecycleEvent, "event type" {
    OrderCreated => "order_created",
    BakingOrderCreated => "baking_order_created",
    PickingStarted => "picking_started",
    PickingInProgress => "picking_in_progress",
    BakingStarted => "baking_started",
    BakingInProgress => "baking_in_progress",
    BakingDone => "baking_done",
    ReadyForPickup => "ready_for_pickup",
    OutForDelivery => "out_for_delivery",
    Delivered => "delivered",
    NotDelivered => "not_delivered",
    OrderCompleted => "order_completed",
    BakingCompleted => "baking_completed",
    OrderCancelled => "order_cancelled",
    PickupOverdue => "pickup_overdue",
    DeliveryOverdue => "delivery_overdue",
    BakingOverdue => "baking_overdue",
});

impl LifecycleEvent {
    /// Event emitted when an order enters `to`. `Received` is never a target.
    pub fn for_stage(order_type: OrderType, to: OrderStatus) -> Option<Self> {
        match to {
            OrderStatus::Received => None,
            OrderStatus::Picking => Some(Self::PickingStarted),
            OrderStatus::Baking => Some(Self::BakingStarted),
            OrderStatus::ReadyForPickup => Some(Self::ReadyForPickup),
            OrderStatus::OutForDelivery => Some(Self::OutForDelivery),
            OrderStatus::Delivered => Some(Self::Delivered),
            OrderStatus::NotDelivered => Some(Self::NotDelivered),
            OrderStatus::Completed if order_type == OrderType::BakingInternal => {
                Some(Self::BakingCompleted)
            }
            OrderStatus::Completed => Some(Self::OrderCompleted),
            OrderStatus::Cancelled => Some(Self::OrderCancelled),
        }
    }

    pub fn for_picking(status: PickingStatus) -> Option<Self> {
        match status {
            PickingStatus::InProgress => Some(Self::PickingInProgress),
            PickingStatus::NotStarted | PickingStatus::Done => None,
        }
    }

    pub fn for_baking(status: BakingStatus) -> Option<Self> {
        match status {
            BakingStatus::InProgress => Some(Self::BakingInProgress),
            BakingStatus::Done => Some(Self::BakingDone),
            BakingStatus::Pending => None,
        }
    }

    pub fn overdue(category: EscalationCategory) -> Self {
        match category {
            EscalationCategory::Pickup => Self::PickupOverdue,
            EscalationCategory::Delivery => Self::DeliveryOverdue,
            EscalationCategory::Baking => Self::BakingOverdue,
        }
    }

    /// Overdue events repeat once per day bucket.
    pub fn is_overdue(self) -> bool {
        matches!(
            self,
            Self::PickupOverdue | Self::DeliveryOverdue | Self::BakingOverdue
        )
    }
}
