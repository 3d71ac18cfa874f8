//! Direct order paths: creation, staff-driven stage changes, delivery
//! outcomes. Each emits its lifecycle event the same way escalation does.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use bakery_common::{
    Actor, BakeryError, BakeryResult, BakingStatus, Capability, LifecycleEvent, LineItem,
    Order, OrderStatus, OrderType, PaymentStatus, PickingStatus,
};
use bakery_store::OrderStore;

use crate::clock::Clock;
use crate::dispatcher::DispatchOutcome;
use crate::lifecycle::{OrderLifecycle, Transition, TransitionOutcome};
use crate::notifier::EventNotifier;
use crate::rules::EventContext;

/// Prefix for manually created baking task numbers (`B1`, `B2`, ...).
pub const BAKING_ORDER_PREFIX: &str = "B";

/// A harvested customer order.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    /// Number from the harvested invoice; claimed from the sequence when absent.
    #[serde(default)]
    pub order_number: Option<String>,
    pub order_type: OrderType,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub delivery_notes: Option<String>,
    #[serde(default)]
    pub expected_pickup_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBakingOrder {
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderUpdate {
    pub order: Order,
    pub event: LifecycleEvent,
    /// `None` when no rule applied or the notification could not be stored.
    pub notification: Option<DispatchOutcome>,
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    lifecycle: OrderLifecycle,
    notifier: EventNotifier,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        lifecycle: OrderLifecycle,
        notifier: EventNotifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders,
            lifecycle,
            notifier,
            clock,
        }
    }

    pub async fn get(&self, id: Uuid) -> BakeryResult<Order> {
        self.orders
            .get(id)
            .await?
            .ok_or(BakeryError::OrderNotFound(id))
    }

    /// Store a harvested order in `received`.
    pub async fn register_order(&self, new: NewOrder, actor: &Actor) -> BakeryResult<OrderUpdate> {
        actor.require(Capability::CreateOrders)?;
        if new.order_type == OrderType::BakingInternal {
            return Err(BakeryError::Validation(
                "baking tasks are created through the baking order path".into(),
            ));
        }
        validate_items(&new.items)?;

        let order_number = match new.order_number {
            Some(number) => {
                if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(BakeryError::Validation(format!(
                        "harvested order numbers are numeric, got '{number}'"
                    )));
                }
                number
            }
            None => self.orders.claim_order_number("").await?,
        };

        let mut order = Order::new(order_number, new.order_type, new.items, self.clock.now());
        order.payment_status = new.payment_status.unwrap_or(PaymentStatus::Unpaid);
        order.customer_name = new.customer_name;
        order.customer_phone = new.customer_phone;
        order.delivery_notes = new.delivery_notes;
        order.expected_pickup_date = new.expected_pickup_date;

        self.orders.insert(&order).await?;
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            order_type = %order.order_type,
            actor = %actor.label(),
            "Order registered"
        );
        Ok(self.announce(order, LifecycleEvent::OrderCreated).await)
    }

    /// Create an internal baking task numbered `B<n>`. It starts in
    /// `picking` with picking already under way.
    pub async fn create_baking_order(
        &self,
        new: NewBakingOrder,
        actor: &Actor,
    ) -> BakeryResult<OrderUpdate> {
        actor.require(Capability::CreateOrders)?;
        validate_items(&new.items)?;

        let number = self.orders.claim_order_number(BAKING_ORDER_PREFIX).await?;
        let now = self.clock.now();
        let items = new.items.into_iter().map(LineItem::baked).collect();

        let mut order = Order::new(number, OrderType::BakingInternal, items, now);
        order.status = OrderStatus::Picking;
        order.picking_status = PickingStatus::InProgress;
        order.picking_started_at = Some(now);
        order.delivery_notes = new.notes;

        self.orders.insert(&order).await?;
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            actor = %actor.label(),
            "Baking order created"
        );
        Ok(self.announce(order, LifecycleEvent::BakingOrderCreated).await)
    }

    pub async fn transition(
        &self,
        id: Uuid,
        transition: Transition,
        actor: &Actor,
    ) -> BakeryResult<OrderUpdate> {
        let order = self.get(id).await?;
        let outcome = self.lifecycle.apply(&order, transition, actor).await?;
        Ok(self.announce_outcome(outcome).await)
    }

    pub async fn set_picking_status(
        &self,
        id: Uuid,
        status: PickingStatus,
        actor: &Actor,
    ) -> BakeryResult<OrderUpdate> {
        let order = self.get(id).await?;
        let outcome = self.lifecycle.set_picking_status(&order, status, actor).await?;
        Ok(self.announce_outcome(outcome).await)
    }

    pub async fn set_baking_status(
        &self,
        id: Uuid,
        status: BakingStatus,
        actor: &Actor,
    ) -> BakeryResult<OrderUpdate> {
        let order = self.get(id).await?;
        let outcome = self.lifecycle.set_baking_status(&order, status, actor).await?;
        Ok(self.announce_outcome(outcome).await)
    }

    /// Handover confirmed, at the counter or at the door.
    pub async fn confirm_delivery(&self, id: Uuid, actor: &Actor) -> BakeryResult<OrderUpdate> {
        self.close_handover(id, OrderStatus::Delivered, actor).await
    }

    pub async fn report_not_delivered(&self, id: Uuid, actor: &Actor) -> BakeryResult<OrderUpdate> {
        self.close_handover(id, OrderStatus::NotDelivered, actor).await
    }

    async fn close_handover(
        &self,
        id: Uuid,
        to: OrderStatus,
        actor: &Actor,
    ) -> BakeryResult<OrderUpdate> {
        let order = self.get(id).await?;
        if !matches!(order.status, OrderStatus::ReadyForPickup | OrderStatus::OutForDelivery) {
            return Err(BakeryError::invalid_transition(
                order.order_type,
                order.status,
                to,
                "order is not awaiting handover",
            ));
        }
        let outcome = self
            .lifecycle
            .apply(&order, Transition::new(order.status, to), actor)
            .await?;
        Ok(self.announce_outcome(outcome).await)
    }

    async fn announce_outcome(&self, outcome: TransitionOutcome) -> OrderUpdate {
        self.announce(outcome.order, outcome.event).await
    }

    /// The order change is already committed, so a failed notification is
    /// logged rather than returned.
    async fn announce(&self, order: Order, event: LifecycleEvent) -> OrderUpdate {
        let notification = match self.notifier.emit(event, &order, EventContext::default()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    order_id = %order.id,
                    event = %event,
                    error = %e,
                    "Failed to dispatch notification"
                );
                None
            }
        };
        OrderUpdate {
            order,
            event,
            notification,
        }
    }
}

fn validate_items(items: &[LineItem]) -> BakeryResult<()> {
    if items.is_empty() {
        return Err(BakeryError::Validation("an order needs at least one item".into()));
    }
    if let Some(item) = items.iter().find(|i| i.quantity <= 0) {
        return Err(BakeryError::Validation(format!(
            "quantity of {} must be positive",
            item.product_name
        )));
    }
    Ok(())
}
