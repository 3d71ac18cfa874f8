//! Order-stage state machine.
//!
//! The `plan_*` functions are pure: they check a change against the legal
//! table, the actor's capabilities and the sub-stage rules, and return the
//! next order state with the event it produces. [`OrderLifecycle`] persists a
//! plan through a version-guarded write. Neither layer sends notifications.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use bakery_common::{
    Actor, BakeryError, BakeryResult, BakingStatus, Capability, LifecycleEvent, Order,
    OrderStatus, OrderType, PickingStatus,
};
use bakery_store::OrderStore;

use crate::clock::Clock;

/// A requested stage change. `from` is the stage the caller believes the
/// order is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Skip unfinished sub-stages. Recorded on the order as `escalated`.
    #[serde(default)]
    pub forced: bool,
}

impl Transition {
    pub fn new(from: OrderStatus, to: OrderStatus) -> Self {
        Self {
            from,
            to,
            forced: false,
        }
    }

    pub fn forced(from: OrderStatus, to: OrderStatus) -> Self {
        Self {
            from,
            to,
            forced: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub order: Order,
    pub event: LifecycleEvent,
}

/// Stages reachable from `from` in one step for an order of `order_type`.
pub fn legal_targets(order_type: OrderType, from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;

    match order_type {
        OrderType::Standard | OrderType::Pickup => match from {
            Received => &[Picking, Cancelled],
            Picking => &[ReadyForPickup, Cancelled],
            ReadyForPickup => &[Delivered, NotDelivered, Cancelled],
            Delivered => &[Completed],
            NotDelivered => &[Cancelled],
            Baking | OutForDelivery | Completed | Cancelled => &[],
        },
        OrderType::Delivery => match from {
            Received => &[Picking, Cancelled],
            Picking => &[Baking, OutForDelivery, Cancelled],
            Baking => &[OutForDelivery, Cancelled],
            OutForDelivery => &[Delivered, NotDelivered, Cancelled],
            Delivered => &[Completed],
            NotDelivered => &[Cancelled],
            ReadyForPickup | Completed | Cancelled => &[],
        },
        OrderType::BakingInternal => match from {
            Received => &[Picking, Cancelled],
            Picking => &[Baking, Cancelled],
            Baking => &[Completed, Cancelled],
            ReadyForPickup | OutForDelivery | Delivered | NotDelivered | Completed
            | Cancelled => &[],
        },
    }
}

/// The next stage on the order's normal path, skipping optional baking for
/// delivery orders with nothing to bake.
pub fn forward_target(order: &Order) -> Option<OrderStatus> {
    if order.order_type == OrderType::Delivery && order.status == OrderStatus::Picking {
        return Some(if order.tracks_baking() {
            OrderStatus::Baking
        } else {
            OrderStatus::OutForDelivery
        });
    }
    legal_targets(order.order_type, order.status)
        .iter()
        .copied()
        .find(|s| *s != OrderStatus::Cancelled)
}

/// Capability an actor needs to move an order into `to`.
pub fn required_capability(order_type: OrderType, from: OrderStatus, to: OrderStatus) -> Capability {
    let internal = order_type == OrderType::BakingInternal;
    match to {
        OrderStatus::Picking if internal => Capability::UpdateBaking,
        OrderStatus::Picking | OrderStatus::ReadyForPickup => Capability::UpdatePicking,
        OrderStatus::Baking => Capability::UpdateBaking,
        OrderStatus::Completed if internal => Capability::UpdateBaking,
        OrderStatus::OutForDelivery => Capability::HandleDelivery,
        OrderStatus::Delivered | OrderStatus::NotDelivered
            if from == OrderStatus::ReadyForPickup =>
        {
            Capability::HandOverPickup
        }
        OrderStatus::Delivered | OrderStatus::NotDelivered => Capability::HandleDelivery,
        OrderStatus::Received | OrderStatus::Completed | OrderStatus::Cancelled => {
            Capability::ManageOrders
        }
    }
}

fn rejected(order: &Order, to: OrderStatus, reason: impl Into<String>) -> BakeryError {
    BakeryError::invalid_transition(order.order_type, order.status, to, reason)
}

/// Validate `transition` and build the order it produces.
pub fn plan_transition(
    order: &Order,
    transition: Transition,
    actor: &Actor,
    now: DateTime<Utc>,
) -> BakeryResult<(Order, LifecycleEvent)> {
    let Transition { from, to, forced } = transition;

    if order.status != from {
        return Err(BakeryError::ConcurrentModification(order.id));
    }
    actor.require(required_capability(order.order_type, from, to))?;
    if forced {
        actor.require(Capability::ForceTransitions)?;
    }
    if !legal_targets(order.order_type, from).contains(&to) {
        return Err(rejected(order, to, "not a step on this order's path"));
    }
    if to == OrderStatus::Baking && !order.tracks_baking() {
        return Err(rejected(order, to, "order has nothing to bake"));
    }

    let mut next = order.clone();

    if to != OrderStatus::Cancelled {
        let leaves_picking = from == OrderStatus::Picking;
        let needs_baking = from == OrderStatus::Baking
            || (leaves_picking && to != OrderStatus::Baking && order.tracks_baking());

        if leaves_picking && order.picking_status != PickingStatus::InProgress && !forced {
            return Err(rejected(order, to, "picking has not started"));
        }
        if needs_baking && order.baking_status != Some(BakingStatus::Done) && !forced {
            return Err(rejected(order, to, "baking is not done"));
        }
        if leaves_picking {
            next.picking_status = PickingStatus::Done;
        }
        if needs_baking {
            next.baking_status = Some(BakingStatus::Done);
        }
    }

    if forced {
        next.escalated = true;
        next.escalated_at.get_or_insert(now);
    }

    match to {
        OrderStatus::Picking => next.picking_started_at = Some(now),
        OrderStatus::Baking => {
            next.baking_started_at = Some(now);
            next.baking_status.get_or_insert(BakingStatus::Pending);
        }
        OrderStatus::ReadyForPickup => next.ready_for_pickup_at = Some(now),
        OrderStatus::OutForDelivery => next.out_for_delivery_at = Some(now),
        OrderStatus::Completed | OrderStatus::Cancelled => next.closed_at = Some(now),
        OrderStatus::Received | OrderStatus::Delivered | OrderStatus::NotDelivered => {}
    }
    next.status = to;
    next.updated_at = now;

    let event = LifecycleEvent::for_stage(order.order_type, to)
        .ok_or_else(|| rejected(order, to, "stage has no entry event"))?;
    Ok((next, event))
}

/// `not_started → in_progress` while the order is being picked. Picking is
/// marked done only by leaving the stage.
pub fn plan_picking_status(
    order: &Order,
    status: PickingStatus,
    actor: &Actor,
    now: DateTime<Utc>,
) -> BakeryResult<(Order, LifecycleEvent)> {
    actor.require(Capability::UpdatePicking)?;

    if order.status != OrderStatus::Picking {
        return Err(rejected(order, order.status, "picking status only changes while picking"));
    }
    let event = match (order.picking_status, status) {
        (PickingStatus::NotStarted, PickingStatus::InProgress) => LifecycleEvent::PickingInProgress,
        (_, PickingStatus::Done) => {
            return Err(rejected(order, order.status, "picking is finished by leaving the stage"))
        }
        (current, requested) => {
            return Err(rejected(
                order,
                order.status,
                format!("picking status cannot move from {current} to {requested}"),
            ))
        }
    };

    let mut next = order.clone();
    next.picking_status = status;
    next.updated_at = now;
    Ok((next, event))
}

/// `pending → in_progress → done`, forward only. Baked items can progress
/// while the rest of the order is still being picked.
pub fn plan_baking_status(
    order: &Order,
    status: BakingStatus,
    actor: &Actor,
    now: DateTime<Utc>,
) -> BakeryResult<(Order, LifecycleEvent)> {
    actor.require(Capability::UpdateBaking)?;

    if !order.tracks_baking() {
        return Err(rejected(order, order.status, "order has nothing to bake"));
    }
    if !matches!(order.status, OrderStatus::Picking | OrderStatus::Baking) {
        return Err(rejected(order, order.status, "baking status only changes while picking or baking"));
    }
    let current = order.baking_status.unwrap_or(BakingStatus::Pending);
    let event = LifecycleEvent::for_baking(status)
        .filter(|_| status > current)
        .ok_or_else(|| {
            rejected(
                order,
                order.status,
                format!("baking status cannot move from {current} to {status}"),
            )
        })?;

    let mut next = order.clone();
    next.baking_status = Some(status);
    next.updated_at = now;
    Ok((next, event))
}

/// Applies state-machine plans to stored orders.
#[derive(Clone)]
pub struct OrderLifecycle {
    orders: Arc<dyn OrderStore>,
    clock: Arc<dyn Clock>,
}

impl OrderLifecycle {
    pub fn new(orders: Arc<dyn OrderStore>, clock: Arc<dyn Clock>) -> Self {
        Self { orders, clock }
    }

    pub async fn apply(
        &self,
        order: &Order,
        transition: Transition,
        actor: &Actor,
    ) -> BakeryResult<TransitionOutcome> {
        let planned = plan_transition(order, transition, actor, self.clock.now())?;
        self.commit(order, planned, actor).await
    }

    pub async fn set_picking_status(
        &self,
        order: &Order,
        status: PickingStatus,
        actor: &Actor,
    ) -> BakeryResult<TransitionOutcome> {
        let planned = plan_picking_status(order, status, actor, self.clock.now())?;
        self.commit(order, planned, actor).await
    }

    pub async fn set_baking_status(
        &self,
        order: &Order,
        status: BakingStatus,
        actor: &Actor,
    ) -> BakeryResult<TransitionOutcome> {
        let planned = plan_baking_status(order, status, actor, self.clock.now())?;
        self.commit(order, planned, actor).await
    }

    /// Move the expected pickup date of an uncollected order. Not a stage
    /// change, but guarded by the same version check.
    pub async fn reschedule_pickup(
        &self,
        order: &Order,
        date: NaiveDate,
        bucket: NaiveDate,
    ) -> BakeryResult<Order> {
        if order.status != OrderStatus::ReadyForPickup {
            return Err(rejected(order, order.status, "only orders awaiting pickup can be rescheduled"));
        }
        let mut next = order.clone();
        next.expected_pickup_date = Some(date);
        next.last_overdue_bucket = Some(bucket);
        next.updated_at = self.clock.now();
        self.orders.update(&next, order.version).await
    }

    /// Record that `order` was escalated in `bucket` without moving it.
    pub async fn mark_overdue(&self, order: &Order, bucket: NaiveDate) -> BakeryResult<Order> {
        let mut next = order.clone();
        next.last_overdue_bucket = Some(bucket);
        next.updated_at = self.clock.now();
        self.orders.update(&next, order.version).await
    }

    async fn commit(
        &self,
        before: &Order,
        (next, event): (Order, LifecycleEvent),
        actor: &Actor,
    ) -> BakeryResult<TransitionOutcome> {
        let order = self.orders.update(&next, before.version).await?;
        debug!(
            order_id = %order.id,
            order_number = %order.order_number,
            event = %event,
            actor = %actor.label(),
            version = order.version,
            "Order updated"
        );
        Ok(TransitionOutcome { order, event })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakery_common::{LineItem, Role};

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn order(order_type: OrderType, status: OrderStatus) -> Order {
        let mut order = Order::new("42", order_type, vec![LineItem::new("Rye", 2, 8.0)], now());
        order.status = status;
        order
    }

    fn staff(role: Role) -> Actor {
        Actor::user(role)
    }

    #[test]
    fn pickup_path_is_linear() {
        let received = order(OrderType::Pickup, OrderStatus::Received);
        let (picking, event) = plan_transition(
            &received,
            Transition::new(OrderStatus::Received, OrderStatus::Picking),
            &staff(Role::Picker),
            now(),
        )
        .unwrap();
        assert_eq!(picking.status, OrderStatus::Picking);
        assert!(picking.picking_started_at.is_some());
        assert_eq!(event, LifecycleEvent::PickingStarted);

        let err = plan_transition(
            &received,
            Transition::new(OrderStatus::Received, OrderStatus::ReadyForPickup),
            &staff(Role::Admin),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, BakeryError::InvalidTransition { .. }));
    }

    #[test]
    fn leaving_picking_requires_progress_unless_forced() {
        let picking = order(OrderType::Standard, OrderStatus::Picking);
        let step = Transition::new(OrderStatus::Picking, OrderStatus::ReadyForPickup);

        let err = plan_transition(&picking, step, &staff(Role::Picker), now()).unwrap_err();
        assert!(matches!(err, BakeryError::InvalidTransition { .. }));

        let (forced, _) = plan_transition(
            &picking,
            Transition::forced(OrderStatus::Picking, OrderStatus::ReadyForPickup),
            &staff(Role::StoreManager),
            now(),
        )
        .unwrap();
        assert_eq!(forced.picking_status, PickingStatus::Done);
        assert!(forced.escalated);
        assert!(forced.escalated_at.is_some());
    }

    #[test]
    fn pickers_cannot_force() {
        let picking = order(OrderType::Standard, OrderStatus::Picking);
        let err = plan_transition(
            &picking,
            Transition::forced(OrderStatus::Picking, OrderStatus::ReadyForPickup),
            &staff(Role::Picker),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, BakeryError::Forbidden { capability: Capability::ForceTransitions, .. }));
    }

    #[test]
    fn stale_from_is_a_concurrent_modification() {
        let picking = order(OrderType::Standard, OrderStatus::Picking);
        let err = plan_transition(
            &picking,
            Transition::new(OrderStatus::Received, OrderStatus::Picking),
            &staff(Role::Picker),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, BakeryError::ConcurrentModification(_)));
    }

    #[test]
    fn delivery_with_baked_items_waits_for_the_oven() {
        let mut picking = Order::new(
            "7",
            OrderType::Delivery,
            vec![LineItem::new("Croissant", 6, 12.0).baked()],
            now(),
        );
        picking.status = OrderStatus::Picking;
        picking.picking_status = PickingStatus::InProgress;

        assert_eq!(forward_target(&picking), Some(OrderStatus::Baking));
        let err = plan_transition(
            &picking,
            Transition::new(OrderStatus::Picking, OrderStatus::OutForDelivery),
            &staff(Role::Courier),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, BakeryError::InvalidTransition { .. }));

        let (baking, event) = plan_transition(
            &picking,
            Transition::new(OrderStatus::Picking, OrderStatus::Baking),
            &staff(Role::Baker),
            now(),
        )
        .unwrap();
        assert_eq!(event, LifecycleEvent::BakingStarted);
        assert_eq!(baking.picking_status, PickingStatus::Done);
        assert_eq!(baking.baking_status, Some(BakingStatus::Pending));
    }

    #[test]
    fn delivery_without_baked_items_skips_baking() {
        let mut picking = order(OrderType::Delivery, OrderStatus::Picking);
        picking.picking_status = PickingStatus::InProgress;
        assert_eq!(forward_target(&picking), Some(OrderStatus::OutForDelivery));

        let err = plan_transition(
            &picking,
            Transition::new(OrderStatus::Picking, OrderStatus::Baking),
            &staff(Role::Baker),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, BakeryError::InvalidTransition { .. }));
    }

    #[test]
    fn baking_task_completes_with_its_own_event() {
        let mut baking = order(OrderType::BakingInternal, OrderStatus::Baking);
        baking.baking_status = Some(BakingStatus::Done);
        let (done, event) = plan_transition(
            &baking,
            Transition::new(OrderStatus::Baking, OrderStatus::Completed),
            &staff(Role::Baker),
            now(),
        )
        .unwrap();
        assert_eq!(event, LifecycleEvent::BakingCompleted);
        assert!(done.closed_at.is_some());
    }

    #[test]
    fn cancel_is_not_allowed_after_delivery() {
        let delivered = order(OrderType::Delivery, OrderStatus::Delivered);
        let err = plan_transition(
            &delivered,
            Transition::new(OrderStatus::Delivered, OrderStatus::Cancelled),
            &staff(Role::Admin),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, BakeryError::InvalidTransition { .. }));

        let failed = order(OrderType::Delivery, OrderStatus::NotDelivered);
        assert!(plan_transition(
            &failed,
            Transition::new(OrderStatus::NotDelivered, OrderStatus::Cancelled),
            &staff(Role::StoreManager),
            now(),
        )
        .is_ok());
    }

    #[test]
    fn couriers_cannot_hand_over_pickups() {
        let ready = order(OrderType::Pickup, OrderStatus::ReadyForPickup);
        let err = plan_transition(
            &ready,
            Transition::new(OrderStatus::ReadyForPickup, OrderStatus::Delivered),
            &staff(Role::Courier),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, BakeryError::Forbidden { capability: Capability::HandOverPickup, .. }));
    }

    #[test]
    fn picking_status_moves_forward_once() {
        let picking = order(OrderType::Standard, OrderStatus::Picking);
        let (started, event) =
            plan_picking_status(&picking, PickingStatus::InProgress, &staff(Role::Picker), now())
                .unwrap();
        assert_eq!(event, LifecycleEvent::PickingInProgress);

        assert!(plan_picking_status(&started, PickingStatus::InProgress, &staff(Role::Picker), now()).is_err());
        assert!(plan_picking_status(&started, PickingStatus::NotStarted, &staff(Role::Picker), now()).is_err());
        assert!(plan_picking_status(&started, PickingStatus::Done, &staff(Role::Picker), now()).is_err());
    }

    #[test]
    fn baking_status_is_monotonic() {
        let baking = order(OrderType::BakingInternal, OrderStatus::Baking);
        let (done, event) =
            plan_baking_status(&baking, BakingStatus::Done, &staff(Role::Baker), now()).unwrap();
        assert_eq!(event, LifecycleEvent::BakingDone);

        let err = plan_baking_status(&done, BakingStatus::InProgress, &staff(Role::Baker), now())
            .unwrap_err();
        assert!(matches!(err, BakeryError::InvalidTransition { .. }));

        let plain = order(OrderType::Standard, OrderStatus::Picking);
        assert!(plan_baking_status(&plain, BakingStatus::InProgress, &staff(Role::Baker), now()).is_err());
    }
}
