//! The escalation processor: finds orders past their stage deadline and
//! reschedules, flags or advances them.
//!
//! Scans hold no in-process state. Each order is handled with conditional
//! writes and bucketed dedupe keys, so any number of concurrent scans
//! converge on the same orders and the same notification set.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use bakery_common::{
    Actor, BakeryError, BakeryResult, Capability, EscalationCategory, LifecycleEvent, Order,
    OrderStatus,
};
use bakery_store::OrderStore;

use crate::clock::StageClock;
use crate::lifecycle::{forward_target, OrderLifecycle, Transition};
use crate::notifier::EventNotifier;
use crate::notify::NotifyBackend;
use crate::rules::EventContext;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EscalationAction {
    /// Uncollected pickup moved to a later day.
    Rescheduled {
        from: Option<NaiveDate>,
        to: NaiveDate,
    },
    /// Notified only; the order stays in its stage until tomorrow's bucket.
    Flagged,
    /// Forced onto the next stage.
    Advanced { to: OrderStatus },
}

#[derive(Debug, Clone, Serialize)]
pub struct EscalatedOrder {
    pub order_id: Uuid,
    pub order_number: String,
    pub action: EscalationAction,
    pub deadline: DateTime<Utc>,
    /// False when this bucket's overdue notification already existed.
    pub notified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanFailure {
    pub order_id: Uuid,
    pub order_number: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub category: EscalationCategory,
    pub processed_count: usize,
    pub orders: Vec<EscalatedOrder>,
    pub failures: Vec<ScanFailure>,
    /// Candidates that were no longer overdue when re-checked.
    pub skipped: usize,
    /// The batch cap was hit; more candidates remain for the next scan.
    pub has_more: bool,
    /// The store failed mid-batch and the remaining candidates were left alone.
    pub aborted: bool,
}

impl ScanReport {
    pub fn new(category: EscalationCategory) -> Self {
        Self {
            category,
            processed_count: 0,
            orders: Vec::new(),
            failures: Vec::new(),
            skipped: 0,
            has_more: false,
            aborted: false,
        }
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "category={} processed={} failures={} skipped={} has_more={} aborted={}",
            self.category,
            self.processed_count,
            self.failures.len(),
            self.skipped,
            self.has_more,
            self.aborted,
        )
    }
}

pub struct EscalationProcessor {
    orders: Arc<dyn OrderStore>,
    lifecycle: OrderLifecycle,
    stage_clock: StageClock,
    notifier: EventNotifier,
    backend: Arc<dyn NotifyBackend>,
}

impl EscalationProcessor {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        lifecycle: OrderLifecycle,
        stage_clock: StageClock,
        notifier: EventNotifier,
        backend: Arc<dyn NotifyBackend>,
    ) -> Self {
        Self {
            orders,
            lifecycle,
            stage_clock,
            notifier,
            backend,
        }
    }

    /// `scan` on behalf of a caller, who must hold the trigger capability.
    pub async fn scan_as(&self, actor: &Actor, category: EscalationCategory) -> BakeryResult<ScanReport> {
        actor.require(Capability::TriggerEscalation)?;
        self.scan(category).await
    }

    /// Every category in turn. Stops at the first category whose candidate
    /// listing fails.
    pub async fn scan_all(&self) -> BakeryResult<Vec<ScanReport>> {
        let mut reports = Vec::with_capacity(EscalationCategory::ALL.len());
        for category in EscalationCategory::ALL {
            reports.push(self.scan(*category).await?);
        }
        Ok(reports)
    }

    /// Escalate up to `batch_size` overdue orders of one category, oldest
    /// first. Fails only if the candidates cannot be listed; per-order errors
    /// are collected in the report.
    pub async fn scan(&self, category: EscalationCategory) -> BakeryResult<ScanReport> {
        let batch_size = self.stage_clock.policy().batch_size;
        let query = self.stage_clock.candidates_query(category, batch_size + 1);
        let mut candidates = self.orders.list_overdue_candidates(&query).await?;

        let mut report = ScanReport::new(category);
        report.has_more = candidates.len() > batch_size;
        candidates.truncate(batch_size);

        for order in &candidates {
            match self.process(category, order).await {
                Ok(Some(escalated)) => report.orders.push(escalated),
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    warn!(
                        order_id = %order.id,
                        order_number = %order.order_number,
                        category = %category,
                        error = %e,
                        "Failed to escalate order"
                    );
                    let store_down = e.is_store_failure();
                    report.failures.push(ScanFailure {
                        order_id: order.id,
                        order_number: order.order_number.clone(),
                        error: e.to_string(),
                    });
                    if store_down {
                        report.aborted = true;
                        break;
                    }
                }
            }
        }
        report.processed_count = report.orders.len();

        if let Err(e) = self.backend.send_digest(&report).await {
            warn!(error = %e, category = %category, "Failed to send scan digest");
        }

        info!("Escalation scan complete. {report}");
        Ok(report)
    }

    /// One order, with a single retry after losing a write race.
    async fn process(&self, category: EscalationCategory, order: &Order) -> BakeryResult<Option<EscalatedOrder>> {
        match self.escalate(category, order).await {
            Err(BakeryError::ConcurrentModification(id)) => {
                debug!(order_id = %id, "Lost write race, re-evaluating order");
                match self.orders.get(id).await? {
                    Some(fresh) => self.escalate(category, &fresh).await,
                    None => Ok(None),
                }
            }
            other => other,
        }
    }

    /// Notifies before writing, so a resolved order always has its overdue
    /// notification.
    async fn escalate(&self, category: EscalationCategory, order: &Order) -> BakeryResult<Option<EscalatedOrder>> {
        let Some(overdue) = self.stage_clock.overdue(category, order) else {
            return Ok(None);
        };
        let ctx = EventContext::bucketed(overdue.bucket);
        let event = LifecycleEvent::overdue(category);

        let (action, notified) = match category {
            EscalationCategory::Pickup => {
                let Some(to) = self.stage_clock.reschedule_date(order) else {
                    return Ok(None);
                };
                let mut rescheduled = order.clone();
                rescheduled.expected_pickup_date = Some(to);

                let notified = self.notify(event, &rescheduled, ctx).await?;
                self.lifecycle
                    .reschedule_pickup(order, to, overdue.bucket)
                    .await?;
                (
                    EscalationAction::Rescheduled {
                        from: order.expected_pickup_date,
                        to,
                    },
                    notified,
                )
            }
            EscalationCategory::Delivery | EscalationCategory::Baking => {
                let notified = self.notify(event, order, ctx).await?;
                if self.stage_clock.policy().auto_advance(category) {
                    let to = self.advance_target(category, order)?;
                    let outcome = self
                        .lifecycle
                        .apply(order, Transition::forced(order.status, to), &Actor::System)
                        .await?;
                    self.notify(outcome.event, &outcome.order, EventContext::default())
                        .await?;
                    (EscalationAction::Advanced { to }, notified)
                } else {
                    self.lifecycle.mark_overdue(order, overdue.bucket).await?;
                    (EscalationAction::Flagged, notified)
                }
            }
        };

        Ok(Some(EscalatedOrder {
            order_id: order.id,
            order_number: order.order_number.clone(),
            action,
            deadline: overdue.deadline,
            notified,
        }))
    }

    fn advance_target(&self, category: EscalationCategory, order: &Order) -> BakeryResult<OrderStatus> {
        match category {
            EscalationCategory::Delivery => Ok(OrderStatus::NotDelivered),
            _ => forward_target(order).ok_or_else(|| {
                BakeryError::invalid_transition(
                    order.order_type,
                    order.status,
                    order.status,
                    "no next stage to advance to",
                )
            }),
        }
    }

    async fn notify(&self, event: LifecycleEvent, order: &Order, ctx: EventContext) -> BakeryResult<bool> {
        Ok(self
            .notifier
            .emit(event, order, ctx)
            .await?
            .is_some_and(|outcome| outcome.created))
    }
}
