use std::sync::Arc;

use tracing::{debug, warn};

use bakery_common::{BakeryError, BakeryResult, LifecycleEvent, Order};

use crate::dispatcher::{DispatchOutcome, NotificationDispatcher};
use crate::rules::{EventContext, RuleSet};

/// Turns lifecycle events into dispatched notifications: rule lookup, then
/// dedupe and persist.
#[derive(Clone)]
pub struct EventNotifier {
    rules: Arc<RuleSet>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl EventNotifier {
    pub fn new(rules: Arc<RuleSet>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { rules, dispatcher }
    }

    /// `Ok(None)` when no notification applies: the event has no rule (logged)
    /// or its rule selects nobody for this order.
    pub async fn emit(
        &self,
        event: LifecycleEvent,
        order: &Order,
        ctx: EventContext,
    ) -> BakeryResult<Option<DispatchOutcome>> {
        let draft = match self.rules.resolve(event, order, &ctx) {
            Ok(Some(draft)) => draft,
            Ok(None) => {
                debug!(event = %event, order_id = %order.id, "Rule selected no recipient");
                return Ok(None);
            }
            Err(BakeryError::UnknownEventType(event_type)) => {
                warn!(
                    event_type = %event_type,
                    order_id = %order.id,
                    "No trigger rule for event, skipping notification"
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.dispatcher.dispatch(draft).await.map(Some)
    }
}
