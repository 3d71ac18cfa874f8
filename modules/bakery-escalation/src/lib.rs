//! Order escalation and deduplicated notification dispatch.
//!
//! [`Bakery`] wires the pieces together: the stage clock and lifecycle state
//! machine operate on the order store, the escalation processor and the order
//! service emit lifecycle events, and the trigger rules turn those into
//! notifications the dispatcher dedupes and persists.

pub mod clock;
pub mod dispatcher;
pub mod escalation;
pub mod lifecycle;
pub mod notifier;
pub mod notify;
pub mod rules;
pub mod service;
mod template;

use std::sync::Arc;

use typed_builder::TypedBuilder;

use bakery_common::FileConfig;
use bakery_store::{NotificationStore, OrderStore};

pub use clock::{Clock, ManualClock, StageClock, SystemClock};
pub use dispatcher::{DispatchOutcome, Inbox, NotificationDispatcher};
pub use escalation::{EscalationAction, EscalationProcessor, ScanReport};
pub use lifecycle::{OrderLifecycle, Transition, TransitionOutcome};
pub use notifier::EventNotifier;
pub use notify::{NoopBackend, NotifyBackend, NotifyRouter};
pub use rules::{EventContext, RuleSet};
pub use service::{NewBakingOrder, NewOrder, OrderService, OrderUpdate};

/// Everything a [`Bakery`] is built from.
#[derive(TypedBuilder)]
pub struct BakeryDeps {
    orders: Arc<dyn OrderStore>,
    notifications: Arc<dyn NotificationStore>,
    rules: RuleSet,
    #[builder(default)]
    config: FileConfig,
    #[builder(default = Arc::new(SystemClock) as Arc<dyn Clock>)]
    clock: Arc<dyn Clock>,
    #[builder(default = Arc::new(NoopBackend) as Arc<dyn NotifyBackend>)]
    backend: Arc<dyn NotifyBackend>,
}

/// The engine's entry points, sharing one set of stores.
pub struct Bakery {
    pub orders: OrderService,
    pub escalation: EscalationProcessor,
    pub notifications: Arc<NotificationDispatcher>,
}

impl Bakery {
    pub fn new(deps: BakeryDeps) -> Self {
        let BakeryDeps {
            orders,
            notifications,
            rules,
            config,
            clock,
            backend,
        } = deps;

        let dispatcher = Arc::new(NotificationDispatcher::new(
            notifications,
            clock.clone(),
            backend.clone(),
            config.notifications,
        ));
        let notifier = EventNotifier::new(Arc::new(rules), dispatcher.clone());
        let lifecycle = OrderLifecycle::new(orders.clone(), clock.clone());
        let stage_clock = StageClock::new(clock.clone(), config.escalation);

        Self {
            orders: OrderService::new(orders.clone(), lifecycle.clone(), notifier.clone(), clock),
            escalation: EscalationProcessor::new(orders, lifecycle, stage_clock, notifier, backend),
            notifications: dispatcher,
        }
    }
}
