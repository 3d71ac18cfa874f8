use thiserror::Error;
use uuid::Uuid;

use crate::roles::Capability;
use crate::types::{OrderStatus, OrderType};

pub type BakeryResult<T> = Result<T, BakeryError>;

#[derive(Error, Debug)]
pub enum BakeryError {
    #[error("Invalid transition for {order_type} order: {from} -> {to} ({reason})")]
    InvalidTransition {
        order_type: OrderType,
        from: OrderStatus,
        to: OrderStatus,
        reason: String,
    },

    #[error("Concurrent modification of order {0}")]
    ConcurrentModification(Uuid),

    #[error("No trigger rule registered for event type '{0}'")]
    UnknownEventType(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("{actor} is not permitted to {capability}")]
    Forbidden { actor: String, capability: Capability },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl BakeryError {
    pub fn invalid_transition(
        order_type: OrderType,
        from: OrderStatus,
        to: OrderStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            order_type,
            from,
            to,
            reason: reason.into(),
        }
    }

    /// Errors that mean the persistence layer itself is failing, as opposed to
    /// a problem with one particular order.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}
