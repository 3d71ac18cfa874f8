use chrono::{DateTime, NaiveDate, Utc};

use bakery_common::{BakingStatus, EscalationCategory, Order, OrderStatus};

/// Coarse pre-filter for escalation candidates. The stage clock computes the
/// cutoffs; the store only applies them. Callers re-check each returned order
/// against the exact deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct OverdueQuery {
    pub category: EscalationCategory,
    /// Stage entry time must be before this (now minus the category window).
    pub entered_before: DateTime<Utc>,
    /// Pickup orders with an expected date strictly before this day are overdue.
    pub pickup_date_before: NaiveDate,
    /// Orders already escalated in this bucket are left out.
    pub bucket: NaiveDate,
    pub limit: usize,
}

impl OverdueQuery {
    /// In-memory version of the SQL predicate in `PgOrderStore`.
    pub fn matches(&self, order: &Order) -> bool {
        if order.last_overdue_bucket == Some(self.bucket) {
            return false;
        }
        match self.category {
            EscalationCategory::Pickup => {
                order.status == OrderStatus::ReadyForPickup
                    && match order.expected_pickup_date {
                        Some(date) => date < self.pickup_date_before,
                        None => order
                            .ready_for_pickup_at
                            .is_some_and(|t| t < self.entered_before),
                    }
            }
            EscalationCategory::Delivery => {
                order.status == OrderStatus::OutForDelivery
                    && order
                        .out_for_delivery_at
                        .is_some_and(|t| t < self.entered_before)
            }
            EscalationCategory::Baking => {
                order.status == OrderStatus::Baking
                    && order.baking_status != Some(BakingStatus::Done)
                    && order
                        .baking_started_at
                        .is_some_and(|t| t < self.entered_before)
            }
        }
    }

    /// Sort key matching the SQL `ORDER BY`.
    pub fn stage_entered_at(&self, order: &Order) -> Option<DateTime<Utc>> {
        match self.category {
            EscalationCategory::Pickup => order.ready_for_pickup_at,
            EscalationCategory::Delivery => order.out_for_delivery_at,
            EscalationCategory::Baking => order.baking_started_at,
        }
    }
}
