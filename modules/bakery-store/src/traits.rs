use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use bakery_common::{BakeryResult, Notification, NotificationDraft, NotificationScope, Order};

use crate::query::OverdueQuery;

/// Order persistence. Implemented by `PgOrderStore` (postgres) and
/// `MemoryOrderStore` (tests).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order. Fails with `Validation` if the order number is taken.
    async fn insert(&self, order: &Order) -> BakeryResult<()>;

    async fn get(&self, id: Uuid) -> BakeryResult<Option<Order>>;

    /// Conditional write: replaces the stored order only if its version still
    /// equals `expected_version`. The stored copy gets `expected_version + 1`.
    ///
    /// Fails with `ConcurrentModification` when the version moved on and
    /// `OrderNotFound` when the order is gone.
    async fn update(&self, order: &Order, expected_version: i64) -> BakeryResult<Order>;

    /// Orders that may be overdue for one escalation category, oldest stage
    /// entry first, capped at `query.limit`.
    async fn list_overdue_candidates(&self, query: &OverdueQuery) -> BakeryResult<Vec<Order>>;

    /// Atomically claim the next order number for `prefix` (`""` for harvested
    /// orders, `"B"` for baking tasks). The number is one above both the
    /// highest number ever claimed and the highest existing order number.
    async fn claim_order_number(&self, prefix: &str) -> BakeryResult<String>;
}

/// Notification persistence. Implemented by `PgNotificationStore` (postgres)
/// and `MemoryNotificationStore` (tests).
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert unless a notification with the same dedupe key exists. Returns
    /// `(true, new)` on insert and `(false, existing)` otherwise. The check and
    /// the insert are one atomic step.
    async fn insert_if_absent(
        &self,
        draft: NotificationDraft,
        now: DateTime<Utc>,
    ) -> BakeryResult<(bool, Notification)>;

    /// Newest first.
    async fn list(
        &self,
        scope: NotificationScope,
        unread_only: bool,
        limit: usize,
    ) -> BakeryResult<Vec<Notification>>;

    async fn count_unread(&self, scope: NotificationScope) -> BakeryResult<u64>;

    /// `list` and `count_unread` read from one snapshot.
    async fn list_with_unread_count(
        &self,
        scope: NotificationScope,
        unread_only: bool,
        limit: usize,
    ) -> BakeryResult<(Vec<Notification>, u64)>;

    /// Returns true if the notification flipped from unread to read.
    async fn mark_read(&self, id: Uuid) -> BakeryResult<bool>;

    /// Returns the number of notifications that flipped to read.
    async fn mark_all_read(&self, scope: NotificationScope) -> BakeryResult<u64>;
}

// ---------------------------------------------------------------------------
// Arc<S> blankets
// ---------------------------------------------------------------------------

#[async_trait]
impl<S: OrderStore + ?Sized> OrderStore for Arc<S> {
    async fn insert(&self, order: &Order) -> BakeryResult<()> {
        (**self).insert(order).await
    }

    async fn get(&self, id: Uuid) -> BakeryResult<Option<Order>> {
        (**self).get(id).await
    }

    async fn update(&self, order: &Order, expected_version: i64) -> BakeryResult<Order> {
        (**self).update(order, expected_version).await
    }

    async fn list_overdue_candidates(&self, query: &OverdueQuery) -> BakeryResult<Vec<Order>> {
        (**self).list_overdue_candidates(query).await
    }

    async fn claim_order_number(&self, prefix: &str) -> BakeryResult<String> {
        (**self).claim_order_number(prefix).await
    }
}

#[async_trait]
impl<S: NotificationStore + ?Sized> NotificationStore for Arc<S> {
    async fn insert_if_absent(
        &self,
        draft: NotificationDraft,
        now: DateTime<Utc>,
    ) -> BakeryResult<(bool, Notification)> {
        (**self).insert_if_absent(draft, now).await
    }

    async fn list(
        &self,
        scope: NotificationScope,
        unread_only: bool,
        limit: usize,
    ) -> BakeryResult<Vec<Notification>> {
        (**self).list(scope, unread_only, limit).await
    }

    async fn count_unread(&self, scope: NotificationScope) -> BakeryResult<u64> {
        (**self).count_unread(scope).await
    }

    async fn list_with_unread_count(
        &self,
        scope: NotificationScope,
        unread_only: bool,
        limit: usize,
    ) -> BakeryResult<(Vec<Notification>, u64)> {
        (**self).list_with_unread_count(scope, unread_only, limit).await
    }

    async fn mark_read(&self, id: Uuid) -> BakeryResult<bool> {
        (**self).mark_read(id).await
    }

    async fn mark_all_read(&self, scope: NotificationScope) -> BakeryResult<u64> {
        (**self).mark_all_read(scope).await
    }
}
