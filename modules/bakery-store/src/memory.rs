//! In-memory stores for tests and local runs. No database required.
//!
//! Each operation takes one lock for its whole read-check-write, which gives
//! the same atomicity the postgres statements give.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use bakery_common::{
    BakeryError, BakeryResult, Notification, NotificationDraft, NotificationScope, Order,
};

use crate::query::OverdueQuery;
use crate::traits::{NotificationStore, OrderStore};

// ---------------------------------------------------------------------------
// MemoryOrderStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<HashMap<Uuid, Order>>,
    sequences: Mutex<HashMap<String, i64>>,
    failing: Mutex<HashSet<Uuid>>,
    conflict_once: Mutex<HashSet<Uuid>>,
    unavailable: Mutex<bool>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored orders (for test assertions).
    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().unwrap().values().cloned().collect()
    }

    /// Make every update of `id` fail as if the database were down.
    pub fn fail_updates_for(&self, id: Uuid) {
        self.failing.lock().unwrap().insert(id);
    }

    /// Simulate another writer winning the race on the next update of `id`.
    pub fn conflict_next_update(&self, id: Uuid) {
        self.conflict_once.lock().unwrap().insert(id);
    }

    /// Make every operation fail with `StoreUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    fn check_available(&self) -> BakeryResult<()> {
        if *self.unavailable.lock().unwrap() {
            return Err(BakeryError::StoreUnavailable("memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> BakeryResult<()> {
        self.check_available()?;
        let mut orders = self.orders.lock().unwrap();
        if orders.values().any(|o| o.order_number == order.order_number) {
            return Err(BakeryError::Validation(format!(
                "order number {} already exists",
                order.order_number
            )));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> BakeryResult<Option<Order>> {
        self.check_available()?;
        Ok(self.orders.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, order: &Order, expected_version: i64) -> BakeryResult<Order> {
        self.check_available()?;
        if self.failing.lock().unwrap().contains(&order.id) {
            return Err(BakeryError::StoreUnavailable(format!(
                "injected failure for order {}",
                order.id
            )));
        }

        let mut orders = self.orders.lock().unwrap();
        let stored = orders
            .get_mut(&order.id)
            .ok_or(BakeryError::OrderNotFound(order.id))?;

        if self.conflict_once.lock().unwrap().remove(&order.id) {
            stored.version += 1;
        }
        if stored.version != expected_version {
            return Err(BakeryError::ConcurrentModification(order.id));
        }

        let mut next = order.clone();
        next.version = expected_version + 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn list_overdue_candidates(&self, query: &OverdueQuery) -> BakeryResult<Vec<Order>> {
        self.check_available()?;
        let mut candidates: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();
        candidates.sort_by_key(|o| query.stage_entered_at(o));
        candidates.truncate(query.limit);
        Ok(candidates)
    }

    async fn claim_order_number(&self, prefix: &str) -> BakeryResult<String> {
        self.check_available()?;
        // Lock order matches `insert` callers: orders first, then sequences.
        let orders = self.orders.lock().unwrap();
        let mut sequences = self.sequences.lock().unwrap();

        let existing_max = orders
            .values()
            .filter_map(|o| numeric_suffix(&o.order_number, prefix))
            .max()
            .unwrap_or(0);
        let last = sequences.entry(prefix.to_string()).or_insert(0);
        *last = (*last + 1).max(existing_max + 1);
        Ok(format!("{prefix}{last}"))
    }
}

/// `B12` with prefix `B` → 12. Numbers with any other prefix → None.
fn numeric_suffix(order_number: &str, prefix: &str) -> Option<i64> {
    let digits = order_number.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

// ---------------------------------------------------------------------------
// MemoryNotificationStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryNotificationStore {
    notifications: Mutex<Vec<Notification>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored notifications in insertion order (for test assertions).
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    fn select(
        all: &[Notification],
        scope: NotificationScope,
        unread_only: bool,
        limit: usize,
    ) -> Vec<Notification> {
        let mut selected: Vec<Notification> = all
            .iter()
            .filter(|n| scope.includes(n.recipient_role) && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        // Insertion order breaks created_at ties, newest first.
        selected.reverse();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        selected.truncate(limit);
        selected
    }

    fn unread(all: &[Notification], scope: NotificationScope) -> u64 {
        all.iter()
            .filter(|n| scope.includes(n.recipient_role) && !n.is_read)
            .count() as u64
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert_if_absent(
        &self,
        draft: NotificationDraft,
        now: DateTime<Utc>,
    ) -> BakeryResult<(bool, Notification)> {
        let mut all = self.notifications.lock().unwrap();
        if let Some(existing) = all.iter().find(|n| n.dedupe_key == draft.dedupe_key) {
            return Ok((false, existing.clone()));
        }
        let notification = draft.into_notification(now);
        all.push(notification.clone());
        Ok((true, notification))
    }

    async fn list(
        &self,
        scope: NotificationScope,
        unread_only: bool,
        limit: usize,
    ) -> BakeryResult<Vec<Notification>> {
        let all = self.notifications.lock().unwrap();
        Ok(Self::select(&all, scope, unread_only, limit))
    }

    async fn count_unread(&self, scope: NotificationScope) -> BakeryResult<u64> {
        let all = self.notifications.lock().unwrap();
        Ok(Self::unread(&all, scope))
    }

    async fn list_with_unread_count(
        &self,
        scope: NotificationScope,
        unread_only: bool,
        limit: usize,
    ) -> BakeryResult<(Vec<Notification>, u64)> {
        let all = self.notifications.lock().unwrap();
        Ok((
            Self::select(&all, scope, unread_only, limit),
            Self::unread(&all, scope),
        ))
    }

    async fn mark_read(&self, id: Uuid) -> BakeryResult<bool> {
        let mut all = self.notifications.lock().unwrap();
        match all.iter_mut().find(|n| n.id == id && !n.is_read) {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, scope: NotificationScope) -> BakeryResult<u64> {
        let mut all = self.notifications.lock().unwrap();
        let mut flipped = 0;
        for n in all
            .iter_mut()
            .filter(|n| scope.includes(n.recipient_role) && !n.is_read)
        {
            n.is_read = true;
            flipped += 1;
        }
        Ok(flipped)
    }
}
