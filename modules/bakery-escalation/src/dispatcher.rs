//! Deduplicated notification persistence and the inbox queries on top of it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use bakery_common::{
    Actor, BakeryResult, Capability, Notification, NotificationDraft, NotificationFilter,
    NotificationScope, NotificationSettings, Role,
};
use bakery_store::NotificationStore;

use crate::clock::Clock;
use crate::notify::NotifyBackend;

#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    /// False when a notification with the same dedupe key already existed.
    pub created: bool,
    pub notification: Notification,
}

/// A page of notifications and the unread count, read from one snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Inbox {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
}

pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    clock: Arc<dyn Clock>,
    backend: Arc<dyn NotifyBackend>,
    settings: NotificationSettings,
}

struct Page {
    scope: NotificationScope,
    unread_only: bool,
    limit: usize,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        clock: Arc<dyn Clock>,
        backend: Arc<dyn NotifyBackend>,
        settings: NotificationSettings,
    ) -> Self {
        Self {
            store,
            clock,
            backend,
            settings,
        }
    }

    /// Persist `draft` unless its dedupe key is already taken. Only newly
    /// created notifications are forwarded to the outbound backend.
    pub async fn dispatch(&self, draft: NotificationDraft) -> BakeryResult<DispatchOutcome> {
        let (created, notification) = self
            .store
            .insert_if_absent(draft, self.clock.now())
            .await?;

        if created {
            info!(
                notification_id = %notification.id,
                recipient = %notification.recipient_role,
                notification_type = %notification.notification_type,
                priority = %notification.priority,
                "Notification created"
            );
            self.forward(&notification).await;
        } else {
            debug!(dedupe_key = %notification.dedupe_key, "Duplicate notification suppressed");
        }

        Ok(DispatchOutcome {
            created,
            notification,
        })
    }

    async fn forward(&self, notification: &Notification) {
        if notification.priority < self.settings.forward_min_priority {
            return;
        }
        if let Err(e) = self.backend.send(notification).await {
            warn!(
                error = %e,
                notification_id = %notification.id,
                "Failed to forward notification"
            );
        }
    }

    fn page(&self, viewer: Role, filter: NotificationFilter) -> BakeryResult<Page> {
        Ok(match filter {
            NotificationFilter::Unread => Page {
                scope: NotificationScope::Role(viewer),
                unread_only: true,
                limit: self.settings.list_page_size,
            },
            NotificationFilter::All => Page {
                scope: NotificationScope::Role(viewer),
                unread_only: false,
                limit: self.settings.list_page_size,
            },
            NotificationFilter::AdminAll => {
                Actor::user(viewer).require(Capability::ViewAllNotifications)?;
                Page {
                    scope: NotificationScope::AllRoles,
                    unread_only: false,
                    limit: self.settings.admin_page_size,
                }
            }
        })
    }

    /// Newest first. `AdminAll` spans every role and is admin-only.
    pub async fn list(&self, viewer: Role, filter: NotificationFilter) -> BakeryResult<Vec<Notification>> {
        let page = self.page(viewer, filter)?;
        self.store.list(page.scope, page.unread_only, page.limit).await
    }

    pub async fn inbox(&self, viewer: Role, filter: NotificationFilter) -> BakeryResult<Inbox> {
        let page = self.page(viewer, filter)?;
        let (notifications, unread_count) = self
            .store
            .list_with_unread_count(page.scope, page.unread_only, page.limit)
            .await?;
        Ok(Inbox {
            notifications,
            unread_count,
        })
    }

    pub async fn unread_count(&self, viewer: Role) -> BakeryResult<u64> {
        self.store.count_unread(NotificationScope::Role(viewer)).await
    }

    /// Returns whether the notification flipped from unread to read.
    pub async fn mark_read(&self, id: Uuid) -> BakeryResult<bool> {
        self.store.mark_read(id).await
    }

    /// Returns how many notifications flipped.
    pub async fn mark_all_read(&self, viewer: Role) -> BakeryResult<u64> {
        let flipped = self.store.mark_all_read(NotificationScope::Role(viewer)).await?;
        debug!(role = %viewer, flipped, "Marked notifications read");
        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bakery_common::{BakeryError, Priority};
    use bakery_store::MemoryNotificationStore;
    use chrono::Duration;
    use std::sync::Mutex;

    use crate::clock::ManualClock;
    use crate::escalation::ScanReport;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl NotifyBackend for Recording {
        async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(notification.dedupe_key.clone());
            if self.fail {
                anyhow::bail!("webhook down");
            }
            Ok(())
        }

        async fn send_digest(&self, _report: &ScanReport) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn draft(key: &str, role: Role, priority: Priority) -> NotificationDraft {
        NotificationDraft {
            recipient_role: role,
            notification_type: "pickup_overdue".into(),
            message: "late".into(),
            related_entity_id: None,
            link_url: None,
            priority,
            dedupe_key: key.into(),
        }
    }

    fn dispatcher(backend: Arc<Recording>, clock: Arc<ManualClock>) -> NotificationDispatcher {
        NotificationDispatcher::new(
            Arc::new(MemoryNotificationStore::new()),
            clock,
            backend,
            NotificationSettings::default(),
        )
    }

    #[tokio::test]
    async fn duplicate_dispatch_keeps_first_notification() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let backend = Arc::new(Recording::default());
        let dispatcher = dispatcher(backend.clone(), clock.clone());

        let first = dispatcher.dispatch(draft("k", Role::StoreManager, Priority::High)).await.unwrap();
        assert!(first.created);
        dispatcher.mark_read(first.notification.id).await.unwrap();

        clock.advance(Duration::minutes(10));
        let second = dispatcher.dispatch(draft("k", Role::StoreManager, Priority::High)).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.notification.created_at, first.notification.created_at);
        assert!(second.notification.is_read);

        // Only the created one is forwarded.
        assert_eq!(backend.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_high_priority_is_forwarded_by_default() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let backend = Arc::new(Recording::default());
        let dispatcher = dispatcher(backend.clone(), clock);

        dispatcher.dispatch(draft("low", Role::Baker, Priority::Low)).await.unwrap();
        dispatcher.dispatch(draft("high", Role::Baker, Priority::High)).await.unwrap();

        assert_eq!(*backend.sent.lock().unwrap(), vec!["high".to_string()]);
    }

    #[tokio::test]
    async fn backend_failure_does_not_fail_dispatch() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let backend = Arc::new(Recording {
            fail: true,
            ..Default::default()
        });
        let dispatcher = dispatcher(backend, clock);

        let outcome = dispatcher.dispatch(draft("k", Role::Courier, Priority::High)).await.unwrap();
        assert!(outcome.created);
    }

    #[tokio::test]
    async fn admin_all_is_admin_only() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let dispatcher = dispatcher(Arc::new(Recording::default()), clock);
        dispatcher.dispatch(draft("a", Role::Baker, Priority::Low)).await.unwrap();
        dispatcher.dispatch(draft("b", Role::Picker, Priority::Low)).await.unwrap();

        let all = dispatcher.list(Role::Admin, NotificationFilter::AdminAll).await.unwrap();
        assert_eq!(all.len(), 2);

        let err = dispatcher
            .list(Role::StoreManager, NotificationFilter::AdminAll)
            .await
            .unwrap_err();
        assert!(matches!(err, BakeryError::Forbidden { .. }));

        let own = dispatcher.list(Role::Baker, NotificationFilter::All).await.unwrap();
        assert_eq!(own.len(), 1);
    }

    #[tokio::test]
    async fn inbox_and_mark_all_read() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let dispatcher = dispatcher(Arc::new(Recording::default()), clock.clone());
        for key in ["a", "b", "c"] {
            dispatcher.dispatch(draft(key, Role::Picker, Priority::Medium)).await.unwrap();
            clock.advance(Duration::seconds(1));
        }

        let inbox = dispatcher.inbox(Role::Picker, NotificationFilter::Unread).await.unwrap();
        assert_eq!(inbox.unread_count, 3);
        assert_eq!(inbox.notifications[0].dedupe_key, "c");

        assert_eq!(dispatcher.mark_all_read(Role::Picker).await.unwrap(), 3);
        assert_eq!(dispatcher.mark_all_read(Role::Picker).await.unwrap(), 0);
        assert_eq!(dispatcher.unread_count(Role::Picker).await.unwrap(), 0);
        assert!(dispatcher
            .list(Role::Picker, NotificationFilter::Unread)
            .await
            .unwrap()
            .is_empty());
    }
}
