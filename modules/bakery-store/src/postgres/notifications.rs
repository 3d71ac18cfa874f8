use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use bakery_common::{
    BakeryError, BakeryResult, Notification, NotificationDraft, NotificationScope,
};

use super::{corrupt_row, store_err};
use crate::traits::NotificationStore;

const NOTIFICATION_COLUMNS: &str = "id, recipient_role, notification_type, message, \
     related_entity_id, link_url, priority, dedupe_key, is_read, created_at";

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_role: String,
    notification_type: String,
    message: String,
    related_entity_id: Option<Uuid>,
    link_url: Option<String>,
    priority: String,
    dedupe_key: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = BakeryError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            recipient_role: row.recipient_role.parse()?,
            notification_type: row.notification_type,
            message: row.message,
            related_entity_id: row.related_entity_id,
            link_url: row.link_url,
            priority: row.priority.parse()?,
            dedupe_key: row.dedupe_key,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

fn into_notifications(rows: Vec<NotificationRow>) -> BakeryResult<Vec<Notification>> {
    rows.into_iter()
        .map(|r| Notification::try_from(r).map_err(corrupt_row))
        .collect()
}

/// `None` means every role.
fn role_filter(scope: NotificationScope) -> Option<&'static str> {
    match scope {
        NotificationScope::Role(role) => Some(role.as_str()),
        NotificationScope::AllRoles => None,
    }
}

/// Notification store backed by the `notifications` table, whose unique index
/// on `dedupe_key` makes insert-if-absent atomic.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn select<'e, E>(
        executor: E,
        scope: NotificationScope,
        unread_only: bool,
        limit: usize,
    ) -> BakeryResult<Vec<Notification>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE ($1::text IS NULL OR recipient_role = $1)
              AND (NOT $2 OR is_read = false)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#
        ))
        .bind(role_filter(scope))
        .bind(unread_only)
        .bind(limit as i64)
        .fetch_all(executor)
        .await
        .map_err(store_err)?;

        into_notifications(rows)
    }

    async fn unread<'e, E>(executor: E, scope: NotificationScope) -> BakeryResult<u64>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE ($1::text IS NULL OR recipient_role = $1) AND is_read = false
            "#,
        )
        .bind(role_filter(scope))
        .fetch_one(executor)
        .await
        .map_err(store_err)?;

        Ok(count as u64)
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert_if_absent(
        &self,
        draft: NotificationDraft,
        now: DateTime<Utc>,
    ) -> BakeryResult<(bool, Notification)> {
        let candidate = draft.into_notification(now);

        let inserted = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"
            INSERT INTO notifications ({NOTIFICATION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (dedupe_key) DO NOTHING
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(candidate.id)
        .bind(candidate.recipient_role.as_str())
        .bind(&candidate.notification_type)
        .bind(&candidate.message)
        .bind(candidate.related_entity_id)
        .bind(&candidate.link_url)
        .bind(candidate.priority.as_str())
        .bind(&candidate.dedupe_key)
        .bind(candidate.is_read)
        .bind(candidate.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        if let Some(row) = inserted {
            return Ok((true, Notification::try_from(row).map_err(corrupt_row)?));
        }

        // Lost to an existing row with the same key; hand back that row.
        let existing = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE dedupe_key = $1"
        ))
        .bind(&candidate.dedupe_key)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok((false, Notification::try_from(existing).map_err(corrupt_row)?))
    }

    async fn list(
        &self,
        scope: NotificationScope,
        unread_only: bool,
        limit: usize,
    ) -> BakeryResult<Vec<Notification>> {
        Self::select(&self.pool, scope, unread_only, limit).await
    }

    async fn count_unread(&self, scope: NotificationScope) -> BakeryResult<u64> {
        Self::unread(&self.pool, scope).await
    }

    async fn list_with_unread_count(
        &self,
        scope: NotificationScope,
        unread_only: bool,
        limit: usize,
    ) -> BakeryResult<(Vec<Notification>, u64)> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        let notifications = Self::select(&mut *tx, scope, unread_only, limit).await?;
        let unread = Self::unread(&mut *tx, scope).await?;

        tx.commit().await.map_err(store_err)?;
        Ok((notifications, unread))
    }

    async fn mark_read(&self, id: Uuid) -> BakeryResult<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = true WHERE id = $1 AND is_read = false")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, scope: NotificationScope) -> BakeryResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET is_read = true
            WHERE ($1::text IS NULL OR recipient_role = $1) AND is_read = false
            "#,
        )
        .bind(role_filter(scope))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected())
    }
}
