//! Inbox endpoints. Clients poll these every ~30 s from many sessions, so
//! each is a single store query.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bakery_common::NotificationFilter;
use bakery_escalation::Inbox;

use crate::auth::StaffSession;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Deserialize)]
pub struct NotificationsQuery {
    filter: Option<NotificationFilter>,
}

#[derive(Serialize)]
pub struct UnreadCount {
    unread_count: u64,
}

#[derive(Serialize)]
pub struct Marked {
    marked: u64,
}

pub async fn api_notifications(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Query(params): Query<NotificationsQuery>,
) -> ApiResult<Json<Inbox>> {
    let filter = params.filter.unwrap_or(NotificationFilter::All);
    let inbox = state.bakery.notifications.inbox(session.role, filter).await?;
    Ok(Json(inbox))
}

pub async fn api_unread_count(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> ApiResult<Json<UnreadCount>> {
    let unread_count = state.bakery.notifications.unread_count(session.role).await?;
    Ok(Json(UnreadCount { unread_count }))
}

/// `marked` is 0 when the notification was already read or does not exist.
pub async fn api_mark_read(
    State(state): State<Arc<AppState>>,
    _session: StaffSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Marked>> {
    let flipped = state.bakery.notifications.mark_read(id).await?;
    Ok(Json(Marked {
        marked: u64::from(flipped),
    }))
}

pub async fn api_mark_all_read(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> ApiResult<Json<Marked>> {
    let marked = state.bakery.notifications.mark_all_read(session.role).await?;
    Ok(Json(Marked { marked }))
}
