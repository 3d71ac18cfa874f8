use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use bakery_common::{BakingStatus, Order, PickingStatus};
use bakery_escalation::{NewBakingOrder, NewOrder, OrderUpdate, Transition};

use crate::auth::StaffSession;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Deserialize)]
pub struct StatusBody<T> {
    status: T,
}

pub async fn api_register_order(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Json(body): Json<NewOrder>,
) -> ApiResult<(StatusCode, Json<OrderUpdate>)> {
    let update = state.bakery.orders.register_order(body, &session.actor).await?;
    Ok((StatusCode::CREATED, Json(update)))
}

pub async fn api_create_baking_order(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Json(body): Json<NewBakingOrder>,
) -> ApiResult<(StatusCode, Json<OrderUpdate>)> {
    let update = state
        .bakery
        .orders
        .create_baking_order(body, &session.actor)
        .await?;
    Ok((StatusCode::CREATED, Json(update)))
}

pub async fn api_order_detail(
    State(state): State<Arc<AppState>>,
    _session: StaffSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.bakery.orders.get(id).await?))
}

pub async fn api_transition(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<Uuid>,
    Json(transition): Json<Transition>,
) -> ApiResult<Json<OrderUpdate>> {
    let update = state
        .bakery
        .orders
        .transition(id, transition, &session.actor)
        .await?;
    Ok(Json(update))
}

pub async fn api_picking_status(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody<PickingStatus>>,
) -> ApiResult<Json<OrderUpdate>> {
    let update = state
        .bakery
        .orders
        .set_picking_status(id, body.status, &session.actor)
        .await?;
    Ok(Json(update))
}

pub async fn api_baking_status(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody<BakingStatus>>,
) -> ApiResult<Json<OrderUpdate>> {
    let update = state
        .bakery
        .orders
        .set_baking_status(id, body.status, &session.actor)
        .await?;
    Ok(Json(update))
}

pub async fn api_confirm_delivery(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderUpdate>> {
    let update = state.bakery.orders.confirm_delivery(id, &session.actor).await?;
    Ok(Json(update))
}

pub async fn api_report_not_delivered(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderUpdate>> {
    let update = state
        .bakery
        .orders
        .report_not_delivered(id, &session.actor)
        .await?;
    Ok(Json(update))
}
