//! HTTP surface for the bakery engine: order paths, escalation triggers and
//! the notification inbox, plus the server-side scan loop.

pub mod auth;
pub mod error;
pub mod rest;
pub mod scheduler;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use bakery_escalation::Bakery;

pub struct AppState {
    pub bakery: Bakery,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Escalation
        .route("/api/escalations/scan", post(rest::escalations::api_scan_all))
        .route("/api/escalations/{category}/scan", post(rest::escalations::api_scan))
        // Orders
        .route("/api/orders", post(rest::orders::api_register_order))
        .route("/api/orders/baking", post(rest::orders::api_create_baking_order))
        .route("/api/orders/{id}", get(rest::orders::api_order_detail))
        .route("/api/orders/{id}/transition", post(rest::orders::api_transition))
        .route("/api/orders/{id}/picking", post(rest::orders::api_picking_status))
        .route("/api/orders/{id}/baking", post(rest::orders::api_baking_status))
        .route("/api/orders/{id}/delivered", post(rest::orders::api_confirm_delivery))
        .route("/api/orders/{id}/not-delivered", post(rest::orders::api_report_not_delivered))
        // Notifications
        .route("/api/notifications", get(rest::notifications::api_notifications))
        .route(
            "/api/notifications/unread-count",
            get(rest::notifications::api_unread_count),
        )
        .route("/api/notifications/read-all", post(rest::notifications::api_mark_all_read))
        .route("/api/notifications/{id}/read", post(rest::notifications::api_mark_read))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Method + path + status + latency only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
