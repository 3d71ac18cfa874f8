//! Router tests against the in-memory stores.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use bakery_api::{router, AppState};
use bakery_common::{LineItem, Order, OrderStatus, OrderType, PickingStatus};
use bakery_escalation::{Bakery, BakeryDeps, ManualClock, RuleSet};
use bakery_store::{MemoryNotificationStore, MemoryOrderStore, OrderStore};

struct TestApp {
    router: Router,
    orders: Arc<MemoryOrderStore>,
}

fn test_app() -> TestApp {
    let orders = Arc::new(MemoryOrderStore::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap(),
    ));
    let bakery = Bakery::new(
        BakeryDeps::builder()
            .orders(orders.clone())
            .notifications(Arc::new(MemoryNotificationStore::new()))
            .rules(RuleSet::defaults().unwrap())
            .clock(clock)
            .build(),
    );
    TestApp {
        router: router(Arc::new(AppState { bakery })),
        orders,
    }
}

async fn request(
    app: &TestApp,
    method: Method,
    uri: &str,
    role: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        builder = builder.header("x-bakery-role", role);
    }
    let req = match body {
        Some(payload) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&payload).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn overdue_pickup(app: &TestApp) -> Order {
    let ready_at = Utc.with_ymd_and_hms(2026, 3, 3, 10, 0, 0).unwrap();
    let mut order = Order::new(
        "4100",
        OrderType::Pickup,
        vec![LineItem::new("Sourdough", 1, 6.5)],
        ready_at - Duration::hours(1),
    );
    order.status = OrderStatus::ReadyForPickup;
    order.picking_status = PickingStatus::Done;
    order.ready_for_pickup_at = Some(ready_at);
    app.orders.insert(&order).await.unwrap();
    order
}

#[tokio::test]
async fn health_check_needs_no_role() {
    let app = test_app();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_or_unknown_role_is_unauthorized() {
    let app = test_app();
    let (status, _) = request(&app, Method::GET, "/api/notifications", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) =
        request(&app, Method::GET, "/api/notifications", Some("owner"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unknown role");
}

#[tokio::test]
async fn scan_requires_trigger_capability() {
    let app = test_app();
    let (status, _) = request(
        &app,
        Method::POST,
        "/api/escalations/pickup/scan",
        Some("picker"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) =
        request(&app, Method::POST, "/api/escalations/scan", Some("courier"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_category_is_not_found() {
    let app = test_app();
    let (status, _) = request(
        &app,
        Method::POST,
        "/api/escalations/catering/scan",
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pickup_scan_reaches_store_manager_inbox() {
    let app = test_app();
    let order = overdue_pickup(&app).await;

    let (status, report) = request(
        &app,
        Method::POST,
        "/api/escalations/pickup/scan",
        Some("store_manager"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["processed_count"], 1);
    assert_eq!(report["orders"][0]["action"]["kind"], "rescheduled");
    assert_eq!(report["orders"][0]["action"]["to"], "2026-03-04");

    let (status, count) = request(
        &app,
        Method::GET,
        "/api/notifications/unread-count",
        Some("store_manager"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count["unread_count"], 1);

    let (_, inbox) = request(
        &app,
        Method::GET,
        "/api/notifications?filter=unread",
        Some("store_manager"),
        None,
    )
    .await;
    let notification = &inbox["notifications"][0];
    assert_eq!(notification["type"], "pickup_overdue");
    assert_eq!(notification["related_entity_id"], order.id.to_string());

    let uri = format!("/api/notifications/{}/read", notification["id"].as_str().unwrap());
    let (_, marked) = request(&app, Method::POST, &uri, Some("store_manager"), None).await;
    assert_eq!(marked["marked"], 1);
    let (_, marked) = request(&app, Method::POST, &uri, Some("store_manager"), None).await;
    assert_eq!(marked["marked"], 0);

    // Other roles see nothing.
    let (_, inbox) =
        request(&app, Method::GET, "/api/notifications", Some("picker"), None).await;
    assert_eq!(inbox["unread_count"], 0);
    assert!(inbox["notifications"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admin_all_is_admin_only() {
    let app = test_app();
    let (status, _) = request(
        &app,
        Method::GET,
        "/api/notifications?filter=admin_all",
        Some("store_manager"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = request(
        &app,
        Method::GET,
        "/api/notifications?filter=admin_all",
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn baking_order_is_created_and_announced() {
    let app = test_app();
    let (status, update) = request(
        &app,
        Method::POST,
        "/api/orders/baking",
        Some("baker"),
        Some(json!({
            "items": [
                { "product_name": "Rye", "quantity": 4, "line_total": 0.0 },
                { "product_name": "Spelt", "quantity": 2, "line_total": 0.0 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(update["order"]["order_number"], "B1");
    assert_eq!(update["notification"]["created"], true);
    assert_eq!(update["notification"]["notification"]["recipient_role"], "baker");

    let (_, count) = request(
        &app,
        Method::GET,
        "/api/notifications/unread-count",
        Some("baker"),
        None,
    )
    .await;
    assert_eq!(count["unread_count"], 1);

    let (_, marked) = request(
        &app,
        Method::POST,
        "/api/notifications/read-all",
        Some("baker"),
        None,
    )
    .await;
    assert_eq!(marked["marked"], 1);
}

#[tokio::test]
async fn transition_errors_map_to_statuses() {
    let app = test_app();
    let (status, created) = request(
        &app,
        Method::POST,
        "/api/orders",
        Some("admin"),
        Some(json!({
            "order_number": "9001",
            "order_type": "delivery",
            "items": [{ "product_name": "Bagel", "quantity": 6, "line_total": 9.0 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["order"]["id"].as_str().unwrap().to_string();

    // Not a step on the path.
    let (status, _) = request(
        &app,
        Method::POST,
        &format!("/api/orders/{id}/transition"),
        Some("admin"),
        Some(json!({ "from": "received", "to": "delivered" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Stale `from`.
    let (status, _) = request(
        &app,
        Method::POST,
        &format!("/api/orders/{id}/transition"),
        Some("picker"),
        Some(json!({ "from": "picking", "to": "out_for_delivery" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = request(
        &app,
        Method::POST,
        &format!("/api/orders/{id}/transition"),
        Some("courier"),
        Some(json!({ "from": "received", "to": "picking" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, update) = request(
        &app,
        Method::POST,
        &format!("/api/orders/{id}/transition"),
        Some("picker"),
        Some(json!({ "from": "received", "to": "picking" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["order"]["status"], "picking");

    let (status, update) = request(
        &app,
        Method::POST,
        &format!("/api/orders/{id}/picking"),
        Some("picker"),
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["order"]["picking_status"], "in_progress");

    let (status, order) =
        request(&app, Method::GET, &format!("/api/orders/{id}"), Some("courier"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["version"], 3);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let app = test_app();
    let (status, _) = request(
        &app,
        Method::GET,
        &format!("/api/orders/{}", uuid::Uuid::new_v4()),
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn store_outage_is_service_unavailable() {
    let app = test_app();
    overdue_pickup(&app).await;
    app.orders.set_unavailable(true);

    let (status, _) = request(
        &app,
        Method::POST,
        "/api/escalations/pickup/scan",
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn invalid_order_is_bad_request() {
    let app = test_app();
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/orders",
        Some("store_manager"),
        Some(json!({
            "order_number": "A-17",
            "order_type": "pickup",
            "items": [{ "product_name": "Bun", "quantity": 1, "line_total": 1.0 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("numeric"));
}
