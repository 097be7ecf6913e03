//! Integration tests for the fulfillment API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

use event_store::InMemoryEventStore;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    let store = InMemoryEventStore::new();
    let (state, _processor) = api::create_default_state(store, api::Config::default());
    api::create_app(state, get_metrics_handle())
}

fn intake_body(order_number: &str, kind_hint: &str, product_ref: &str) -> serde_json::Value {
    serde_json::json!({
        "order_number": order_number,
        "payment_id": "pay-1",
        "customer": {
            "customer_id": "cust-1",
            "email": "ada@example.com",
            "name": "Ada"
        },
        "items": [{
            "product_ref": product_ref,
            "product_name": "Test Product",
            "quantity": 1,
            "kind_hint": kind_hint,
            "shipping_address": {
                "name": "Ada Lovelace",
                "line1": "1 Analytical Way",
                "city": "London",
                "postal_code": "N1 9GU",
                "country": "GB"
            }
        }]
    })
}

async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> axum::http::Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_digital_intake_fulfills_and_exposes_access_link() {
    let app = setup();

    let response = post_json(
        &app,
        "/fulfillment/orders",
        intake_body("SO-API-1", "digital-course", "course-intro"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let (status, order) = get_json(&app, "/fulfillment/orders/SO-API-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "fulfilled");
    assert_eq!(order["items"][0]["status"], "fulfilled");
    assert_eq!(
        order["items"][0]["access_url"],
        "https://learn.example/courses/course-intro"
    );
}

#[tokio::test]
async fn test_duplicate_intake_returns_existing_order() {
    let app = setup();

    let body = intake_body("SO-API-2", "digital-course", "course-intro");
    let first = post_json(&app, "/fulfillment/orders", body.clone()).await;
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = post_json(&app, "/fulfillment/orders", body).await;
    assert_eq!(second.status(), StatusCode::ACCEPTED);

    // The audit log shows one OrderReceived, not two.
    let (status, events) = get_json(&app, "/fulfillment/orders/SO-API-2/events").await;
    assert_eq!(status, StatusCode::OK);
    let received_count = events
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["event_type"] == "OrderReceived")
        .count();
    assert_eq!(received_count, 1);
}

#[tokio::test]
async fn test_unknown_kind_hint_is_bad_request() {
    let app = setup();

    let response = post_json(
        &app,
        "/fulfillment/orders",
        intake_body("SO-API-3", "hologram", "course-intro"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let app = setup();
    let (status, _) = get_json(&app, "/fulfillment/orders/SO-MISSING").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_requires_valid_token() {
    let app = setup();

    let payload = serde_json::json!({
        "event": "order.updated", "order_id": "P-1", "status": "shipped"
    });

    // Missing token
    let response = post_json(&app, "/webhooks/printling", payload.clone()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong token
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/printling")
                .header("content-type", "application/json")
                .header("x-webhook-token", "wrong")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Unknown supplier path
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/acme")
                .header("content-type", "application/json")
                .header("x-webhook-token", "dev-printling-token")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pod_order_ships_via_webhook() {
    let app = setup();

    let response = post_json(
        &app,
        "/fulfillment/orders",
        intake_body("SO-API-4", "pod-printling", "poster-a2"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let (_, order) = get_json(&app, "/fulfillment/orders/SO-API-4").await;
    assert_eq!(order["items"][0]["status"], "pending-supplier");
    let external_order_id = order["items"][0]["external_order_id"]
        .as_str()
        .unwrap()
        .to_string();

    let webhook = serde_json::json!({
        "event": "order.updated",
        "order_id": external_order_id,
        "status": "shipped",
        "shipment": {"carrier": "UPS", "tracking_number": "TRK123", "tracking_url": null}
    });
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/printling")
                .header("content-type", "application/json")
                .header("x-webhook-token", "dev-printling-token")
                .body(Body::from(webhook.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let ack: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(ack["outcome"], "applied");

    let (_, order) = get_json(&app, "/fulfillment/orders/SO-API-4").await;
    assert_eq!(order["items"][0]["status"], "shipped");
    assert_eq!(order["items"][0]["tracking_number"], "TRK123");
}

#[tokio::test]
async fn test_unclaimed_webhook_is_acknowledged_and_dropped() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/printling")
                .header("content-type", "application/json")
                .header("x-webhook-token", "dev-printling-token")
                .body(Body::from(serde_json::json!({"hello": "world"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let ack: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(ack["outcome"], "unclaimed");
}

#[tokio::test]
async fn test_dropship_confirmation_flow() {
    let app = setup();

    let body = serde_json::json!({
        "order_number": "SO-API-5",
        "payment_id": "pay-5",
        "customer": {
            "customer_id": "cust-5",
            "email": "grace@example.com",
            "name": "Grace"
        },
        "items": [{
            "product_ref": "opal-lamp-01",
            "product_name": "Opal Lamp",
            "quantity": 1,
            "kind_hint": "dropship",
            "shipping_address": {
                "name": "Grace Hopper",
                "line1": "1 Navy Way",
                "city": "Arlington",
                "postal_code": "22202",
                "country": "US"
            }
        }]
    });
    let response = post_json(&app, "/fulfillment/orders", body).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // The item surfaces on the attention queue.
    let (status, entries) = get_json(&app, "/fulfillment/attention").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["reason"], "manual-confirmation");

    // Operator confirms with tracking.
    let response = post_json(
        &app,
        "/fulfillment/orders/SO-API-5/items/0/confirm",
        serde_json::json!({
            "carrier": "USPS",
            "tracking_number": "940055",
            "confirmed_by": "ops@example.com"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (_, order) = get_json(&app, "/fulfillment/orders/SO-API-5").await;
    assert_eq!(order["items"][0]["status"], "shipped");

    let (_, entries) = get_json(&app, "/fulfillment/attention").await;
    assert!(entries.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_revoke_digital_item() {
    let app = setup();

    post_json(
        &app,
        "/fulfillment/orders",
        intake_body("SO-API-6", "digital-course", "course-intro"),
    )
    .await;

    let response = post_json(
        &app,
        "/fulfillment/orders/SO-API-6/items/0/revoke",
        serde_json::json!({"reason": "chargeback"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (_, order) = get_json(&app, "/fulfillment/orders/SO-API-6").await;
    assert_eq!(order["items"][0]["revoked"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
