use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use seatwise_api::metrics::Metrics;
use seatwise_api::{app, AppState, Backends};
use seatwise_catalog::{InMemoryCatalog, NewShowtime, Showtime};
use seatwise_store::app_config::BusinessRules;
use seatwise_store::BroadcastPublisher;

struct TestApp {
    router: Router,
    showtime: Showtime,
}

async fn test_app() -> TestApp {
    let start = Utc::now() + Duration::days(1);
    let showtime = NewShowtime {
        movie_id: Uuid::new_v4(),
        theater_id: Uuid::new_v4(),
        screen_id: Uuid::new_v4(),
        start_time: start,
        end_time: start + Duration::hours(2),
        base_price: 200,
        layout: None,
    }
    .into_showtime()
    .unwrap();

    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert(showtime.clone()).await;

    let backends = Backends::in_memory(catalog);
    let metrics = Arc::new(Metrics::new().unwrap());
    let state = AppState::new(&backends, &BusinessRules::default(), BroadcastPublisher::default(), metrics);

    TestApp {
        router: app(state),
        showtime,
    }
}

async fn send(router: &Router, method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn book(app: &TestApp, user: Uuid, seats: &[&str]) -> (StatusCode, Value) {
    send(
        &app.router,
        "POST",
        "/v1/bookings",
        Some(user),
        Some(json!({ "showtime_id": app.showtime.id, "seats": seats })),
    )
    .await
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, body) = send(&app.router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_booking_and_conflict() {
    let app = test_app().await;

    let (status, body) = book(&app, Uuid::new_v4(), &["A1", "A2"]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["total_amount"], 400);
    assert!(body["hold_remaining_seconds"].as_i64().unwrap() > 14 * 60);

    let (status, body) = book(&app, Uuid::new_v4(), &["A2", "A3"]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("A2"));

    let (status, body) = send(&app.router, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("seatwise_bookings_created_total 1"));
    assert!(text.contains("seatwise_seat_conflicts_total 1"));
}

#[tokio::test]
async fn test_requests_are_validated() {
    let app = test_app().await;

    let (status, _) = send(
        &app.router,
        "POST",
        "/v1/bookings",
        None,
        Some(json!({ "showtime_id": app.showtime.id, "seats": ["A1"] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = book(&app, Uuid::new_v4(), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        "POST",
        "/v1/bookings",
        Some(Uuid::new_v4()),
        Some(json!({ "showtime_id": Uuid::new_v4(), "seats": ["A1"] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_flow() {
    let app = test_app().await;
    let owner = Uuid::new_v4();

    let (_, body) = book(&app, owner, &["B1"]).await;
    let booking_id = body["id"].as_str().unwrap().to_string();
    let cancel_uri = format!("/v1/bookings/{}/cancel", booking_id);

    let (status, _) = send(&app.router, "POST", &cancel_uri, Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app.router, "POST", &cancel_uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "CANCELLED");

    let (status, body) = send(&app.router, "POST", &cancel_uri, Some(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ALREADY_CANCELLED");

    let seats_uri = format!("/v1/showtimes/{}/seats", app.showtime.id);
    let (_, body) = send(&app.router, "GET", &seats_uri, None, None).await;
    assert!(body["seats"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_payment_flow_confirms_booking() {
    let app = test_app().await;
    let owner = Uuid::new_v4();

    let (_, body) = book(&app, owner, &["C1"]).await;
    let booking_id = body["id"].as_str().unwrap().to_string();

    let (status, tx) = send(
        &app.router,
        "POST",
        "/v1/transactions",
        Some(owner),
        Some(json!({ "booking_id": booking_id, "payment_method": "UPI" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tx["status"], "INITIATED");

    let (status, _) = send(
        &app.router,
        "POST",
        "/v1/transactions",
        Some(owner),
        Some(json!({ "booking_id": booking_id, "payment_method": "WALLET" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let outcome_uri = format!("/v1/transactions/{}/outcome", tx["id"].as_str().unwrap());
    let (status, settled) = send(
        &app.router,
        "POST",
        &outcome_uri,
        None,
        Some(json!({ "outcome": "SUCCESS", "gateway_reference": "gw-123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settled["status"], "SUCCESS");
    assert_eq!(settled["gateway_reference"], "gw-123");

    let (_, booking) = send(&app.router, "GET", &format!("/v1/bookings/{}", booking_id), Some(owner), None).await;
    assert_eq!(booking["status"], "CONFIRMED");
    assert_eq!(booking["hold_remaining_seconds"], 0);

    let (_, seats) = send(
        &app.router,
        "GET",
        &format!("/v1/showtimes/{}/seats", app.showtime.id),
        None,
        None,
    )
    .await;
    assert_eq!(seats["seats"]["C1"]["state"], "CONFIRMED");

    let (_, history) = send(
        &app.router,
        "GET",
        &format!("/v1/bookings/{}/transactions", booking_id),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_admin_refund() {
    let app = test_app().await;
    let owner = Uuid::new_v4();

    let (_, body) = book(&app, owner, &["D1"]).await;
    let booking_id = body["id"].as_str().unwrap().to_string();
    let status_uri = format!("/v1/admin/bookings/{}/status", booking_id);

    let (status, body) = send(&app.router, "PUT", &status_uri, None, Some(json!({ "status": "CONFIRMED" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CONFIRMED");

    let (status, body) = send(&app.router, "PUT", &status_uri, None, Some(json!({ "status": "CANCELLED" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let (status, _) = send(&app.router, "PUT", &status_uri, None, Some(json!({ "status": "EXPIRED" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_booking() {
    let app = test_app().await;
    let (status, body) = send(
        &app.router,
        "GET",
        &format!("/v1/bookings/{}", Uuid::new_v4()),
        Some(Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_showtime_admin_routes() {
    let app = test_app().await;
    let start = Utc::now() + Duration::days(3);

    let (status, created) = send(
        &app.router,
        "POST",
        "/v1/admin/showtimes",
        None,
        Some(json!({
            "movie_id": app.showtime.movie_id,
            "theater_id": Uuid::new_v4(),
            "screen_id": Uuid::new_v4(),
            "start_time": start,
            "end_time": start + Duration::hours(2),
            "base_price": 250,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, patched) = send(
        &app.router,
        "PATCH",
        &format!("/v1/admin/showtimes/{}", id),
        None,
        Some(json!({ "base_price": 300 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["base_price"], 300);
    assert_eq!(patched["movie_id"], created["movie_id"]);

    let (status, _) = send(
        &app.router,
        "PATCH",
        &format!("/v1/admin/showtimes/{}", id),
        None,
        Some(json!({ "base_price": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listed) = send(
        &app.router,
        "GET",
        &format!("/v1/movies/{}/showtimes", app.showtime.movie_id),
        None,
        None,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let (status, _) = send(&app.router, "DELETE", &format!("/v1/admin/showtimes/{}", id), None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app.router, "GET", &format!("/v1/showtimes/{}", id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deactivated_showtime_is_not_bookable() {
    let app = test_app().await;

    let (status, patched) = send(
        &app.router,
        "PATCH",
        &format!("/v1/admin/showtimes/{}", app.showtime.id),
        None,
        Some(json!({ "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["is_active"], false);

    let (status, body) = book(&app, Uuid::new_v4(), &["A1"]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("not open for booking"));
}
