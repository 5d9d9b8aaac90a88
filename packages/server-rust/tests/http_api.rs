//! HTTP API behaviour through the full axum router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use workshop_server::network::{build_router, ShutdownController};
use workshop_server::{NetworkConfig, ServerConfig, ServiceStack};

async fn router() -> Router {
    let stack = ServiceStack::in_memory(ServerConfig::default()).await.unwrap();
    build_router(
        &NetworkConfig::default(),
        Arc::new(stack),
        Arc::new(ShutdownController::new()),
    )
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-actor-id", "organizer-1");
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Creates and publishes a workshop with a required "level" select.
async fn published_workshop(router: &Router, capacity: u32) -> String {
    let (status, workshop) = send(
        router,
        Method::POST,
        "/workshops",
        Some(json!({
            "title": "Letterpress",
            "policy": { "capacity": capacity, "enableWaitlist": true },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = workshop["id"].as_str().unwrap().to_string();

    let (status, field) = send(
        router,
        Method::POST,
        &format!("/workshops/{id}/form/fields"),
        Some(json!({
            "id": "level",
            "type": "select",
            "label": "Level",
            "required": true,
            "options": ["Beginner", "Advanced"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(field["id"], "level");

    let (status, published) = send(router, Method::POST, &format!("/workshops/{id}/publish"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "published");
    id
}

fn answers(name: &str, level: &str) -> Value {
    json!({
        "formData": {
            "fullName": name,
            "email": format!("{}@example.com", name.to_lowercase()),
            "level": level,
        }
    })
}

#[tokio::test]
async fn health_endpoints_respond() {
    let router = router().await;
    let (status, body) = send(&router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "starting");

    let (status, _) = send(&router, Method::GET, "/health/live", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn submission_outcomes_map_to_statuses() {
    let router = router().await;
    let id = published_workshop(&router, 1).await;
    let uri = format!("/workshops/{id}/registrations");

    let (status, accepted) = send(&router, Method::POST, &uri, Some(answers("Ada", "Beginner"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(accepted["outcome"], "accepted");
    assert_eq!(accepted["status"], "confirmed");
    assert_eq!(accepted["registration"]["studentId"], "organizer-1");

    let (status, waitlisted) = send(&router, Method::POST, &uri, Some(answers("Grace", "Advanced"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(waitlisted["outcome"], "waitlisted");
    assert_eq!(waitlisted["position"], 1);

    let (status, invalid) = send(&router, Method::POST, &uri, Some(answers("Linus", "Expert"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(invalid["error"], "validation_failed");
    assert_eq!(invalid["failures"][0]["fieldId"], "level");

    let (status, waitlist) = send(&router, Method::GET, &format!("/workshops/{id}/waitlist"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(waitlist["entries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cancel_and_promote_over_http() {
    let router = router().await;
    let id = published_workshop(&router, 1).await;
    let uri = format!("/workshops/{id}/registrations");

    let (_, first) = send(&router, Method::POST, &uri, Some(answers("Ada", "Beginner"))).await;
    let (_, second) = send(&router, Method::POST, &uri, Some(answers("Grace", "Beginner"))).await;
    let first_id = first["registration"]["id"].as_str().unwrap();

    let (status, cancelled) = send(&router, Method::DELETE, &format!("{uri}/{first_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (status, promoted) = send(&router, Method::POST, &format!("/workshops/{id}/waitlist/promote"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["registration"]["id"], second["registration"]["id"]);
    assert_eq!(promoted["registration"]["status"], "confirmed");

    let (status, none) = send(&router, Method::POST, &format!("/workshops/{id}/waitlist/promote"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(none["registration"].is_null());
}

#[tokio::test]
async fn schema_edits_lock_after_first_registration() {
    let router = router().await;
    let id = published_workshop(&router, 10).await;
    send(
        &router,
        Method::POST,
        &format!("/workshops/{id}/registrations"),
        Some(answers("Ada", "Beginner")),
    )
    .await;

    let (status, body) = send(
        &router,
        Method::DELETE,
        &format!("/workshops/{id}/form/fields/level"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "schema_locked");

    // Relabelling is cosmetic and stays allowed.
    let (status, field) = send(
        &router,
        Method::PATCH,
        &format!("/workshops/{id}/form/fields/level"),
        Some(json!({ "label": "Experience level" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(field["label"], "Experience level");

    let (status, form) = send(&router, Method::GET, &format!("/workshops/{id}/form"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(form["customFields"][0]["label"], "Experience level");
}

#[tokio::test]
async fn errors_render_as_json() {
    let router = router().await;

    let (status, body) = send(&router, Method::GET, "/workshops/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "workshop_not_found");

    let (status, body) = send(&router, Method::POST, "/workshops", Some(json!({ "title": 7 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (status, body) = send(&router, Method::POST, "/workshops", Some(json!({ "title": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn sync_feed_returns_cursor() {
    let router = router().await;
    let id = published_workshop(&router, 3).await;

    let (status, all) = send(&router, Method::GET, "/sync/workshops", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["workshops"][0]["id"], id.as_str());
    let cursor = all["cursor"].as_u64().unwrap();

    let (status, none) = send(&router, Method::GET, &format!("/sync/workshops?since={cursor}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(none["workshops"].as_array().unwrap().is_empty());
    assert_eq!(none["cursor"], cursor);
}
