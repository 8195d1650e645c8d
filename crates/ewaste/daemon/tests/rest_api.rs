//! End-to-end REST tests over the in-memory backend.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use ewaste_daemon::api::create_router;
use ewaste_daemon::api::rest::state::AppState;
use ewaste_daemon::config::ServerConfig;
use ewaste_types::{CategoryKind, Principal, PrincipalId};
use ewaste_workflow::{StaticIdentityResolver, WorkflowCoordinator};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const OWNER: &str = "owner-token";
const STRANGER: &str = "stranger-token";
const VENDOR_A: &str = "vendor-a-token";
const VENDOR_B: &str = "vendor-b-token";

struct TestApp {
    app: Router,
    category: String,
    department: String,
}

async fn setup() -> TestApp {
    let coordinator = Arc::new(WorkflowCoordinator::in_memory());
    let category = coordinator
        .ensure_category("Monitors", CategoryKind::Recyclable, None)
        .await
        .unwrap();
    let department = coordinator.ensure_department("Finance", None).await.unwrap();

    let identity = StaticIdentityResolver::default()
        .with_principal(OWNER, Principal::user(PrincipalId::generate()))
        .with_principal(STRANGER, Principal::user(PrincipalId::generate()))
        .with_principal(VENDOR_A, Principal::vendor(PrincipalId::generate()))
        .with_principal(VENDOR_B, Principal::vendor(PrincipalId::generate()));

    let state = AppState::new(coordinator, Arc::new(identity));
    TestApp {
        app: create_router(state, &ServerConfig::default()),
        category: category.id.as_uuid().to_string(),
        department: department.id.as_uuid().to_string(),
    }
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
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

impl TestApp {
    async fn report_item(&self) -> Value {
        let (status, item) = send(
            &self.app,
            "POST",
            "/api/v1/items",
            Some(OWNER),
            Some(json!({
                "name": "Dell P2214H",
                "category_id": self.category,
                "department_id": self.department,
                "disposition": "selling",
                "price": 40.0,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{item}");
        item
    }

    async fn request_pickup(&self, token: &str, item_id: &str) -> Value {
        let (status, request) = send(
            &self.app,
            "POST",
            &format!("/api/v1/items/{item_id}/pickup-requests"),
            Some(token),
            Some(json!({ "notes": "can collect Friday" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{request}");
        request
    }
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let t = setup().await;
    let (status, body) = send(&t.app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_catalog_is_public() {
    let t = setup().await;
    let (status, body) = send(&t.app, "GET", "/api/v1/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Monitors");
    assert_eq!(body[0]["kind"], "RECYCLABLE");
}

#[tokio::test]
async fn test_protected_endpoints_need_known_credential() {
    let t = setup().await;
    let (status, body) = send(&t.app, "GET", "/api/v1/items", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, _) = send(&t.app, "GET", "/api/v1/items", Some("nobody"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cookie_credential_is_accepted() {
    let t = setup().await;
    let request = Request::builder()
        .uri("/api/v1/items")
        .header(header::COOKIE, format!("access_token=Bearer {OWNER}"))
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_full_pickup_lifecycle() {
    let t = setup().await;
    let item = t.report_item().await;
    let item_id = id_of(&item);
    assert_eq!(item["status"], "REPORTED");
    assert_eq!(item["disposition"]["price"], 40.0);

    let request = t.request_pickup(VENDOR_A, &item_id).await;
    assert_eq!(request["status"], "pending");

    let (status, outcome) = send(
        &t.app,
        "POST",
        &format!("/api/v1/pickup/{}/approve", id_of(&request)),
        Some(OWNER),
        Some(json!({ "pickup_location": "Dock 4", "latitude": 12.97, "longitude": 77.59 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{outcome}");
    assert_eq!(outcome["item"]["status"], "COLLECTED");
    assert_eq!(outcome["request"]["status"], "approved");
    assert_eq!(outcome["entry"]["to_status"], "COLLECTED");

    let (status, transition) = send(
        &t.app,
        "POST",
        &format!("/api/v1/items/{item_id}/status"),
        Some(VENDOR_A),
        Some(json!({ "status": "in_storage", "remarks": "shelf B2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{transition}");
    assert_eq!(transition["item"]["status"], "IN_STORAGE");
    assert_eq!(transition["claim"]["status"], "approved");
    assert_eq!(transition["claim"]["vendor_notes"], "shelf B2");

    let (status, history) = send(
        &t.app,
        "GET",
        &format!("/api/v1/items/{item_id}/history"),
        Some(OWNER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["to_status"], "IN_STORAGE");
    assert_eq!(history[1]["to_status"], "COLLECTED");

    let (status, detail) = send(
        &t.app,
        "GET",
        &format!("/api/v1/items/{item_id}"),
        Some(VENDOR_A),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["category"]["name"], "Monitors");
    assert_eq!(detail["active_claim"]["id"], request["id"]);
}

#[tokio::test]
async fn test_first_approval_wins() {
    let t = setup().await;
    let item_id = id_of(&t.report_item().await);
    let first = t.request_pickup(VENDOR_A, &item_id).await;
    let second = t.request_pickup(VENDOR_B, &item_id).await;

    let (status, _) = send(
        &t.app,
        "POST",
        &format!("/api/v1/pickup/{}/approve", id_of(&first)),
        Some(OWNER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/api/v1/pickup/{}/approve", id_of(&second)),
        Some(OWNER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");

    let (status, rejected) = send(
        &t.app,
        "POST",
        &format!("/api/v1/items/{item_id}/pickup-requests/reject-stale"),
        Some(OWNER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected.as_array().unwrap().len(), 1);
    assert_eq!(rejected[0]["id"], second["id"]);
    assert_eq!(rejected[0]["status"], "rejected");
}

#[tokio::test]
async fn test_role_and_relationship_errors() {
    let t = setup().await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/v1/items",
        Some(VENDOR_A),
        Some(json!({
            "name": "Laptop",
            "category_id": t.category,
            "department_id": t.department,
            "disposition": "disposed",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let item_id = id_of(&t.report_item().await);
    let request = t.request_pickup(VENDOR_A, &item_id).await;

    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/api/v1/pickup/{}/reject", id_of(&request)),
        Some(STRANGER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/api/v1/items/{item_id}/status"),
        Some(VENDOR_B),
        Some(json!({ "status": "RECYCLED" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_validation_and_malformed_input() {
    let t = setup().await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/v1/items",
        Some(OWNER),
        Some(json!({
            "name": "Printer",
            "category_id": t.category,
            "department_id": t.department,
            "disposition": "selling",
            "price": 0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(&t.app, "GET", "/api/v1/items/not-an-id", Some(OWNER), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let item_id = id_of(&t.report_item().await);
    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/api/v1/items/{item_id}/status"),
        Some(VENDOR_A),
        Some(json!({ "status": "REPORTED" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_vendor_board_and_request_listing() {
    let t = setup().await;
    let item_id = id_of(&t.report_item().await);
    t.request_pickup(VENDOR_A, &item_id).await;

    let (status, board) = send(&t.app, "GET", "/api/v1/pickup/board", Some(VENDOR_A), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["items"].as_array().unwrap().len(), 1);
    assert_eq!(board["pending_item_ids"][0], item_id.as_str());

    let (status, _) = send(&t.app, "GET", "/api/v1/pickup/board", Some(OWNER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, mine) = send(&t.app, "GET", "/api/v1/pickup/requests", Some(OWNER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (_, theirs) = send(&t.app, "GET", "/api/v1/pickup/requests", Some(VENDOR_B), None).await;
    assert!(theirs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_owner_deletes_item() {
    let t = setup().await;
    let item_id = id_of(&t.report_item().await);
    t.request_pickup(VENDOR_A, &item_id).await;

    let (status, _) = send(&t.app, "DELETE", &format!("/api/v1/items/{item_id}"), Some(STRANGER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, deleted) = send(&t.app, "DELETE", &format!("/api/v1/items/{item_id}"), Some(OWNER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["requests_removed"], 1);

    let (status, _) = send(&t.app, "GET", &format!("/api/v1/items/{item_id}"), Some(OWNER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_approval_body_commits_nothing() {
    let t = setup().await;
    let item_id = id_of(&t.report_item().await);
    let request = t.request_pickup(VENDOR_A, &item_id).await;

    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/api/v1/pickup/{}/approve", id_of(&request)),
        Some(OWNER),
        Some(json!({ "pickup_location": "Dock 4", "latitude": "north", "longitude": 77.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, detail) = send(&t.app, "GET", &format!("/api/v1/items/{item_id}"), Some(OWNER), None).await;
    assert_eq!(detail["item"]["status"], "REPORTED");
    assert!(detail["active_claim"].is_null());

    let (_, requests) = send(&t.app, "GET", "/api/v1/pickup/requests", Some(OWNER), None).await;
    assert_eq!(requests[0]["status"], "pending");
}

#[tokio::test]
async fn test_malformed_notes_body_is_rejected() {
    let t = setup().await;
    let item_id = id_of(&t.report_item().await);
    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/api/v1/items/{item_id}/pickup-requests"),
        Some(VENDOR_A),
        Some(json!({ "notes": ["not", "text"] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, requests) = send(&t.app, "GET", "/api/v1/pickup/requests", Some(VENDOR_A), None).await;
    assert!(requests.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_extractor_rejections_use_error_envelope() {
    let t = setup().await;

    let (status, body) = send(&t.app, "POST", "/api/v1/items", Some(OWNER), Some(json!({ "name": "x" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].as_str().unwrap().contains("category_id"));

    let (status, body) = send(&t.app, "GET", "/api/v1/items?status=LOST", Some(OWNER), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_status_update_checks_role_before_status_name() {
    let t = setup().await;
    let item_id = id_of(&t.report_item().await);
    let (status, body) = send(
        &t.app,
        "POST",
        &format!("/api/v1/items/{item_id}/status"),
        Some(OWNER),
        Some(json!({ "status": "LOST" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_clients_cannot_attach_photo_references() {
    let t = setup().await;
    let (status, item) = send(
        &t.app,
        "POST",
        "/api/v1/items",
        Some(OWNER),
        Some(json!({
            "name": "Scanner",
            "category_id": t.category,
            "department_id": t.department,
            "disposition": "disposed",
            "photo": "photos/alice.jpg",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(item["photo"].is_null());
}
