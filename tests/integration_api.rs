//! API Integration Tests
//!
//! Drive the full router against the in-memory record store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use simple_bank::api::{self, AppState};
use simple_bank::{EngineConfig, MemoryStore, RecordStore, TransferEngine};

mod common;

fn test_app(store: &MemoryStore) -> Router {
    let store: Arc<dyn RecordStore> = Arc::new(store.clone());
    let engine = TransferEngine::new(store.clone(), EngineConfig::default());
    api::build_router(AppState::new(store, engine))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn post_json(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("X-Request-User", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-Request-User", user);
    }
    builder.body(Body::empty()).unwrap()
}

fn transfer_body(from: i64, to: i64, amount: i64, currency: &str) -> Value {
    json!({
        "from_account_id": from,
        "to_account_id": to,
        "amount": amount,
        "currency_code": currency,
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app(&MemoryStore::new());

    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_create_and_get_user() {
    let app = test_app(&MemoryStore::new());

    let (status, json) = send(
        &app,
        post_json(
            "/api/v1/users",
            None,
            json!({
                "username": "alice",
                "hashed_password": "secret-hash",
                "full_name": "Alice Example",
                "email": "alice@example.com",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "User creation failed: {}", json);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["username"], "alice");
    assert!(json["data"].get("hashed_password").is_none());

    let (status, json) = send(&app, get("/api/v1/users/alice", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["email"], "alice@example.com");

    // Duplicate username is a unique violation
    let (status, json) = send(
        &app,
        post_json(
            "/api/v1/users",
            None,
            json!({
                "username": "alice",
                "hashed_password": "other",
                "full_name": "Alice Again",
                "email": "alice2@example.com",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["success"], false);
    assert_eq!(json["error_code"], "unique_violation");
}

#[tokio::test]
async fn test_account_lifecycle() {
    let store = MemoryStore::new();
    let app = test_app(&store);
    let user = common::create_random_user(&store).await;
    let owner = user.username.as_str();

    let (status, json) = send(
        &app,
        post_json("/api/v1/accounts", Some(owner), json!({ "currency_code": "EUR" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "Account creation failed: {}", json);
    assert_eq!(json["data"]["owner"], owner);
    assert_eq!(json["data"]["currency_code"], "EUR");
    assert_eq!(json["data"]["balance"], 0);
    let id = json["data"]["id"].as_i64().unwrap();

    // One account per owner and currency
    let (status, _) = send(
        &app,
        post_json("/api/v1/accounts", Some(owner), json!({ "currency_code": "EUR" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(&app, get(&format!("/api/v1/accounts/{}", id), Some(owner))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["id"], id);

    let (status, json) = send(
        &app,
        get("/api/v1/accounts?page_id=1&page_size=5", Some(owner)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/accounts/{}", id))
        .header("X-Request-User", owner)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, get(&format!("/api/v1/accounts/{}", id), Some(owner))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error_code"], "not_found");
}

#[tokio::test]
async fn test_account_requests_validation() {
    let store = MemoryStore::new();
    let app = test_app(&store);
    let account = common::create_funded_account(&store, 10).await;

    // Missing request user
    let (status, json) = send(
        &app,
        post_json("/api/v1/accounts", None, json!({ "currency_code": "USD" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "missing_header");

    // Unsupported currency
    let (status, json) = send(
        &app,
        post_json(
            "/api/v1/accounts",
            Some(&account.owner),
            json!({ "currency_code": "XYZ" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "unsupported_currency");

    // Someone else's account
    let (status, json) = send(
        &app,
        get(&format!("/api/v1/accounts/{}", account.id), Some("mallory")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error_code"], "not_account_owner");

    // Page bounds
    for query in ["page_id=0&page_size=5", "page_id=1&page_size=4", "page_id=1&page_size=11"] {
        let (status, json) = send(
            &app,
            get(&format!("/api/v1/accounts?{}", query), Some(&account.owner)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {}", query);
        assert_eq!(json["error_code"], "invalid_pagination");
    }
}

#[tokio::test]
async fn test_list_accounts_rejects_offset_overflow() {
    let store = MemoryStore::new();
    let app = test_app(&store);
    let account = common::create_funded_account(&store, 0).await;

    let uri = format!("/api/v1/accounts?page_id={}&page_size=10", i64::MAX);
    let (status, json) = send(&app, get(&uri, Some(&account.owner))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error_code"], "invalid_pagination");
}

#[tokio::test]
async fn test_transfer_e2e() {
    let store = MemoryStore::new();
    let app = test_app(&store);

    let from = common::create_funded_account(&store, 100).await;
    let to = common::create_funded_account(&store, 50).await;

    let (status, json) = send(
        &app,
        post_json(
            "/api/v1/transfers",
            Some(&from.owner),
            transfer_body(from.id, to.id, 30, "USD"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "Transfer failed: {}", json);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "transaction initiated successfully");

    let data = &json["data"];
    assert_eq!(data["from_account"]["balance"], 70);
    assert_eq!(data["to_account"]["balance"], 80);
    assert_eq!(data["from_entry"]["amount"], -30);
    assert_eq!(data["to_entry"]["amount"], 30);
    assert_eq!(data["transfer"]["amount"], 30);

    let transfer_id = data["transfer"]["id"].as_i64().unwrap();
    let (status, json) = send(&app, get(&format!("/api/v1/transfers/{}", transfer_id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["from_account_id"], from.id);

    let entry_id = data["to_entry"]["id"].as_i64().unwrap();
    let (status, json) = send(&app, get(&format!("/api/v1/entries/{}", entry_id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["account_id"], to.id);

    let (status, json) = send(
        &app,
        get(&format!("/api/v1/accounts/{}", from.id), Some(&from.owner)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["balance"], 70);
}

#[tokio::test]
async fn test_transfer_rejections() {
    let store = MemoryStore::new();
    let app = test_app(&store);

    let from = common::create_funded_account(&store, 100).await;
    let to = common::create_funded_account(&store, 100).await;
    let euro_owner = common::create_random_user(&store).await;
    let euro = common::create_account_for(&store, &euro_owner.username, "EUR", 100).await;

    let cases = [
        // Request currency differs from the source account
        (
            Some(from.owner.as_str()),
            transfer_body(from.id, to.id, 10, "EUR"),
            StatusCode::BAD_REQUEST,
            "currency_mismatch",
        ),
        // Destination in another currency
        (
            Some(from.owner.as_str()),
            transfer_body(from.id, euro.id, 10, "USD"),
            StatusCode::BAD_REQUEST,
            "currency_mismatch",
        ),
        // Caller does not own the source
        (
            Some(to.owner.as_str()),
            transfer_body(from.id, to.id, 10, "USD"),
            StatusCode::UNAUTHORIZED,
            "not_account_owner",
        ),
        (
            Some(from.owner.as_str()),
            transfer_body(from.id, to.id, 0, "USD"),
            StatusCode::BAD_REQUEST,
            "invalid_amount",
        ),
        (
            Some(from.owner.as_str()),
            transfer_body(0, to.id, 10, "USD"),
            StatusCode::BAD_REQUEST,
            "invalid_account_id",
        ),
        (
            Some(from.owner.as_str()),
            transfer_body(from.id, to.id + 1000, 10, "USD"),
            StatusCode::NOT_FOUND,
            "not_found",
        ),
        (
            None,
            transfer_body(from.id, to.id, 10, "USD"),
            StatusCode::BAD_REQUEST,
            "missing_header",
        ),
    ];

    for (user, body, expected_status, expected_code) in cases {
        let (status, json) = send(&app, post_json("/api/v1/transfers", user, body.clone())).await;
        assert_eq!(status, expected_status, "body {}", body);
        assert_eq!(json["success"], false);
        assert_eq!(json["error_code"], expected_code, "body {}", body);
    }

    // Nothing moved
    assert_eq!(store.transfer_count(), 0);
    assert_eq!(store.get_account(from.id).await.unwrap().balance, 100);
    assert_eq!(store.get_account(to.id).await.unwrap().balance, 100);
}

#[tokio::test]
async fn test_unknown_records_return_not_found() {
    let app = test_app(&MemoryStore::new());

    for uri in ["/api/v1/transfers/999", "/api/v1/entries/999", "/api/v1/users/nobody"] {
        let (status, json) = send(&app, get(uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "uri {}", uri);
        assert_eq!(json["error_code"], "not_found");
    }
}
