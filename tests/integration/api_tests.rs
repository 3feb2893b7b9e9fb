//! API integration tests
//!
//! Drive the full router over the in-process store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_server::{
    api,
    config::{AppConfig, StoreBackend},
    repository::MemoryStore,
    services::{clock::SystemClock, rate_limit::MemoryCounter, Services},
    AppState,
};

fn app_with_limit(max_requests: u64) -> Router {
    let mut config = AppConfig::default();
    config.database.backend = StoreBackend::Memory;
    config.rate_limit.max_requests = max_requests;

    let services = Services::new(
        Arc::new(MemoryStore::new()),
        &config,
        Arc::new(MemoryCounter::new()),
        Arc::new(SystemClock),
    );

    api::create_router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    })
}

fn app() -> Router {
    app_with_limit(10)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Register a borrower and return (id, token)
async fn register(app: &Router, name: &str, email: &str) -> (i64, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/borrowers/register",
        None,
        Some(json!({ "name": name, "email": email, "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    (
        body["borrower"]["id"].as_i64().unwrap(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn add_book(app: &Router, isbn: &str, copies: i32) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/books",
        None,
        Some(json!({
            "title": "The Left Hand of Darkness",
            "author": "Ursula K. Le Guin",
            "isbn": isbn,
            "totalCount": copies,
            "shelfLocation": "SF-03"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["book"]["availableCount"], copies);
    body["book"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_register_and_login() {
    let app = app();
    let (id, _) = register(&app, "Ada Lovelace", "ada@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/borrowers/register",
        None,
        Some(json!({ "name": "Ada Lovelace", "email": "ada@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Borrower already exists");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/borrowers/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["borrower"]["id"], id);
    assert!(body["borrower"].get("password").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/borrowers/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "wrongpass1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication");
}

#[tokio::test]
async fn test_invalid_registration() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/borrowers/register",
        None,
        Some(json!({ "name": "Ada Lovelace", "email": "not-an-email", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation");
}

#[tokio::test]
async fn test_book_catalog() {
    let app = app();
    let id = add_book(&app, "978-006-08310-501-9", 2).await;

    let (status, body) = send(&app, Method::GET, &format!("/api/books/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["isbn"], "978-006-08310-501-9");

    let (status, body) = send(&app, Method::GET, "/api/books?searchTerm=le%20guin", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, _) = send(&app, Method::GET, "/api/books?limit=20", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/books/999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/books/{}", id),
        None,
        Some(json!({ "availableCount": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation");

    let (status, _) = send(&app, Method::DELETE, &format!("/api/books/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::DELETE, &format!("/api/books/{}", id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_borrow_return_cycle() {
    let app = app();
    let (ada, ada_token) = register(&app, "Ada Lovelace", "ada@example.com").await;
    let (grace, grace_token) = register(&app, "Grace Hopper", "grace@example.com").await;
    let book = add_book(&app, "978-006-08310-501-9", 1).await;

    let borrow_uri = |borrower: i64| format!("/api/borrowers/{}/books/{}/borrow", borrower, book);
    let return_uri = |borrower: i64| format!("/api/borrowers/{}/books/{}/return", borrower, book);
    let due = json!({ "returnDate": "2099-01-01" });

    let (status, body) = send(&app, Method::POST, &borrow_uri(ada), Some(&ada_token), Some(due.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["returnDate"], "2099-01-01");

    let (status, body) = send(&app, Method::POST, &borrow_uri(ada), Some(&ada_token), Some(due.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Borrower has already borrowed this book");

    let (status, body) = send(&app, Method::POST, &borrow_uri(grace), Some(&grace_token), Some(due.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "No copies of the book are available");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/borrowers/{}/active-borrows", ada),
        Some(&ada_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["books"][0]["bookId"], book);

    let (status, body) = send(&app, Method::POST, &return_uri(ada), Some(&ada_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["confirmedReturnDate"].is_string());

    let (status, body) = send(&app, Method::POST, &return_uri(ada), Some(&ada_token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidState");
    assert_eq!(body["message"], "No active borrowing found for this book");

    let (status, _) = send(&app, Method::POST, &borrow_uri(grace), Some(&grace_token), Some(due)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, Method::GET, &format!("/api/books/{}", book), None, None).await;
    assert_eq!(body["book"]["availableCount"], 0);
}

#[tokio::test]
async fn test_borrower_routes_require_own_token() {
    let app = app();
    let (ada, ada_token) = register(&app, "Ada Lovelace", "ada@example.com").await;
    let (_, grace_token) = register(&app, "Grace Hopper", "grace@example.com").await;
    let book = add_book(&app, "978-006-08310-501-9", 1).await;
    let uri = format!("/api/borrowers/{}/books/{}/borrow", ada, book);
    let due = json!({ "returnDate": "2099-01-01" });

    let (status, _) = send(&app, Method::POST, &uri, None, Some(due.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::POST, &uri, Some("garbage"), Some(due.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::POST, &uri, Some(&grace_token), Some(due)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/borrowers/{}", ada),
        Some(&ada_token),
        Some(json!({ "name": "Ada King" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["borrower"]["name"], "Ada King");
}

#[tokio::test]
async fn test_overdue_and_last_month_reports() {
    let app = app();
    let (ada, ada_token) = register(&app, "Ada Lovelace", "ada@example.com").await;
    let book = add_book(&app, "978-006-08310-501-9", 2).await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/borrowers/{}/books/{}/borrow", ada, book),
        Some(&ada_token),
        Some(json!({ "returnDate": "2020-01-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::GET, "/api/borrowing-processes/overdue", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["borrower"]["email"], "ada@example.com");
    assert_eq!(body["data"][0]["book"]["id"], book);

    // Loans created today never fall in the previous month
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/borrowing-processes/last-month-borrows?onlyOverdue=true",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let app = app_with_limit(2);
    let attempt = json!({ "email": "nobody@example.com", "password": "secret123" });

    for _ in 0..2 {
        let (status, _) = send(&app, Method::POST, "/api/borrowers/login", None, Some(attempt.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = send(&app, Method::POST, "/api/borrowers/login", None, Some(attempt)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "TooManyRequests");

    // Other routes are not throttled
    let (status, _) = send(&app, Method::GET, "/api/books", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_input_uses_error_body() {
    let app = app();
    let (ada, ada_token) = register(&app, "Ada Lovelace", "ada@example.com").await;
    let book = add_book(&app, "978-006-08310-501-9", 1).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/borrowers/{}/books/{}/borrow", ada, book),
        Some(&ada_token),
        Some(json!({ "returnDate": "next tuesday" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation");
    assert!(body["message"].is_string());

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/borrowing-processes/last-month-borrows?onlyOverdue=maybe",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation");

    let (status, body) = send(&app, Method::GET, "/api/books/abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation");

    // Nothing was borrowed by the rejected request
    let (_, body) = send(&app, Method::GET, &format!("/api/books/{}", book), None, None).await;
    assert_eq!(body["book"]["availableCount"], 1);
}
