//! JSON API integration tests.
//!
//! Tests verify:
//! - Key gating (missing, unknown, read vs quartermaster keys)
//! - Filtered listings, counts and distinct values
//! - Random sampling response shape
//! - Key issuance and listing

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use super::test_utils::{api_get, board_games, MockStore, TestApp, TestAppBuilder};

const READ_KEY: &str = "read-key-0123456789";
const QM_KEY: &str = "qm-key-0123456789";

async fn app() -> TestApp {
    let store = MockStore::new()
        .with_items(board_games())
        .await
        .with_key(READ_KEY, false)
        .await
        .with_key(QM_KEY, true)
        .await;
    TestAppBuilder::new(store).build()
}

async fn json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Key Gating
// =============================================================================

#[tokio::test]
async fn test_missing_key_rejected_before_store() {
    let app = app().await;

    let request = Request::builder().uri("/api").body(Body::empty()).unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let error = json(response).await;
    assert_eq!(error["error"], "missing_api_key");
    assert_eq!(app.store.item_calls(), 0);
}

#[tokio::test]
async fn test_unknown_key_rejected_before_store() {
    let app = app().await;

    let response = app
        .router
        .oneshot(api_get("/api/count", "not-a-key"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.item_calls(), 0);
}

#[tokio::test]
async fn test_key_accepted_from_query_parameter() {
    let app = app().await;

    let request = Request::builder()
        .uri(format!("/api/count?key={}", READ_KEY))
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await, serde_json::json!(3));
}

#[tokio::test]
async fn test_read_key_cannot_issue_keys() {
    let app = app().await;

    let response = app
        .router
        .oneshot(api_get("/api/key", READ_KEY))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.store.key_count().await, 2);
}

#[tokio::test]
async fn test_read_key_cannot_list_keys() {
    let app = app().await;

    let response = app
        .router
        .oneshot(api_get("/api/keys", READ_KEY))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json(response).await;
    assert_eq!(body["error"], "forbidden");
    assert!(!body.is_array());
    assert!(!body.to_string().contains(QM_KEY));
}

// =============================================================================
// Listings
// =============================================================================

#[tokio::test]
async fn test_items_filtered_by_owner_and_name() {
    let app = app().await;

    let response = app
        .router
        .clone()
        .oneshot(api_get("/api?owner=alice", READ_KEY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let items = json(response).await;
    let names: Vec<&str> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Catan", "Catan Seafarers"]);

    let response = app
        .router
        .oneshot(api_get("/api?name=seafa&owner=", READ_KEY))
        .await
        .unwrap();
    let items = json(response).await;
    assert_eq!(items.as_array().unwrap().len(), 1);
    assert_eq!(items[0]["name"], "Catan Seafarers");
}

#[tokio::test]
async fn test_info_returned_verbatim() {
    let app = app().await;

    let response = app
        .router
        .oneshot(api_get("/api?name=Catan&players=3-4&owner=alice", READ_KEY))
        .await
        .unwrap();
    let items = json(response).await;
    assert_eq!(items[0]["info"], "# Catan\n\nTrade *sheep*.\n");
}

#[tokio::test]
async fn test_count_and_distinct_values() {
    let app = app().await;

    let response = app
        .router
        .clone()
        .oneshot(api_get("/api/count?owner=bob", READ_KEY))
        .await
        .unwrap();
    assert_eq!(json(response).await, serde_json::json!(1));

    let response = app
        .router
        .clone()
        .oneshot(api_get("/api/owners", READ_KEY))
        .await
        .unwrap();
    assert_eq!(json(response).await, serde_json::json!(["alice", "bob"]));

    let response = app
        .router
        .clone()
        .oneshot(api_get("/api/players", READ_KEY))
        .await
        .unwrap();
    assert_eq!(json(response).await, serde_json::json!(["2-4", "3-4"]));

    let response = app
        .router
        .oneshot(api_get("/api/submitters?owner=bob", READ_KEY))
        .await
        .unwrap();
    assert_eq!(json(response).await, serde_json::json!(["bob"]));
}

#[tokio::test]
async fn test_newest_respects_limit() {
    let app = app().await;

    let response = app
        .router
        .clone()
        .oneshot(api_get("/api/newest?limit=2", READ_KEY))
        .await
        .unwrap();
    let items = json(response).await;
    let names: Vec<&str> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Azul", "Catan Seafarers"]);

    let response = app
        .router
        .oneshot(api_get("/api/newest", READ_KEY))
        .await
        .unwrap();
    assert_eq!(json(response).await.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_newest_zero_limit_is_empty() {
    let app = app().await;

    let response = app
        .router
        .oneshot(api_get("/api/newest?limit=0", READ_KEY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await, serde_json::json!([]));
    assert_eq!(app.store.item_calls(), 0);
}

// =============================================================================
// Random
// =============================================================================

#[tokio::test]
async fn test_random_returns_bare_item() {
    let app = app().await;

    let response = app
        .router
        .oneshot(api_get("/api/random", READ_KEY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let item = json(response).await;
    assert!(item.is_object());
    assert!(item["name"].is_string());
}

#[tokio::test]
async fn test_random_sample_returns_array_capped_at_matches() {
    let app = app().await;

    let response = app
        .router
        .clone()
        .oneshot(api_get("/api/random/2", READ_KEY))
        .await
        .unwrap();
    let items = json(response).await;
    assert_eq!(items.as_array().unwrap().len(), 2);
    assert_ne!(items[0]["name"], items[1]["name"]);

    let response = app
        .router
        .clone()
        .oneshot(api_get("/api/random/50?owner=alice", READ_KEY))
        .await
        .unwrap();
    assert_eq!(json(response).await.as_array().unwrap().len(), 2);

    let response = app
        .router
        .oneshot(api_get("/api/random/1", READ_KEY))
        .await
        .unwrap();
    assert!(json(response).await.is_object());
}

#[tokio::test]
async fn test_random_sample_rejects_non_numeric_count() {
    let app = app().await;

    let response = app
        .router
        .oneshot(api_get("/api/random/lots", READ_KEY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Key Management
// =============================================================================

#[tokio::test]
async fn test_quartermaster_issues_read_key_by_default() {
    let app = app().await;

    let response = app
        .router
        .clone()
        .oneshot(api_get("/api/key", QM_KEY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let key = json(response).await;
    assert_eq!(key["quartermaster"], false);
    let token = key["key"].as_str().unwrap().to_string();
    assert_eq!(token.len(), stuff::catalog::API_KEY_LENGTH);

    // The new key works for reads but not for key management
    let response = app
        .router
        .clone()
        .oneshot(api_get("/api/count", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .oneshot(api_get("/api/keys", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_quartermaster_key_issue_and_list() {
    let app = app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/key?quartermaster=true")
        .header("x-api-key", QM_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["quartermaster"], true);

    let response = app
        .router
        .oneshot(api_get("/api/keys", QM_KEY))
        .await
        .unwrap();
    assert_eq!(json(response).await.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = app().await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["status"], "healthy");
}
