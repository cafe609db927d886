//! Login flow integration tests against a mock OpenID Connect provider.
//!
//! Tests verify:
//! - /login redirects to the provider with a signed state cookie
//! - /redirect_uri exchanges the code and establishes the session
//! - State mismatch and missing state are rejected
//! - Provider failures surface as 502

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stuff::server::{SessionSigner, SESSION_COOKIE, STATE_COOKIE};

use super::test_utils::{cookie_value, MockStore, TestApp, TestAppBuilder, TEST_SECRET};

// =============================================================================
// Mock Provider
// =============================================================================

async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": server.uri(),
            "authorization_endpoint": format!("{}/authorize", server.uri()),
            "token_endpoint": format!("{}/token", server.uri()),
            "userinfo_endpoint": format!("{}/userinfo", server.uri()),
            "jwks_uri": format!("{}/jwks", server.uri()),
        })))
        .mount(server)
        .await;
}

async fn mount_happy_provider(server: &MockServer) {
    mount_discovery(server).await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=good-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-123",
            "token_type": "Bearer",
            "expires_in": 300,
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer access-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "4f1c",
            "preferred_username": "dana",
        })))
        .mount(server)
        .await;
}

async fn app_for(server: &MockServer) -> TestApp {
    TestAppBuilder::new(MockStore::new())
        .issuer(server.uri())
        .build()
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Start a login and return `(state, state cookie value)`.
async fn begin_login(app: &TestApp, next: &str) -> (String, String) {
    let request = Request::builder()
        .uri(format!("/login?next={}", urlencoding::encode(next)))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let authorize = url::Url::parse(&location(&response)).unwrap();
    let state = authorize
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap();
    let cookie = cookie_value(&response, STATE_COOKIE).unwrap();
    (state, cookie)
}

fn callback(query: &str, state_cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(format!("/redirect_uri?{}", query));
    if let Some(value) = state_cookie {
        builder = builder.header("cookie", format!("{}={}", STATE_COOKIE, value));
    }
    builder.body(Body::empty()).unwrap()
}

// =============================================================================
// Flow
// =============================================================================

#[tokio::test]
async fn test_login_redirects_to_provider() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    let app = app_for(&server).await;

    let request = Request::builder().uri("/login").body(Body::empty()).unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = url::Url::parse(&location(&response)).unwrap();
    assert_eq!(target.path(), "/authorize");

    let params: Vec<(String, String)> = target.query_pairs().into_owned().collect();
    let get = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(get("client_id").as_deref(), Some("stuff"));
    assert_eq!(get("response_type").as_deref(), Some("code"));
    assert_eq!(get("scope").as_deref(), Some("openid profile"));
    assert_eq!(
        get("redirect_uri").as_deref(),
        Some("http://localhost:8080/redirect_uri")
    );
    assert!(get("state").is_some_and(|s| !s.is_empty()));
    assert!(cookie_value(&response, STATE_COOKIE).is_some());
}

#[tokio::test]
async fn test_full_login_establishes_session() {
    let server = MockServer::start().await;
    mount_happy_provider(&server).await;
    let app = app_for(&server).await;

    let (state, cookie) = begin_login(&app, "/submissions").await;
    let response = app
        .router
        .clone()
        .oneshot(callback(
            &format!("code=good-code&state={}", state),
            Some(&cookie),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/submissions");

    let session = cookie_value(&response, SESSION_COOKIE).unwrap();
    let username = SessionSigner::new(TEST_SECRET).verify(&session).unwrap();
    assert_eq!(username, "dana");

    // The new session opens the pages
    let request = Request::builder()
        .uri("/submissions")
        .header("cookie", format!("{}={}", SESSION_COOKIE, session))
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_offsite_next_is_ignored() {
    let server = MockServer::start().await;
    mount_happy_provider(&server).await;
    let app = app_for(&server).await;

    let (state, cookie) = begin_login(&app, "//evil.example.com/").await;
    let response = app
        .router
        .oneshot(callback(
            &format!("code=good-code&state={}", state),
            Some(&cookie),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_state_mismatch_rejected() {
    let server = MockServer::start().await;
    mount_happy_provider(&server).await;
    let app = app_for(&server).await;

    let (_, cookie) = begin_login(&app, "/").await;
    let response = app
        .router
        .oneshot(callback("code=good-code&state=forged", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(cookie_value(&response, SESSION_COOKIE).is_none());
}

#[tokio::test]
async fn test_missing_state_cookie_rejected() {
    let server = MockServer::start().await;
    mount_happy_provider(&server).await;
    let app = app_for(&server).await;

    let (state, _) = begin_login(&app, "/").await;
    let response = app
        .router
        .oneshot(callback(&format!("code=good-code&state={}", state), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_exchange_failure_is_bad_gateway() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let app = app_for(&server).await;

    let (state, cookie) = begin_login(&app, "/").await;
    let response = app
        .router
        .oneshot(callback(
            &format!("code=good-code&state={}", state),
            Some(&cookie),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_provider_error_parameter_is_bad_gateway() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    let app = app_for(&server).await;

    let response = app
        .router
        .oneshot(callback("error=access_denied", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_unreachable_provider_is_bad_gateway() {
    let app = TestAppBuilder::new(MockStore::new()).build();

    let request = Request::builder().uri("/login").body(Body::empty()).unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
