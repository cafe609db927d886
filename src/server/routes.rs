//! Router configuration for Stuff.
//!
//! This module defines the HTTP routes and applies middleware for
//! authentication, CORS and tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health                       - Health check (public)
//! /login, /redirect_uri, /logout - OIDC flow (public)
//! /, /random, /submissions      - Pages (session)
//! /{entity}/{name}              - Item page (session)
//! /submit, /edit/{name}         - Forms (session)
//! /delete/{name}                - Delete (session, submitter only)
//! /api, /api/...                - JSON API (read key)
//! /api/key, /api/keys           - Key management (quartermaster key)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stuff::server::{create_router, AppState, RouterConfig};
//!
//! let state = AppState::new(store, images, session, oidc, site);
//! let router = create_router(state, RouterConfig::new("game"));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{HeaderName, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::api::{
    api_count_handler, api_items_handler, api_key_handler, api_keys_handler,
    api_newest_handler, api_owners_handler, api_players_handler, api_random_handler,
    api_random_sample_handler, api_submitters_handler,
};
use super::auth::{require_quartermaster, require_read_key, API_KEY_HEADER};
use super::form::MAX_UPLOAD_BYTES;
use super::handlers::{
    delete_handler, edit_form_handler, edit_handler, health_handler, index_handler,
    item_handler, random_handler, submissions_handler, submit_form_handler, submit_handler,
    AppState,
};
use super::login::{login_handler, logout_handler, redirect_handler};
use crate::catalog::{ItemStore, KeyStore};
use crate::config::DEFAULT_ENTITY;
use crate::storage::ImageStore;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Route noun for item pages (`/{entity}/{name}`)
    pub entity: String,

    /// Allowed CORS origins for the JSON API (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a new router configuration using `entity` as the item route noun.
    ///
    /// By default CORS allows any origin and tracing is enabled.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            cors_origins: None,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENTITY)
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// # Arguments
///
/// * `state` - Shared application state
/// * `config` - Router configuration
pub fn create_router<S, B>(state: AppState<S, B>, config: RouterConfig) -> Router
where
    S: ItemStore + KeyStore + 'static,
    B: ImageStore + 'static,
{
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .merge(build_page_routes(state.clone(), &config.entity))
        .nest("/api", build_api_routes(state).layer(cors))
        .route("/health", get(health_handler));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// HTML routes. The session check happens in the `Principal` extractor.
fn build_page_routes<S, B>(state: AppState<S, B>, entity: &str) -> Router
where
    S: ItemStore + KeyStore + 'static,
    B: ImageStore + 'static,
{
    Router::new()
        .route("/", get(index_handler::<S, B>))
        .route(&format!("/{}/{{name}}", entity), get(item_handler::<S, B>))
        .route("/random", get(random_handler::<S, B>))
        .route("/submissions", get(submissions_handler::<S, B>))
        .route(
            "/submit",
            get(submit_form_handler::<S, B>).post(submit_handler::<S, B>),
        )
        .route(
            "/edit/{name}",
            get(edit_form_handler::<S, B>).post(edit_handler::<S, B>),
        )
        .route("/delete/{name}", post(delete_handler::<S, B>))
        .route("/login", get(login_handler::<S, B>))
        .route("/redirect_uri", get(redirect_handler::<S, B>))
        .route("/logout", get(logout_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// JSON routes, each group behind its key middleware.
fn build_api_routes<S, B>(state: AppState<S, B>) -> Router
where
    S: ItemStore + KeyStore + 'static,
    B: ImageStore + 'static,
{
    let read_routes = Router::new()
        .route("/", get(api_items_handler::<S, B>))
        .route("/count", get(api_count_handler::<S, B>))
        .route("/newest", get(api_newest_handler::<S, B>))
        .route("/owners", get(api_owners_handler::<S, B>))
        .route("/players", get(api_players_handler::<S, B>))
        .route("/submitters", get(api_submitters_handler::<S, B>))
        .route("/random", get(api_random_handler::<S, B>))
        .route("/random/{n}", get(api_random_sample_handler::<S, B>))
        .route_layer(middleware::from_fn_with_state(
            state.keys.clone(),
            require_read_key::<S>,
        ));

    let key_routes = Router::new()
        .route(
            "/key",
            get(api_key_handler::<S, B>).post(api_key_handler::<S, B>),
        )
        .route("/keys", get(api_keys_handler::<S, B>))
        .route_layer(middleware::from_fn_with_state(
            state.keys.clone(),
            require_quartermaster::<S>,
        ));

    Router::new()
        .merge(read_routes)
        .merge(key_routes)
        .with_state(state)
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
