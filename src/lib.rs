//! # Stuff
//!
//! A catalog of physical items (board games and the like) people own,
//! with a picture of each.
//!
//! Users log in through an OpenID Connect provider to browse, submit and
//! edit items. Records live in MongoDB, images in an S3-compatible bucket
//! under `<name>.jpg`. A JSON API gated by API keys exposes the same
//! listings to scripts.
//!
//! ## Architecture
//!
//! - [`catalog`] - Item model, store traits, MongoDB store and the catalog service
//! - [`storage`] - Image store trait and its S3 implementation
//! - [`server`] - Axum routes, pages, sessions and API key middleware
//! - [`oidc`] - OpenID Connect client for the login flow
//! - [`config`] - CLI and configuration types
//! - [`env_check`] - Environment verification for `stuff check`
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stuff::{
//!     create_router, create_s3_client, AppState, MongoStore, OidcClient, Quartermasters,
//!     RouterConfig, S3ImageStore, SessionAuth, SiteConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MongoStore::connect("mongodb://localhost:27017", "stuff").await.unwrap();
//!     let client = create_s3_client(None, "us-east-1", None).await;
//!     let images = S3ImageStore::new(client, "stuff-images".to_string());
//!
//!     let state = AppState::new(
//!         Arc::new(store),
//!         images,
//!         SessionAuth::new("secret", Quartermasters::default()),
//!         OidcClient::new("https://sso.example.com", "stuff", "secret", "http://localhost:8080/redirect_uri"),
//!         SiteConfig::new("https://images.example.com", "item"),
//!     );
//!     let router = create_router(state, RouterConfig::default());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod env_check;
pub mod error;
pub mod oidc;
pub mod principal;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use catalog::{
    ApiKey, ApiKeys, CatalogService, DistinctField, Item, ItemFields, ItemFilter, ItemStore,
    KeyStore, MongoStore, DEFAULT_NEWEST_LIMIT,
};
pub use config::{CheckConfig, Cli, Command, KeyConfig, ServeConfig};
pub use env_check::{verify_environment, EnvCheck};
pub use error::{CatalogError, OidcError, StorageError, StoreError};
pub use oidc::OidcClient;
pub use principal::{Principal, Quartermasters};
pub use server::{
    create_router, AppState, AuthError, ErrorResponse, HealthResponse, PageError, RouterConfig,
    SessionAuth, SiteConfig,
};
pub use storage::{create_s3_client, image_key, ImageStore, ImageUpload, S3ImageStore};
