//! HTTP server layer for Stuff.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │                                                                 │
//! │  ┌───────────────┐  ┌───────────────┐  ┌─────────────────────┐  │
//! │  │ handlers/api  │  │ session/auth  │  │       routes        │  │
//! │  │ pages/form    │  │ login (OIDC)  │  │  (router config)    │  │
//! │  └───────────────┘  └───────────────┘  └─────────────────────┘  │
//! └──────────────────────────────┬──────────────────────────────────┘
//!                                ▼
//!                          CatalogService
//! ```
//!
//! HTML routes authenticate through the [`Principal`](crate::principal::Principal)
//! extractor (signed session cookie); JSON routes through API key middleware.

pub mod api;
pub mod auth;
pub mod form;
pub mod handlers;
pub mod login;
pub mod pages;
pub mod routes;
pub mod session;

pub use api::{ApiError, GenerateKeyParams, NewestParams, RandomSample};
pub use auth::{require_quartermaster, require_read_key, AuthError, API_KEY_HEADER};
pub use form::{ItemForm, MAX_UPLOAD_BYTES};
pub use handlers::{health_handler, AppState, ErrorResponse, HealthResponse, PageError};
pub use pages::{html_escape, SiteConfig};
pub use routes::{create_router, RouterConfig};
pub use session::{
    SessionAuth, SessionError, SessionSigner, FLASH_COOKIE, SESSION_COOKIE, STATE_COOKIE,
};
