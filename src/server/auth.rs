//! API key authentication for the JSON routes.
//!
//! Clients present a key either as the `key` query parameter or in the
//! `X-API-Key` header:
//!
//! ```text
//! GET /api/newest?limit=5&key=Zx81...
//! GET /api/count            X-API-Key: Zx81...
//! ```
//!
//! Two middlewares guard the API:
//!
//! - [`require_read_key`] - any issued key
//! - [`require_quartermaster`] - a key carrying the quartermaster flag
//!
//! Both run before the handler, so a rejected request never reaches the
//! item store. The resolved [`ApiKey`] is placed in the request extensions.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{debug, error, warn};
use url::form_urlencoded;

use super::handlers::ErrorResponse;
use crate::catalog::{ApiKey, ApiKeys, KeyStore};
use crate::error::StoreError;

/// Header carrying an API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter carrying an API key.
pub const API_KEY_PARAM: &str = "key";

// =============================================================================
// Errors
// =============================================================================

/// Authentication error types.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No key in the query string or headers
    #[error("Missing API key")]
    MissingKey,

    /// Key not found
    #[error("Invalid API key")]
    InvalidKey,

    /// Key is valid but lacks the quartermaster flag
    #[error("This API key is not a quartermaster key")]
    NotQuartermaster,

    /// Key lookup failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AuthError::MissingKey => (StatusCode::UNAUTHORIZED, "missing_api_key"),
            AuthError::InvalidKey => (StatusCode::UNAUTHORIZED, "invalid_api_key"),
            AuthError::NotQuartermaster => (StatusCode::FORBIDDEN, "forbidden"),
            AuthError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
        };
        let message = self.to_string();

        // Unknown keys may be probing, missing keys are usually a forgotten parameter
        match &self {
            AuthError::Store(_) => {
                error!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Key lookup failed: {}",
                    message
                );
            }
            AuthError::InvalidKey | AuthError::NotQuartermaster => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
            AuthError::MissingKey => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Key Extraction
// =============================================================================

/// The key presented with a request, query parameter first.
pub fn presented_key(query: Option<&str>, headers: &HeaderMap) -> Option<String> {
    let from_query = query.and_then(|q| {
        form_urlencoded::parse(q.as_bytes())
            .find(|(name, _)| name == API_KEY_PARAM)
            .map(|(_, value)| value.into_owned())
    });

    from_query
        .or_else(|| {
            headers
                .get(API_KEY_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Resolve a presented key. Takes the token by value so no borrow of the
/// request is held across the store lookup.
async fn authenticate<K: KeyStore>(
    keys: &ApiKeys<K>,
    token: Option<String>,
) -> Result<ApiKey, AuthError> {
    let token = token.ok_or(AuthError::MissingKey)?;
    keys.lookup(&token).await?.ok_or(AuthError::InvalidKey)
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Reject requests without a valid API key of any tier.
pub async fn require_read_key<K: KeyStore>(
    State(keys): State<ApiKeys<K>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = presented_key(request.uri().query(), request.headers());
    let key = authenticate(&keys, token).await?;
    request.extensions_mut().insert(key);
    Ok(next.run(request).await)
}

/// Reject requests without a valid quartermaster key.
pub async fn require_quartermaster<K: KeyStore>(
    State(keys): State<ApiKeys<K>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = presented_key(request.uri().query(), request.headers());
    let key = authenticate(&keys, token).await?;
    if !key.quartermaster {
        return Err(AuthError::NotQuartermaster);
    }
    request.extensions_mut().insert(key);
    Ok(next.run(request).await)
}

// =============================================================================
// Tests
// =============================================================================
