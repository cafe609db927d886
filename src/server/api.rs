//! JSON API handlers.
//!
//! All routes require an API key (see [`super::auth`]). Listing routes take
//! the same filter query parameters as the HTML index:
//! `name` (case-insensitive substring), `owner`, `players`, `submitter`.
//!
//! # Endpoints
//!
//! - `GET /api` - Items matching the filter
//! - `GET /api/count` - Number of matching items
//! - `GET /api/newest?limit=N` - Most recently submitted items (default 10)
//! - `GET /api/owners`, `/api/players`, `/api/submitters` - Distinct values
//! - `GET /api/random[/{n}]` - Random sample (a single item is not wrapped in an array)
//! - `GET|POST /api/key[?quartermaster=true]` - Issue a key (quartermaster key)
//! - `GET /api/keys` - List keys (quartermaster key)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::catalog::{ApiKey, Item, ItemFilter, ItemStore, KeyStore, DEFAULT_NEWEST_LIMIT};
use crate::error::{CatalogError, StoreError};
use crate::storage::ImageStore;

use super::handlers::{AppState, ErrorResponse};

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for `/api/newest`.
#[derive(Debug, Deserialize)]
pub struct NewestParams {
    /// Maximum number of items to return (default: 10)
    #[serde(default = "default_newest_limit")]
    pub limit: usize,
}

fn default_newest_limit() -> usize {
    DEFAULT_NEWEST_LIMIT
}

/// Query parameters for `/api/key`.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateKeyParams {
    /// Issue a quartermaster key instead of a read key
    #[serde(default)]
    pub quartermaster: bool,
}

// =============================================================================
// Response Types
// =============================================================================

/// A random sample. One item is returned bare, anything else as an array.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RandomSample {
    One(Item),
    Many(Vec<Item>),
}

impl From<Vec<Item>> for RandomSample {
    fn from(mut items: Vec<Item>) -> Self {
        match items.pop() {
            Some(item) if items.is_empty() => RandomSample::One(item),
            Some(item) => {
                items.push(item);
                RandomSample::Many(items)
            }
            None => RandomSample::Many(items),
        }
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Errors from the JSON handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::Catalog(CatalogError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            ApiError::Catalog(CatalogError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
            }
            ApiError::Catalog(e) if e.is_user_error() => {
                (StatusCode::BAD_REQUEST, "invalid_request")
            }
            ApiError::Catalog(_) | ApiError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "store_error")
            }
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /api`
pub async fn api_items_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Query(filter): Query<ItemFilter>,
) -> Result<Json<Vec<Item>>, ApiError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    Ok(Json(state.catalog.get_items(&filter).await?))
}

/// `GET /api/count`
pub async fn api_count_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Query(filter): Query<ItemFilter>,
) -> Result<Json<u64>, ApiError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    Ok(Json(state.catalog.get_count(&filter).await?))
}

/// `GET /api/newest?limit=N`
pub async fn api_newest_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Query(filter): Query<ItemFilter>,
    Query(params): Query<NewestParams>,
) -> Result<Json<Vec<Item>>, ApiError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    Ok(Json(
        state
            .catalog
            .get_newest_items(&filter, params.limit)
            .await?,
    ))
}

/// `GET /api/owners`
pub async fn api_owners_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Query(filter): Query<ItemFilter>,
) -> Result<Json<Vec<String>>, ApiError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    Ok(Json(state.catalog.get_owners(&filter).await?))
}

/// `GET /api/players`
pub async fn api_players_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Query(filter): Query<ItemFilter>,
) -> Result<Json<Vec<String>>, ApiError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    Ok(Json(state.catalog.get_players(&filter).await?))
}

/// `GET /api/submitters`
pub async fn api_submitters_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Query(filter): Query<ItemFilter>,
) -> Result<Json<Vec<String>>, ApiError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    Ok(Json(state.catalog.get_submitters(&filter).await?))
}

/// `GET /api/random` - a single random item.
pub async fn api_random_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Query(filter): Query<ItemFilter>,
) -> Result<Json<RandomSample>, ApiError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let sample = state.catalog.get_random_items(&filter, 1).await?;
    Ok(Json(sample.into()))
}

/// `GET /api/random/{n}` - up to `n` distinct random items.
pub async fn api_random_sample_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Path(n): Path<usize>,
    Query(filter): Query<ItemFilter>,
) -> Result<Json<RandomSample>, ApiError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let sample = state.catalog.get_random_items(&filter, n).await?;
    Ok(Json(sample.into()))
}

/// `GET|POST /api/key` - issue a new key.
///
/// Read keys are issued by default; `?quartermaster=true` issues a
/// quartermaster key.
pub async fn api_key_handler<S, B>(
    State(state): State<AppState<S, B>>,
    Query(params): Query<GenerateKeyParams>,
) -> Result<Json<ApiKey>, ApiError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    Ok(Json(state.keys.generate_api_key(params.quartermaster).await?))
}

/// `GET /api/keys` - every issued key.
pub async fn api_keys_handler<S, B>(
    State(state): State<AppState<S, B>>,
) -> Result<Json<Vec<ApiKey>>, ApiError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    Ok(Json(state.keys.get_api_keys().await?))
}

// =============================================================================
// Tests
// =============================================================================
