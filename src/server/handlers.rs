//! HTTP request handlers for the catalog pages.
//!
//! This module contains the shared application state, the error types
//! mapped to responses, and the Axum handlers for the HTML routes.
//!
//! # Endpoints
//!
//! - `GET /` - Filterable catalog listing
//! - `GET /{entity}/{name}` - Item detail with expansions
//! - `GET /random` - One random item
//! - `GET /submissions` - Items submitted by the current user
//! - `GET|POST /submit` - Create form / create action
//! - `GET|POST /edit/{name}` - Edit form / edit action
//! - `POST /delete/{name}` - Delete (submitter only)
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, FromRef, Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::form_urlencoded;

use crate::catalog::{ApiKeys, CatalogService, Item, ItemFilter, ItemStore, KeyStore};
use crate::error::{CatalogError, OidcError};
use crate::oidc::OidcClient;
use crate::principal::Principal;
use crate::storage::ImageStore;

use super::form::ItemForm;
use super::pages::{self, Chrome, FilterOptions, FormView, SiteConfig};
use super::session::SessionAuth;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
///
/// # Type Parameters
///
/// * `S` - Document store for items and API keys (e.g. `MongoStore`)
/// * `B` - Image store (e.g. `S3ImageStore`)
pub struct AppState<S, B> {
    /// Item reads and writes
    pub catalog: Arc<CatalogService<S, B>>,

    /// API key issue and lookup
    pub keys: ApiKeys<S>,

    /// Session cookies, quartermaster list and CSRF settings
    pub session: Arc<SessionAuth>,

    /// Identity provider client for the login flow
    pub oidc: Arc<OidcClient>,

    /// Image URL and route noun used by the pages
    pub site: Arc<SiteConfig>,
}

impl<S, B> AppState<S, B>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    pub fn new(
        store: Arc<S>,
        images: B,
        session: SessionAuth,
        oidc: OidcClient,
        site: SiteConfig,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(Arc::clone(&store), images)),
            keys: ApiKeys::new(store),
            session: Arc::new(session),
            oidc: Arc::new(oidc),
            site: Arc::new(site),
        }
    }

    fn chrome<'a>(&'a self, principal: &'a Principal, flash: Option<String>) -> Chrome<'a> {
        Chrome {
            principal,
            site: &self.site,
            flash,
        }
    }
}

impl<S, B> Clone for AppState<S, B> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            keys: self.keys.clone(),
            session: Arc::clone(&self.session),
            oidc: Arc::clone(&self.oidc),
            site: Arc::clone(&self.site),
        }
    }
}

impl<S, B> FromRef<AppState<S, B>> for Arc<SessionAuth> {
    fn from_ref(state: &AppState<S, B>) -> Self {
        Arc::clone(&state.session)
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_api_key")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Errors raised by the HTML handlers, rendered as a small error page.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid form data: {0}")]
    Form(#[from] MultipartError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Oidc(#[from] OidcError),
}

impl PageError {
    fn status(&self) -> StatusCode {
        match self {
            PageError::NotFound(_) => StatusCode::NOT_FOUND,
            PageError::BadRequest(_) => StatusCode::BAD_REQUEST,
            // 413 for oversized bodies, 400 for malformed ones
            PageError::Form(e) => e.status(),
            PageError::Catalog(CatalogError::NotFound { .. }) => StatusCode::NOT_FOUND,
            PageError::Catalog(e) if e.is_user_error() => StatusCode::BAD_REQUEST,
            PageError::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PageError::Oidc(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Convert PageError to HTTP response.
///
/// Errors are logged based on their severity:
/// - 5xx errors at ERROR level, without leaking details to the page
/// - 404s at DEBUG level
/// - other 4xx errors at WARN level
impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        let shown = if status.is_server_error() {
            error!(status = status.as_u16(), "Server error: {}", message);
            match status {
                StatusCode::BAD_GATEWAY => "Could not reach the login provider".to_string(),
                _ => "Something went wrong".to_string(),
            }
        } else {
            if status == StatusCode::NOT_FOUND {
                debug!(status = status.as_u16(), "Resource not found: {}", message);
            } else {
                warn!(status = status.as_u16(), "Client error: {}", message);
            }
            message
        };

        (status, Html(pages::render_error(status.as_u16(), &shown))).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn filter_options<S: ItemStore, B: ImageStore>(
    catalog: &CatalogService<S, B>,
) -> Result<FilterOptions, CatalogError> {
    let all = ItemFilter::default();
    Ok(FilterOptions {
        owners: catalog.get_owners(&all).await?,
        players: catalog.get_players(&all).await?,
        submitters: catalog.get_submitters(&all).await?,
    })
}

async fn listing<S, B>(
    state: &AppState<S, B>,
    principal: &Principal,
    jar: CookieJar,
    heading: &str,
    filter: &ItemFilter,
    items: Vec<Item>,
) -> Result<(CookieJar, Html<String>), PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let options = filter_options(&state.catalog).await?;
    let (jar, flash) = state.session.take_flash(jar);
    let chrome = state.chrome(principal, flash);
    let html = pages::render_index(&chrome, heading, filter, &options, &items);
    Ok((jar, Html(html)))
}

/// Catalog listing.
///
/// # Endpoint
///
/// `GET /?name=&owner=&players=&submitter=`
pub async fn index_handler<S, B>(
    State(state): State<AppState<S, B>>,
    principal: Principal,
    jar: CookieJar,
    Query(filter): Query<ItemFilter>,
) -> Result<(CookieJar, Html<String>), PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let items = state.catalog.get_items(&filter).await?;
    listing(&state, &principal, jar, "Stuff", &filter, items).await
}

/// One random item matching the filter, shown with the listing layout.
pub async fn random_handler<S, B>(
    State(state): State<AppState<S, B>>,
    principal: Principal,
    jar: CookieJar,
    Query(filter): Query<ItemFilter>,
) -> Result<(CookieJar, Html<String>), PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let items = state.catalog.get_random_items(&filter, 1).await?;
    listing(&state, &principal, jar, "Random pick", &filter, items).await
}

/// Items the current user submitted.
pub async fn submissions_handler<S, B>(
    State(state): State<AppState<S, B>>,
    principal: Principal,
    jar: CookieJar,
    Query(filter): Query<ItemFilter>,
) -> Result<(CookieJar, Html<String>), PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let items = state
        .catalog
        .get_submissions(&filter, &principal.username)
        .await?;
    let (jar, flash) = state.session.take_flash(jar);
    let chrome = state.chrome(&principal, flash);
    Ok((jar, Html(pages::render_submissions(&chrome, &items))))
}

/// Item detail page.
///
/// # Endpoint
///
/// `GET /{entity}/{name}`
///
/// # Errors
///
/// - `404 Not Found`: No item with this name
pub async fn item_handler<S, B>(
    State(state): State<AppState<S, B>>,
    principal: Principal,
    jar: CookieJar,
    Path(name): Path<String>,
) -> Result<(CookieJar, Html<String>), PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let item = state.catalog.require_item(&name).await?;
    let expansions = state.catalog.get_expansions(&item.name).await?;

    let csrf = state.session.csrf_token(&principal);
    let (jar, flash) = state.session.take_flash(jar);
    let chrome = state.chrome(&principal, flash);
    let html = pages::render_item(&chrome, &item, &expansions, csrf.as_deref());
    Ok((jar, Html(html)))
}

/// Render the submit/edit form.
async fn form_page<S, B>(
    state: &AppState<S, B>,
    principal: &Principal,
    title: &str,
    action: String,
    form: &ItemForm,
    error: Option<&str>,
    image_required: bool,
) -> Result<Html<String>, PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let item_names = state.catalog.get_item_names(None).await?;
    let csrf = state.session.csrf_token(principal);
    let chrome = state.chrome(principal, None);
    Ok(Html(pages::render_form(
        &chrome,
        &FormView {
            title,
            action,
            form,
            error,
            item_names: &item_names,
            image_required,
            csrf_token: csrf.as_deref(),
        },
    )))
}

/// A form sent back to the user with the reason it was rejected.
async fn rejected_form<S, B>(
    state: &AppState<S, B>,
    principal: &Principal,
    title: &str,
    action: String,
    form: &ItemForm,
    error: &str,
    image_required: bool,
) -> Result<Response, PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    debug!(user = %principal.username, error = error, "Form rejected");
    let page = form_page(state, principal, title, action, form, Some(error), image_required)
        .await?;
    Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
}

fn check_csrf(
    session: &SessionAuth,
    principal: &Principal,
    token: Option<&str>,
) -> Result<(), PageError> {
    if session.csrf_ok(principal, token) {
        Ok(())
    } else {
        Err(PageError::BadRequest("Invalid CSRF token".to_string()))
    }
}

/// Empty submission form, owner pre-filled with the current user.
///
/// # Endpoint
///
/// `GET /submit`
pub async fn submit_form_handler<S, B>(
    State(state): State<AppState<S, B>>,
    principal: Principal,
) -> Result<Html<String>, PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let form = ItemForm::for_submitter(&principal.username);
    form_page(
        &state,
        &principal,
        "Submit",
        "/submit".to_string(),
        &form,
        None,
        true,
    )
    .await
}

/// Create an item from the submitted form.
///
/// # Endpoint
///
/// `POST /submit` (multipart)
///
/// # Response
///
/// - `303 See Other` to `/` with a flash message on success
/// - `422 Unprocessable Entity` with the form and its first error
/// - `500 Internal Server Error` when a store fails
pub async fn submit_handler<S, B>(
    State(state): State<AppState<S, B>>,
    principal: Principal,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Response, PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let mut form = ItemForm::from_multipart(multipart).await?;
    check_csrf(&state.session, &principal, form.csrf_token.as_deref())?;

    let action = "/submit".to_string();
    if let Some(error) = form.first_error(true) {
        form.image = None;
        return rejected_form(&state, &principal, "Submit", action, &form, &error, true).await;
    }

    match state
        .catalog
        .submit(form.fields(), form.image.take(), &principal)
        .await
    {
        Ok(_) => {
            let jar = jar.add(
                state
                    .session
                    .flash_cookie("Stuff successfully submitted, thanks!"),
            );
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(e) if e.is_user_error() => {
            rejected_form(&state, &principal, "Submit", action, &form, &e.to_string(), true).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Edit form pre-filled with the current values.
///
/// # Endpoint
///
/// `GET /edit/{name}`
pub async fn edit_form_handler<S, B>(
    State(state): State<AppState<S, B>>,
    principal: Principal,
    Path(name): Path<String>,
) -> Result<Html<String>, PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let item = state.catalog.require_item(&name).await?;
    let form = ItemForm::from_item(&item);
    form_page(
        &state,
        &principal,
        &format!("Edit {}", item.name),
        edit_action(&item.name),
        &form,
        None,
        false,
    )
    .await
}

/// Apply an edit, possibly renaming the item.
///
/// # Endpoint
///
/// `POST /edit/{name}` (multipart)
///
/// # Response
///
/// - `303 See Other` to `/` with a flash message on success
/// - `404 Not Found` when the item does not exist
/// - `422 Unprocessable Entity` with the form and its first error
pub async fn edit_handler<S, B>(
    State(state): State<AppState<S, B>>,
    principal: Principal,
    jar: CookieJar,
    Path(name): Path<String>,
    multipart: Multipart,
) -> Result<Response, PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let mut form = ItemForm::from_multipart(multipart).await?;
    check_csrf(&state.session, &principal, form.csrf_token.as_deref())?;

    let title = format!("Edit {}", name);
    if let Some(error) = form.first_error(false) {
        state.catalog.require_item(&name).await?;
        form.image = None;
        return rejected_form(
            &state,
            &principal,
            &title,
            edit_action(&name),
            &form,
            &error,
            false,
        )
        .await;
    }

    match state
        .catalog
        .edit(&name, form.fields(), form.image.take(), &principal)
        .await
    {
        Ok(_) => {
            let jar = jar.add(state.session.flash_cookie("Stuff successfully submitted."));
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(e) if e.is_user_error() => {
            rejected_form(
                &state,
                &principal,
                &title,
                edit_action(&name),
                &form,
                &e.to_string(),
                false,
            )
            .await
        }
        Err(e) => Err(e.into()),
    }
}

fn edit_action(name: &str) -> String {
    format!("/edit/{}", urlencoding::encode(name))
}

/// Delete an item. Only its submitter may do so.
///
/// # Endpoint
///
/// `POST /delete/{name}`
///
/// # Response
///
/// - `303 See Other` to `/` on success
/// - `404 Not Found` when the item is missing or belongs to someone else
pub async fn delete_handler<S, B>(
    State(state): State<AppState<S, B>>,
    principal: Principal,
    jar: CookieJar,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Response, PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let token = form_urlencoded::parse(&body)
        .find(|(key, _)| key == "csrf_token")
        .map(|(_, value)| value.into_owned());
    check_csrf(&state.session, &principal, token.as_deref())?;

    if !state.catalog.delete_item(&name, &principal).await? {
        return Err(PageError::NotFound(format!("No item named {}", name)));
    }

    let jar = jar.add(state.session.flash_cookie("Stuff deleted."));
    Ok((jar, Redirect::to("/")).into_response())
}

// =============================================================================
// Tests
// =============================================================================
