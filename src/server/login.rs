//! Login, OIDC callback and logout handlers.
//!
//! # Flow
//!
//! ```text
//! GET /login?next=/item/Catan
//!     set stuff_oidc_state = sign(state, next)
//!     303 -> provider authorize URL (state)
//! GET /redirect_uri?code=..&state=..
//!     state must match the cookie        (400 otherwise)
//!     code -> access token -> username   (502 if the provider fails)
//!     set stuff_session, clear stuff_oidc_state
//!     303 -> next
//! GET /logout
//!     clear stuff_session
//! ```

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::catalog::{generate_token, ItemStore, KeyStore};
use crate::error::OidcError;
use crate::storage::ImageStore;

use super::handlers::{AppState, PageError};
use super::pages;
use super::session::{removal, safe_next, SESSION_COOKIE, STATE_COOKIE};

/// Query parameters for `/login`.
#[derive(Debug, Deserialize)]
pub struct LoginParams {
    /// Path to return to after login
    #[serde(default)]
    pub next: Option<String>,
}

/// Query parameters the provider sends to `/redirect_uri`.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    /// Set by the provider when the user denied access or login failed
    #[serde(default)]
    pub error: Option<String>,
}

/// Start the authorization code flow.
///
/// # Endpoint
///
/// `GET /login?next=<path>`
pub async fn login_handler<S, B>(
    State(state): State<AppState<S, B>>,
    jar: CookieJar,
    Query(params): Query<LoginParams>,
) -> Result<(CookieJar, Redirect), PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    let next = safe_next(params.next.as_deref().unwrap_or("/"));
    let oidc_state = generate_token();
    let authorize_url = state.oidc.authorize_url(&oidc_state).await?;

    let jar = jar.add(state.session.state_cookie(&oidc_state, next));
    Ok((jar, Redirect::to(&authorize_url)))
}

/// Finish the flow and establish the session.
///
/// # Endpoint
///
/// `GET /redirect_uri?code=<code>&state=<state>`
///
/// # Errors
///
/// - `400 Bad Request`: Missing code, or state does not match the login cookie
/// - `502 Bad Gateway`: The provider rejected the code or could not be reached
pub async fn redirect_handler<S, B>(
    State(state): State<AppState<S, B>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect), PageError>
where
    S: ItemStore + KeyStore,
    B: ImageStore,
{
    if let Some(error) = params.error {
        return Err(OidcError::Provider(format!("Login failed: {}", error)).into());
    }

    let (expected_state, next) = jar
        .get(STATE_COOKIE)
        .and_then(|c| state.session.signer.verify_state(c.value()).ok())
        .ok_or_else(|| PageError::BadRequest("Login session expired, please try again".to_string()))?;

    let provided_state = params.state.unwrap_or_default();
    if !bool::from(provided_state.as_bytes().ct_eq(expected_state.as_bytes())) {
        warn!("OIDC state mismatch");
        return Err(PageError::BadRequest("Login state mismatch".to_string()));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| PageError::BadRequest("Missing authorization code".to_string()))?;

    let username = state.oidc.authenticate(&code).await?;
    info!(user = %username, "User logged in");

    let jar = jar
        .remove(removal(STATE_COOKIE))
        .add(state.session.session_cookie(&username));
    Ok((jar, Redirect::to(safe_next(&next))))
}

/// End the session.
///
/// # Endpoint
///
/// `GET /logout`
pub async fn logout_handler(jar: CookieJar) -> Response {
    let jar = jar.remove(removal(SESSION_COOKIE));
    let html = pages::render_notice(
        "Logged out",
        "You have been logged out.",
        Some(("/", "Log in again")),
    );
    (jar, Html(html)).into_response()
}
