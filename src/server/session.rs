//! Signed cookie sessions for the HTML routes.
//!
//! # Cookie Format
//!
//! Every signed value is a dot-separated list of hex-encoded fields, an
//! expiry timestamp and an HMAC-SHA256 over all of it:
//!
//! ```text
//! value     = hex(field1) "." hex(field2) ... "." expiry "." signature
//! signature = HMAC-SHA256(secret_key, "{purpose}:{everything before the signature}")
//! ```
//!
//! The purpose string keeps a value signed for one cookie from being replayed
//! as another. Three values use this scheme:
//!
//! - session (`stuff_session`): `username`
//! - login state (`stuff_oidc_state`): `state`, `next`
//! - flash (`stuff_flash`): a one-shot message shown after a redirect
//!
//! CSRF tokens are a plain HMAC over the username (no expiry), so a form
//! rendered for a user stays valid for the whole session.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;

use crate::principal::{Principal, Quartermasters};

type HmacSha256 = Hmac<Sha256>;

/// Cookie carrying the logged-in user.
pub const SESSION_COOKIE: &str = "stuff_session";

/// Cookie carrying the OIDC `state` and return path during login.
pub const STATE_COOKIE: &str = "stuff_oidc_state";

/// Cookie carrying a one-shot message for the next page view.
pub const FLASH_COOKIE: &str = "stuff_flash";

/// How long a login attempt may take.
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

const SESSION_PURPOSE: &str = "session";
const STATE_PURPOSE: &str = "state";
const FLASH_PURPOSE: &str = "flash";
const CSRF_PURPOSE: &str = "csrf";

/// Why a signed value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Malformed signed value")]
    Malformed,

    #[error("Signed value expired at {expired_at} (current time: {current_time})")]
    Expired { expired_at: u64, current_time: u64 },

    #[error("Invalid signature")]
    InvalidSignature,
}

// =============================================================================
// Signer
// =============================================================================

/// Signs and verifies cookie values with HMAC-SHA256.
#[derive(Clone)]
pub struct SessionSigner {
    secret_key: Vec<u8>,
}

impl SessionSigner {
    pub fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
        }
    }

    /// Session value for `username`, valid for `ttl`.
    pub fn issue(&self, username: &str, ttl: Duration) -> String {
        self.issue_with_expiry(username, now_secs() + ttl.as_secs())
    }

    /// Session value for `username` expiring at a fixed Unix timestamp.
    pub fn issue_with_expiry(&self, username: &str, expiry: u64) -> String {
        self.seal(SESSION_PURPOSE, &[username], expiry)
    }

    /// Username carried by a session value.
    pub fn verify(&self, value: &str) -> Result<String, SessionError> {
        let mut fields = self.open(SESSION_PURPOSE, value, 1)?;
        fields.pop().ok_or(SessionError::Malformed)
    }

    /// Login state value binding the OIDC `state` to the page to return to.
    pub fn sign_state(&self, state: &str, next: &str) -> String {
        self.seal(STATE_PURPOSE, &[state, next], now_secs() + STATE_TTL.as_secs())
    }

    /// `(state, next)` carried by a login state value.
    pub fn verify_state(&self, value: &str) -> Result<(String, String), SessionError> {
        let mut fields = self.open(STATE_PURPOSE, value, 2)?.into_iter();
        match (fields.next(), fields.next()) {
            (Some(state), Some(next)) => Ok((state, next)),
            _ => Err(SessionError::Malformed),
        }
    }

    /// Flash value for `message`, valid until the next few page views.
    pub fn sign_flash(&self, message: &str) -> String {
        self.seal(FLASH_PURPOSE, &[message], now_secs() + STATE_TTL.as_secs())
    }

    pub fn verify_flash(&self, value: &str) -> Result<String, SessionError> {
        let mut fields = self.open(FLASH_PURPOSE, value, 1)?;
        fields.pop().ok_or(SessionError::Malformed)
    }

    /// CSRF token bound to `username`.
    pub fn csrf_token(&self, username: &str) -> String {
        hex::encode(self.mac(CSRF_PURPOSE, username))
    }

    /// Constant-time check of a submitted CSRF token.
    pub fn verify_csrf(&self, username: &str, token: &str) -> bool {
        let Ok(provided) = hex::decode(token) else {
            return false;
        };
        let expected = self.mac(CSRF_PURPOSE, username);
        provided.ct_eq(&expected).into()
    }

    fn seal(&self, purpose: &str, fields: &[&str], expiry: u64) -> String {
        let mut payload: Vec<String> = fields.iter().map(hex::encode).collect();
        payload.push(expiry.to_string());
        let payload = payload.join(".");
        let signature = hex::encode(self.mac(purpose, &payload));
        format!("{}.{}", payload, signature)
    }

    fn open(
        &self,
        purpose: &str,
        value: &str,
        field_count: usize,
    ) -> Result<Vec<String>, SessionError> {
        let (payload, signature) = value.rsplit_once('.').ok_or(SessionError::Malformed)?;
        let parts: Vec<&str> = payload.split('.').collect();
        if parts.len() != field_count + 1 {
            return Err(SessionError::Malformed);
        }

        let provided = hex::decode(signature).map_err(|_| SessionError::Malformed)?;
        let expected = self.mac(purpose, payload);
        if !bool::from(provided.ct_eq(&expected)) {
            return Err(SessionError::InvalidSignature);
        }

        let expiry: u64 = parts[field_count]
            .parse()
            .map_err(|_| SessionError::Malformed)?;
        let current_time = now_secs();
        if current_time > expiry {
            return Err(SessionError::Expired {
                expired_at: expiry,
                current_time,
            });
        }

        parts[..field_count]
            .iter()
            .map(|field| {
                hex::decode(field)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                    .ok_or(SessionError::Malformed)
            })
            .collect()
    }

    fn mac(&self, purpose: &str, message: &str) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(purpose.as_bytes());
        mac.update(b":");
        mac.update(message.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// =============================================================================
// Session Settings
// =============================================================================

/// Everything the HTML routes need to manage sessions.
#[derive(Clone)]
pub struct SessionAuth {
    pub signer: SessionSigner,
    pub quartermasters: Quartermasters,
    pub ttl: Duration,
    pub secure: bool,
    pub csrf_enabled: bool,
}

impl SessionAuth {
    pub fn new(secret_key: impl AsRef<[u8]>, quartermasters: Quartermasters) -> Self {
        Self {
            signer: SessionSigner::new(secret_key),
            quartermasters,
            ttl: Duration::from_secs(crate::config::DEFAULT_SESSION_TTL),
            secure: true,
            csrf_enabled: false,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_csrf(mut self, enabled: bool) -> Self {
        self.csrf_enabled = enabled;
        self
    }

    /// Resolve the principal from a request's cookies, if logged in.
    pub fn principal(&self, jar: &CookieJar) -> Option<Principal> {
        let cookie = jar.get(SESSION_COOKIE)?;
        match self.signer.verify(cookie.value()) {
            Ok(username) => Some(self.quartermasters.principal(&username)),
            Err(e) => {
                debug!(error = %e, "Rejected session cookie");
                None
            }
        }
    }

    pub fn session_cookie(&self, username: &str) -> Cookie<'static> {
        self.cookie(SESSION_COOKIE, self.signer.issue(username, self.ttl))
    }

    pub fn state_cookie(&self, state: &str, next: &str) -> Cookie<'static> {
        self.cookie(STATE_COOKIE, self.signer.sign_state(state, next))
    }

    pub fn flash_cookie(&self, message: &str) -> Cookie<'static> {
        self.cookie(FLASH_COOKIE, self.signer.sign_flash(message))
    }

    /// Take the pending flash message, clearing its cookie.
    pub fn take_flash(&self, jar: CookieJar) -> (CookieJar, Option<String>) {
        let message = jar
            .get(FLASH_COOKIE)
            .and_then(|c| self.signer.verify_flash(c.value()).ok());
        if jar.get(FLASH_COOKIE).is_some() {
            (jar.remove(removal(FLASH_COOKIE)), message)
        } else {
            (jar, message)
        }
    }

    /// CSRF token to embed in forms rendered for `principal`, if enabled.
    pub fn csrf_token(&self, principal: &Principal) -> Option<String> {
        self.csrf_enabled
            .then(|| self.signer.csrf_token(&principal.username))
    }

    /// Whether a submitted form passes the CSRF check.
    pub fn csrf_ok(&self, principal: &Principal, token: Option<&str>) -> bool {
        if !self.csrf_enabled {
            return true;
        }
        token.is_some_and(|t| self.signer.verify_csrf(&principal.username, t))
    }

    fn cookie(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }
}

/// Cookie matching `name` for removal from a jar.
pub fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

// =============================================================================
// Extractor
// =============================================================================

/// Rejection for HTML routes without a valid session: start a login that
/// returns to the requested page.
#[derive(Debug)]
pub struct LoginRedirect {
    pub next: String,
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        let target = format!("/login?next={}", urlencoding::encode(&self.next));
        Redirect::to(&target).into_response()
    }
}

impl<S> FromRequestParts<S> for Principal
where
    Arc<SessionAuth>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<SessionAuth>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        auth.principal(&jar).ok_or_else(|| {
            let next = parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string());
            LoginRedirect { next }
        })
    }
}

/// Only same-site paths are allowed as login return targets.
pub fn safe_next(next: &str) -> &str {
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        next
    } else {
        "/"
    }
}

// =============================================================================
// Tests
// =============================================================================
