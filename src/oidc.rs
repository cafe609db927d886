//! OpenID Connect client for the login flow.
//!
//! Implements the authorization code flow against a single provider:
//!
//! ```text
//! /login ──► provider authorize endpoint ──► /redirect_uri?code&state
//!                                                  │
//!            token endpoint ◄── exchange_code ─────┘
//!            userinfo endpoint ◄── userinfo(access_token) ──► preferred_username
//! ```
//!
//! Provider endpoints come from `<issuer>/.well-known/openid-configuration`,
//! fetched on first use and cached for the life of the process.

use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::OidcError;

/// Scopes requested from the provider.
pub const OIDC_SCOPES: &str = "openid profile";

/// The subset of the discovery document we use.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    #[serde(default)]
    preferred_username: Option<String>,
}

/// Client for one OpenID Connect provider.
pub struct OidcClient {
    http: reqwest::Client,
    issuer: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    metadata: OnceCell<ProviderMetadata>,
}

impl OidcClient {
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            issuer: issuer.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            metadata: OnceCell::new(),
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Discovery document URL for the configured issuer.
    pub fn discovery_url(&self) -> String {
        format!("{}/.well-known/openid-configuration", self.issuer)
    }

    /// Provider metadata, fetched once. A failed fetch is retried on the next call.
    pub async fn metadata(&self) -> Result<&ProviderMetadata, OidcError> {
        self.metadata
            .get_or_try_init(|| self.discover())
            .await
    }

    async fn discover(&self) -> Result<ProviderMetadata, OidcError> {
        let url = self.discovery_url();
        debug!(url = %url, "Fetching OIDC discovery document");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| OidcError::Provider(format!("Discovery request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(OidcError::Provider(format!(
                "Discovery failed: status={}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OidcError::InvalidResponse(format!("Discovery document: {}", e)))
    }

    /// Build the URL the browser is sent to for login.
    pub async fn authorize_url(&self, state: &str) -> Result<String, OidcError> {
        let metadata = self.metadata().await?;
        let separator = if metadata.authorization_endpoint.contains('?') {
            '&'
        } else {
            '?'
        };
        Ok(format!(
            "{}{}client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            metadata.authorization_endpoint,
            separator,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(OIDC_SCOPES),
            urlencoding::encode(state),
        ))
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, OidcError> {
        let metadata = self.metadata().await?;
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(&metadata.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| OidcError::Provider(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OidcError::Provider(format!(
                "Token exchange failed: status={}, body={}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| OidcError::InvalidResponse(format!("Token response: {}", e)))?;
        Ok(token.access_token)
    }

    /// Fetch the `preferred_username` claim for an access token.
    pub async fn userinfo(&self, access_token: &str) -> Result<String, OidcError> {
        let metadata = self.metadata().await?;
        let response = self
            .http
            .get(&metadata.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OidcError::Provider(format!("Userinfo request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(OidcError::Provider(format!(
                "Userinfo failed: status={}",
                response.status()
            )));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| OidcError::InvalidResponse(format!("Userinfo response: {}", e)))?;

        info.preferred_username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or(OidcError::MissingUsername)
    }

    /// Run the callback half of the flow: code in, username out.
    pub async fn authenticate(&self, code: &str) -> Result<String, OidcError> {
        let access_token = self.exchange_code(code).await?;
        self.userinfo(&access_token).await
    }
}
