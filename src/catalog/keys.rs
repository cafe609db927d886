//! API keys for programmatic access to the JSON routes.
//!
//! Keys come in two tiers: read keys browse `/api/*`, quartermaster keys may
//! additionally issue and list keys.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::store::KeyStore;
use crate::error::StoreError;

/// Length of generated key tokens.
pub const API_KEY_LENGTH: usize = 40;

/// An issued API key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    /// The secret token presented by clients
    pub key: String,

    /// Whether this key may manage other keys
    #[serde(default)]
    pub quartermaster: bool,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Create a fresh random key of the given tier.
    pub fn generate(quartermaster: bool) -> Self {
        Self {
            key: generate_token(),
            quartermaster,
            created_at: Utc::now(),
        }
    }
}

/// Random alphanumeric token of `API_KEY_LENGTH` characters.
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_LENGTH)
        .map(char::from)
        .collect()
}

/// Issues and looks up API keys.
pub struct ApiKeys<K> {
    store: Arc<K>,
}

impl<K> Clone for ApiKeys<K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<K: KeyStore> ApiKeys<K> {
    pub fn new(store: Arc<K>) -> Self {
        Self { store }
    }

    /// Create and persist a new key.
    pub async fn generate_api_key(&self, quartermaster: bool) -> Result<ApiKey, StoreError> {
        let key = ApiKey::generate(quartermaster);
        self.store.insert_key(&key).await?;
        info!(quartermaster = quartermaster, "Issued API key");
        Ok(key)
    }

    /// Every issued key.
    pub async fn get_api_keys(&self) -> Result<Vec<ApiKey>, StoreError> {
        self.store.list_keys().await
    }

    /// Resolve a presented token. Empty tokens never match.
    pub async fn lookup(&self, token: &str) -> Result<Option<ApiKey>, StoreError> {
        if token.is_empty() {
            return Ok(None);
        }
        self.store.find_key(token).await
    }
}
