use async_trait::async_trait;

use super::item::{DistinctField, Item, ItemFilter};
use super::keys::ApiKey;
use crate::error::StoreError;

/// Trait for the document store holding catalog items.
///
/// This abstraction keeps the catalog service independent of the database
/// driver. Implementations must treat `name` as a unique key.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Items matching `filter`, ordered by name.
    async fn find_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError>;

    /// The item called `name`, if any.
    async fn find_item(&self, name: &str) -> Result<Option<Item>, StoreError>;

    /// Every item name, sorted.
    async fn item_names(&self) -> Result<Vec<String>, StoreError>;

    /// Number of items matching `filter`.
    async fn count_items(&self, filter: &ItemFilter) -> Result<u64, StoreError>;

    /// Sorted distinct values of `field` among items matching `filter`.
    async fn distinct_values(
        &self,
        field: DistinctField,
        filter: &ItemFilter,
    ) -> Result<Vec<String>, StoreError>;

    /// Up to `limit` items matching `filter`, most recently created first.
    ///
    /// A `limit` of zero yields no items.
    async fn newest_items(&self, filter: &ItemFilter, limit: usize)
        -> Result<Vec<Item>, StoreError>;

    /// Insert a new record. Fails with `StoreError::Duplicate` if the name is taken.
    async fn insert_item(&self, item: &Item) -> Result<(), StoreError>;

    /// Replace the record called `name` with `item` (which may carry a new name).
    ///
    /// Returns `false` when no record called `name` exists.
    async fn replace_item(&self, name: &str, item: &Item) -> Result<bool, StoreError>;

    /// Delete the record called `name` only if it was submitted by `submitter`.
    ///
    /// Returns whether a record was removed.
    async fn delete_item(&self, name: &str, submitter: &str) -> Result<bool, StoreError>;
}

/// Trait for persisting API keys.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn insert_key(&self, key: &ApiKey) -> Result<(), StoreError>;

    /// Look up a key by its token.
    async fn find_key(&self, token: &str) -> Result<Option<ApiKey>, StoreError>;

    /// All issued keys, oldest first.
    async fn list_keys(&self) -> Result<Vec<ApiKey>, StoreError>;
}
