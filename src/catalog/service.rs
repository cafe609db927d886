//! Catalog service: the single entry point for item reads and writes.
//!
//! Writes keep the document store and the image store in step:
//!
//! ```text
//! submit:  put <name>.jpg ─────────────────────────────► insert record
//! edit:    [put|copy] <new>.jpg ─► delete <old>.jpg ───► replace record
//! delete:  delete record (submitter only) ─────────────► delete <name>.jpg
//! ```
//!
//! A failing step aborts everything after it. Nothing is rolled back.

use std::sync::Arc;

use chrono::Utc;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, info};

use super::item::{DistinctField, Item, ItemFields, ItemFilter};
use super::store::ItemStore;
use crate::error::{CatalogError, StorageError, StoreError};
use crate::principal::Principal;
use crate::storage::{image_key, ImageStore, ImageUpload};

/// Default number of items returned by the "newest" listing.
pub const DEFAULT_NEWEST_LIMIT: usize = 10;

/// Service coordinating the item store and the image store.
///
/// # Type Parameters
///
/// * `S` - The item store (e.g. `MongoStore`)
/// * `B` - The image store (e.g. `S3ImageStore`)
pub struct CatalogService<S, B> {
    store: Arc<S>,
    images: B,
}

impl<S: ItemStore, B: ImageStore> CatalogService<S, B> {
    pub fn new(store: Arc<S>, images: B) -> Self {
        Self { store, images }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, CatalogError> {
        Ok(self.store.find_items(filter).await?)
    }

    pub async fn get_item(&self, name: &str) -> Result<Option<Item>, CatalogError> {
        Ok(self.store.find_item(name).await?)
    }

    /// Like [`get_item`](Self::get_item) but absence is an error.
    pub async fn require_item(&self, name: &str) -> Result<Item, CatalogError> {
        self.get_item(name)
            .await?
            .ok_or_else(|| CatalogError::NotFound {
                name: name.to_string(),
            })
    }

    /// All item names, optionally leaving one out.
    pub async fn get_item_names(&self, exclude: Option<&str>) -> Result<Vec<String>, CatalogError> {
        let mut names = self.store.item_names().await?;
        if let Some(exclude) = exclude {
            names.retain(|n| n != exclude);
        }
        Ok(names)
    }

    /// Names of other items extending `name` (e.g. "Catan: Seafarers" for "Catan").
    pub async fn get_expansions(&self, name: &str) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .get_item_names(Some(name))
            .await?
            .into_iter()
            .filter(|n| n.starts_with(name))
            .collect())
    }

    pub async fn get_count(&self, filter: &ItemFilter) -> Result<u64, CatalogError> {
        Ok(self.store.count_items(filter).await?)
    }

    pub async fn get_owners(&self, filter: &ItemFilter) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .store
            .distinct_values(DistinctField::Owner, filter)
            .await?)
    }

    pub async fn get_players(&self, filter: &ItemFilter) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .store
            .distinct_values(DistinctField::Players, filter)
            .await?)
    }

    pub async fn get_submitters(&self, filter: &ItemFilter) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .store
            .distinct_values(DistinctField::Submitter, filter)
            .await?)
    }

    pub async fn get_newest_items(
        &self,
        filter: &ItemFilter,
        limit: usize,
    ) -> Result<Vec<Item>, CatalogError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.store.newest_items(filter, limit).await?)
    }

    /// A uniform random sample of `n` distinct items matching `filter`,
    /// or all of them when fewer match.
    pub async fn get_random_items(
        &self,
        filter: &ItemFilter,
        n: usize,
    ) -> Result<Vec<Item>, CatalogError> {
        let items = self.store.find_items(filter).await?;
        Ok(sample_items(&items, n, &mut rand::rng()))
    }

    /// Items submitted by `username`, further narrowed by `filter`.
    pub async fn get_submissions(
        &self,
        filter: &ItemFilter,
        username: &str,
    ) -> Result<Vec<Item>, CatalogError> {
        let filter = filter.clone().with_submitter(username);
        Ok(self.store.find_items(&filter).await?)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Create a new item owned by the form's owner and submitted by `principal`.
    pub async fn submit(
        &self,
        fields: ItemFields,
        image: Option<ImageUpload>,
        principal: &Principal,
    ) -> Result<Item, CatalogError> {
        let fields = fields.normalized();
        let image = image.ok_or(CatalogError::MissingImage)?;

        if self.store.find_item(&fields.name).await?.is_some() {
            return Err(CatalogError::NameTaken { name: fields.name });
        }

        self.images.put(&image_key(&fields.name), &image).await?;

        let item = Item::new(fields, principal.username.as_str(), Utc::now());
        self.store
            .insert_item(&item)
            .await
            .map_err(name_taken)?;

        info!(
            item = %item.name,
            submitter = %principal.username,
            "Item submitted"
        );
        Ok(item)
    }

    /// Update the item called `old_name`, possibly renaming it.
    ///
    /// Submitter and creation time are preserved. When no new image is
    /// supplied the existing blob is kept (and moved on rename).
    pub async fn edit(
        &self,
        old_name: &str,
        fields: ItemFields,
        image: Option<ImageUpload>,
        principal: &Principal,
    ) -> Result<Item, CatalogError> {
        let fields = fields.normalized();
        let old = self.require_item(old_name).await?;
        let renamed = old.name != fields.name;

        if renamed && self.store.find_item(&fields.name).await?.is_some() {
            return Err(CatalogError::NameTaken { name: fields.name });
        }

        let updated = old.with_fields(fields);
        self.sync_image(&old.name, &updated.name, image.as_ref())
            .await?;

        let replaced = self
            .store
            .replace_item(&old.name, &updated)
            .await
            .map_err(name_taken)?;
        if !replaced {
            return Err(CatalogError::NotFound { name: old.name });
        }

        info!(
            item = %updated.name,
            previous = %old.name,
            editor = %principal.username,
            "Item edited"
        );
        Ok(updated)
    }

    /// Delete the item called `name` if `principal` submitted it.
    ///
    /// Returns `false` both when the item does not exist and when it belongs
    /// to someone else.
    pub async fn delete_item(&self, name: &str, principal: &Principal) -> Result<bool, CatalogError> {
        let deleted = self.store.delete_item(name, &principal.username).await?;
        if !deleted {
            debug!(item = name, user = %principal.username, "Delete refused");
            return Ok(false);
        }

        self.images.delete(&image_key(name)).await?;
        info!(item = name, user = %principal.username, "Item deleted");
        Ok(true)
    }

    /// Bring the image store in line with an edit from `old_name` to `new_name`.
    async fn sync_image(
        &self,
        old_name: &str,
        new_name: &str,
        image: Option<&ImageUpload>,
    ) -> Result<(), StorageError> {
        let old_key = image_key(old_name);
        let new_key = image_key(new_name);

        match (old_name == new_name, image) {
            (true, None) => Ok(()),
            (true, Some(upload)) => self.images.put(&new_key, upload).await,
            // The fresh upload replaces the old blob, so there is nothing to copy
            (false, Some(upload)) => {
                self.images.put(&new_key, upload).await?;
                self.images.delete(&old_key).await
            }
            (false, None) => {
                self.images.copy(&old_key, &new_key).await?;
                self.images.delete(&old_key).await
            }
        }
    }
}

fn name_taken(err: StoreError) -> CatalogError {
    match err {
        StoreError::Duplicate(name) => CatalogError::NameTaken { name },
        other => CatalogError::Store(other),
    }
}

/// Pick `n` distinct items uniformly at random (all of them if fewer).
pub fn sample_items<R: Rng + ?Sized>(items: &[Item], n: usize, rng: &mut R) -> Vec<Item> {
    items.choose_multiple(rng, n).cloned().collect()
}
