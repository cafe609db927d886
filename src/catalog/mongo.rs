//! MongoDB-backed item and key store.
//!
//! Items live in the `items` collection with a unique index on `name`;
//! API keys live in `api_keys` with a unique index on `key`.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::debug;

use super::item::{DistinctField, Item, ItemFilter};
use super::keys::ApiKey;
use super::store::{ItemStore, KeyStore};
use crate::error::StoreError;

/// Collection holding catalog items.
pub const ITEMS_COLLECTION: &str = "items";

/// Collection holding API keys.
pub const KEYS_COLLECTION: &str = "api_keys";

/// Server error code for unique index violations.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Document store over a MongoDB database.
#[derive(Clone)]
pub struct MongoStore {
    items: Collection<Item>,
    keys: Collection<ApiKey>,
}

impl MongoStore {
    /// Connect to `uri` and use `database`.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await.map_err(db_error)?;
        Ok(Self::new(&client.database(database)))
    }

    pub fn new(database: &Database) -> Self {
        Self {
            items: database.collection(ITEMS_COLLECTION),
            keys: database.collection(KEYS_COLLECTION),
        }
    }

    /// Create the unique indexes the store relies on. Idempotent.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.items
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "name": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .map_err(db_error)?;

        self.keys
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "key": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .map_err(db_error)?;

        debug!("Database indexes ready");
        Ok(())
    }
}

/// Translate an item filter into a query document.
pub fn filter_document(filter: &ItemFilter) -> Document {
    let mut query = Document::new();
    if let Some(ref name) = filter.name {
        query.insert(
            "name",
            doc! { "$regex": regex::escape(name), "$options": "i" },
        );
    }
    if let Some(ref owner) = filter.owner {
        query.insert("owner", owner.as_str());
    }
    if let Some(ref submitter) = filter.submitter {
        query.insert("submitter", submitter.as_str());
    }
    if let Some(ref players) = filter.players {
        query.insert("players", players.as_str());
    }
    query
}

fn db_error(err: mongodb::error::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

fn write_error(err: mongodb::error::Error, name: &str) -> StoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(ref failure)) = *err.kind {
        if failure.code == DUPLICATE_KEY_CODE {
            return StoreError::Duplicate(name.to_string());
        }
    }
    db_error(err)
}

fn strings(values: Vec<Bson>) -> Vec<String> {
    let mut values: Vec<String> = values
        .into_iter()
        .filter_map(|v| match v {
            Bson::String(s) => Some(s),
            _ => None,
        })
        .collect();
    values.sort();
    values
}

#[async_trait]
impl ItemStore for MongoStore {
    async fn find_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, StoreError> {
        self.items
            .find(filter_document(filter))
            .sort(doc! { "name": 1 })
            .await
            .map_err(db_error)?
            .try_collect()
            .await
            .map_err(db_error)
    }

    async fn find_item(&self, name: &str) -> Result<Option<Item>, StoreError> {
        self.items
            .find_one(doc! { "name": name })
            .await
            .map_err(db_error)
    }

    async fn item_names(&self) -> Result<Vec<String>, StoreError> {
        let names = self
            .items
            .distinct("name", doc! {})
            .await
            .map_err(db_error)?;
        Ok(strings(names))
    }

    async fn count_items(&self, filter: &ItemFilter) -> Result<u64, StoreError> {
        self.items
            .count_documents(filter_document(filter))
            .await
            .map_err(db_error)
    }

    async fn distinct_values(
        &self,
        field: DistinctField,
        filter: &ItemFilter,
    ) -> Result<Vec<String>, StoreError> {
        let values = self
            .items
            .distinct(field.as_str(), filter_document(filter))
            .await
            .map_err(db_error)?;
        Ok(strings(values))
    }

    async fn newest_items(
        &self,
        filter: &ItemFilter,
        limit: usize,
    ) -> Result<Vec<Item>, StoreError> {
        // The server reads a zero limit as "no limit"
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.items
            .find(filter_document(filter))
            .sort(doc! { "created_at": -1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(db_error)?
            .try_collect()
            .await
            .map_err(db_error)
    }

    async fn insert_item(&self, item: &Item) -> Result<(), StoreError> {
        self.items
            .insert_one(item)
            .await
            .map_err(|e| write_error(e, &item.name))?;
        Ok(())
    }

    async fn replace_item(&self, name: &str, item: &Item) -> Result<bool, StoreError> {
        let result = self
            .items
            .replace_one(doc! { "name": name }, item)
            .await
            .map_err(|e| write_error(e, &item.name))?;
        Ok(result.matched_count > 0)
    }

    async fn delete_item(&self, name: &str, submitter: &str) -> Result<bool, StoreError> {
        let result = self
            .items
            .delete_one(doc! { "name": name, "submitter": submitter })
            .await
            .map_err(db_error)?;
        Ok(result.deleted_count == 1)
    }
}

#[async_trait]
impl KeyStore for MongoStore {
    async fn insert_key(&self, key: &ApiKey) -> Result<(), StoreError> {
        self.keys.insert_one(key).await.map_err(db_error)?;
        Ok(())
    }

    async fn find_key(&self, token: &str) -> Result<Option<ApiKey>, StoreError> {
        self.keys
            .find_one(doc! { "key": token })
            .await
            .map_err(db_error)
    }

    async fn list_keys(&self) -> Result<Vec<ApiKey>, StoreError> {
        self.keys
            .find(doc! {})
            .sort(doc! { "created_at": 1 })
            .await
            .map_err(db_error)?
            .try_collect()
            .await
            .map_err(db_error)
    }
}
