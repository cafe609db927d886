//! Catalog layer: item model, storage traits and the catalog service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             CatalogService              │
//! │  (queries, submit / edit / delete)      │
//! └──────────┬───────────────────┬──────────┘
//!            │                   │
//!            ▼                   ▼
//! ┌───────────────────┐ ┌───────────────────┐
//! │  ItemStore trait  │ │ ImageStore trait  │
//! │   (MongoStore)    │ │  (S3ImageStore)   │
//! └───────────────────┘ └───────────────────┘
//! ```
//!
//! API keys share the document store through the `KeyStore` trait and are
//! issued through [`ApiKeys`].

mod item;
mod keys;
mod mongo;
mod service;
mod store;

pub use item::{DistinctField, Item, ItemFields, ItemFilter};
pub use keys::{generate_token, ApiKey, ApiKeys, API_KEY_LENGTH};
pub use mongo::{filter_document, MongoStore, ITEMS_COLLECTION, KEYS_COLLECTION};
pub use service::{sample_items, CatalogService, DEFAULT_NEWEST_LIMIT};
pub use store::{ItemStore, KeyStore};
