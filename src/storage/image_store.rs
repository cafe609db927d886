use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

/// Suffix appended to an item name to form its object key.
pub const IMAGE_SUFFIX: &str = ".jpg";

/// Object key holding the image of the item called `name`.
pub fn image_key(name: &str) -> String {
    format!("{}{}", name, IMAGE_SUFFIX)
}

/// An image uploaded through the submit or edit form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Raw file contents
    pub data: Bytes,

    /// Content type reported by the browser (e.g. "image/jpeg")
    pub content_type: String,
}

impl ImageUpload {
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }
}

/// Trait for the object store that holds item images.
///
/// Every object written through this trait is publicly readable, since the
/// catalog pages link to images directly under `IMAGE_URL`.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Write `upload` to `key`, replacing any existing object.
    async fn put(&self, key: &str, upload: &ImageUpload) -> Result<(), StorageError>;

    /// Server-side copy of `from` to `to`.
    async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError>;

    /// Remove the object at `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}
