use thiserror::Error;

/// Errors from the object store holding item images
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Source object of a copy does not exist
    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Errors from the document database
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Driver or server error
    #[error("Database error: {0}")]
    Database(String),

    /// Unique index on the item name rejected a write
    #[error("Duplicate item name: {0}")]
    Duplicate(String),
}

/// Errors surfaced by catalog operations
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// No item with this name
    #[error("Item not found: {name}")]
    NotFound { name: String },

    /// Another item already uses this name
    #[error("An item named \"{name}\" already exists")]
    NameTaken { name: String },

    /// Submission without an image
    #[error("An image is required")]
    MissingImage,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CatalogError {
    /// Whether the error is the caller's fault and can be shown on the form.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CatalogError::NameTaken { .. } | CatalogError::MissingImage
        ) || matches!(self, CatalogError::Store(StoreError::Duplicate(_)))
    }
}

/// Errors talking to the OpenID Connect provider
#[derive(Debug, Clone, Error)]
pub enum OidcError {
    /// Network failure or non-success status from the provider
    #[error("Identity provider request failed: {0}")]
    Provider(String),

    /// Provider answered with something we could not use
    #[error("Invalid identity provider response: {0}")]
    InvalidResponse(String),

    /// The userinfo document has no `preferred_username` claim
    #[error("Userinfo response has no preferred_username claim")]
    MissingUsername,
}
