//! The submit/edit form: multipart parsing and validation.

use axum::extract::multipart::{Multipart, MultipartError};
use validator::Validate;

use crate::catalog::{Item, ItemFields};
use crate::storage::ImageUpload;

/// Largest accepted request body for form posts (16 MiB).
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Field order used when picking the error to show.
const FIELD_ORDER: &[&str] = &["name", "owner", "players", "info"];

/// A submitted item form.
///
/// Text fields other than `info` are trimmed on parse, so the length rules
/// apply to what will be stored.
#[derive(Debug, Clone, Default, Validate)]
pub struct ItemForm {
    #[validate(length(min = 1, max = 128, message = "Name must be between 1 and 128 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 64, message = "Owner must be between 1 and 64 characters"))]
    pub owner: String,

    #[validate(length(max = 32, message = "Players must be at most 32 characters"))]
    pub players: String,

    #[validate(length(max = 10000, message = "Info must be at most 10000 characters"))]
    pub info: String,

    pub image: Option<ImageUpload>,

    pub csrf_token: Option<String>,
}

impl ItemForm {
    /// Form pre-filled for a new submission by `username`.
    pub fn for_submitter(username: &str) -> Self {
        Self {
            owner: username.to_string(),
            ..Default::default()
        }
    }

    /// Form pre-filled with an existing item.
    pub fn from_item(item: &Item) -> Self {
        Self {
            name: item.name.clone(),
            owner: item.owner.clone(),
            players: item.players.clone().unwrap_or_default(),
            info: item.info.clone(),
            image: None,
            csrf_token: None,
        }
    }

    /// Read the form from a multipart body.
    ///
    /// A file part with no filename or no bytes is how browsers send an
    /// untouched file input, so it counts as no image.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut form = ItemForm::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match name.as_str() {
                "image" => {
                    let has_filename = field.file_name().is_some_and(|f| !f.is_empty());
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let data = field.bytes().await?;
                    if has_filename && !data.is_empty() {
                        form.image = Some(ImageUpload::new(data, content_type));
                    }
                }
                "name" => form.name = field.text().await?.trim().to_string(),
                "owner" => form.owner = field.text().await?.trim().to_string(),
                "players" => form.players = field.text().await?.trim().to_string(),
                "info" => form.info = field.text().await?,
                "csrf_token" => form.csrf_token = Some(field.text().await?),
                _ => {}
            }
        }

        Ok(form)
    }

    /// The first problem with this form, in field order, if any.
    pub fn first_error(&self, image_required: bool) -> Option<String> {
        if let Err(errors) = self.validate() {
            let field_errors = errors.field_errors();
            for field in FIELD_ORDER {
                if let Some(error) = field_errors.get(*field).and_then(|errs| errs.first()) {
                    return Some(
                        error
                            .message
                            .as_ref()
                            .map_or_else(|| error.code.to_string(), ToString::to_string),
                    );
                }
            }
        }

        match self.image {
            None if image_required => Some("An image is required".to_string()),
            Some(ref image) if !image.content_type.starts_with("image/") => {
                Some("The uploaded file must be an image".to_string())
            }
            _ => None,
        }
    }

    /// The editable item fields carried by this form.
    pub fn fields(&self) -> ItemFields {
        ItemFields {
            name: self.name.clone(),
            owner: self.owner.clone(),
            players: Some(self.players.clone()).filter(|p| !p.is_empty()),
            info: self.info.clone(),
        }
    }
}
