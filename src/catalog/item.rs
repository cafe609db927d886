use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A catalog entry.
///
/// The item's image lives in the object store under [`image_key`] of its
/// name, so the record itself carries no image data.
///
/// [`image_key`]: crate::storage::image_key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique name, also the basename of the image object
    pub name: String,

    /// Who physically holds the item
    pub owner: String,

    /// Who created the record
    pub submitter: String,

    /// Free-form player count (e.g. "2-4")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<String>,

    /// Markdown description, stored exactly as submitted
    #[serde(default)]
    pub info: String,

    /// Submission time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Create a new record submitted by `submitter` at `created_at`.
    pub fn new(fields: ItemFields, submitter: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            name: fields.name,
            owner: fields.owner,
            submitter: submitter.into(),
            players: fields.players,
            info: fields.info,
            created_at,
        }
    }

    /// Replace the editable fields, keeping submitter and creation time.
    pub fn with_fields(&self, fields: ItemFields) -> Self {
        Self {
            name: fields.name,
            owner: fields.owner,
            submitter: self.submitter.clone(),
            players: fields.players,
            info: fields.info,
            created_at: self.created_at,
        }
    }

    /// The editable fields of this item, used to pre-fill the edit form.
    pub fn fields(&self) -> ItemFields {
        ItemFields {
            name: self.name.clone(),
            owner: self.owner.clone(),
            players: self.players.clone(),
            info: self.info.clone(),
        }
    }
}

/// The user-editable part of an item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFields {
    pub name: String,
    pub owner: String,
    pub players: Option<String>,
    pub info: String,
}

impl ItemFields {
    /// Trim every field except `info`, whose whitespace is significant.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            owner: self.owner.trim().to_string(),
            players: self
                .players
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            info: self.info,
        }
    }
}

/// Query-string filters shared by the listing routes.
///
/// Empty values are treated as absent so that an untouched filter form
/// (`?owner=&submitter=`) matches everything.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ItemFilter {
    /// Case-insensitive substring of the name
    #[serde(default, deserialize_with = "empty_as_none")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub owner: Option<String>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub submitter: Option<String>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub players: Option<String>,
}

impl ItemFilter {
    /// Restrict the filter to items submitted by `username`.
    pub fn with_submitter(mut self, username: impl Into<String>) -> Self {
        self.submitter = Some(username.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.owner.is_none()
            && self.submitter.is_none()
            && self.players.is_none()
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Fields with a distinct-values listing for the filter UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistinctField {
    Owner,
    Players,
    Submitter,
}

impl DistinctField {
    /// Document field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DistinctField::Owner => "owner",
            DistinctField::Players => "players",
            DistinctField::Submitter => "submitter",
        }
    }
}
