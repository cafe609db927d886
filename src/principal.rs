//! The authenticated user a request acts on behalf of.

use serde::Serialize;

/// A logged-in user, built from the `preferred_username` claim of the
/// identity provider and carried explicitly into every catalog call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Username as reported by the identity provider
    pub username: String,

    /// Whether this user may see quartermaster tooling
    pub quartermaster: bool,
}

impl Principal {
    pub fn new(username: impl Into<String>, quartermaster: bool) -> Self {
        Self {
            username: username.into(),
            quartermaster,
        }
    }
}

/// The set of usernames holding the quartermaster role.
#[derive(Debug, Clone, Default)]
pub struct Quartermasters {
    usernames: Vec<String>,
}

impl Quartermasters {
    pub fn new(usernames: impl IntoIterator<Item = String>) -> Self {
        Self {
            usernames: usernames
                .into_iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect(),
        }
    }

    /// Session-side privilege check, independent of API key tiers.
    pub fn is_quartermaster(&self, username: &str) -> bool {
        self.usernames.iter().any(|u| u == username)
    }

    /// Build the principal for `username`.
    pub fn principal(&self, username: &str) -> Principal {
        Principal::new(username, self.is_quartermaster(username))
    }
}
