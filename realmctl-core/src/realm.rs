//! Realm identifiers
//!
//! A realm is a tenant whose data lives in its own physical store. The id is
//! opaque to the handle cache; only equality, hashing and display are used.

use std::fmt;

use thiserror::Error;

/// Realm used when a request does not name one.
pub const DEFAULT_REALM: &str = "default";

/// Maximum length for realm ids (bytes)
const MAX_REALM_ID_LEN: usize = 128;

/// Reasons a realm id is rejected at construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RealmIdError {
    #[error("realm id cannot be empty")]
    Empty,

    #[error("realm id exceeds maximum length of {max} bytes")]
    TooLong { max: usize },

    #[error("realm id cannot contain control characters")]
    ControlCharacter,
}

/// Validated realm identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RealmId(String);

impl RealmId {
    /// Create a realm id, failing fast on unusable input.
    ///
    /// # Example
    /// ```
    /// use realmctl_core::RealmId;
    ///
    /// assert!(RealmId::new("acme").is_ok());
    /// assert!(RealmId::new("").is_err());
    /// ```
    pub fn new(id: impl Into<String>) -> Result<Self, RealmIdError> {
        let id = id.into();

        if id.is_empty() {
            return Err(RealmIdError::Empty);
        }

        if id.len() > MAX_REALM_ID_LEN {
            return Err(RealmIdError::TooLong {
                max: MAX_REALM_ID_LEN,
            });
        }

        if id.chars().any(char::is_control) {
            return Err(RealmIdError::ControlCharacter);
        }

        Ok(Self(id))
    }

    /// The fallback realm
    pub fn default_realm() -> Self {
        Self(DEFAULT_REALM.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for RealmId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RealmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for RealmId {
    type Error = RealmIdError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<String> for RealmId {
    type Error = RealmIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}
