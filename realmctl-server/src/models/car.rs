//! Car records
//!
//! A car belongs to exactly one realm: it lives in that realm's store and
//! ids only need to be unique within it.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;

/// Maximum length for car ids
const MAX_CAR_ID_LEN: usize = 128;

/// Maximum length for car names
const MAX_CAR_NAME_LEN: usize = 256;

static CONTROL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{Cc}").expect("invalid control character regex"));

/// Stored car
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Car {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Validated car id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CarId(String);

impl CarId {
    /// # Rules
    /// - 1 to 128 characters
    /// - No control characters
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "car id" });
        }

        if s.chars().count() > MAX_CAR_ID_LEN {
            return Err(ValidationError::TooLong {
                field: "car id",
                max: MAX_CAR_ID_LEN,
            });
        }

        if CONTROL_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "car id",
                reason: "must not contain control characters",
            });
        }

        Ok(Self(s.to_owned()))
    }

    /// Fresh random id (UUID v4)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CarId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validated car name (may be empty)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CarName(String);

impl CarName {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.chars().count() > MAX_CAR_NAME_LEN {
            return Err(ValidationError::TooLong {
                field: "car name",
                max: MAX_CAR_NAME_LEN,
            });
        }

        if CONTROL_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "car name",
                reason: "must not contain control characters",
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Create car request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCarRequest {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Car ready to insert
#[derive(Debug, Clone)]
pub struct NewCar {
    pub id: CarId,
    pub name: CarName,
}

impl NewCar {
    /// Validate a request body. A missing id is generated.
    pub fn from_request(req: CreateCarRequest) -> Result<Self, ValidationError> {
        let id = match req.id.as_deref() {
            Some(id) => CarId::new(id)?,
            None => CarId::generate(),
        };
        let name = match req.name.as_deref() {
            Some(name) => CarName::new(name)?,
            None => CarName::default(),
        };

        Ok(Self { id, name })
    }
}
