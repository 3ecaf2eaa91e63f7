//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use realmctl_core::{HandleError, RealmId, RealmIdError, StoreError};
use serde_json::json;

use crate::db::DbError;
use crate::models::ValidationError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Realm header cannot name a realm (400)
    InvalidRealm { reason: String },

    /// Create would overwrite (400)
    AlreadyExists { resource: &'static str, id: String },

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Realm cache is shut down (503)
    Unavailable,

    /// Realm store could not be opened (500, logged)
    RealmStore { realm: RealmId, source: StoreError },

    /// Database error (500, logged)
    Database(DbError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(e) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "validation_error",
                    "message": e.to_string()
                }),
            ),
            Self::InvalidRealm { reason } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "invalid_realm",
                    "message": reason
                }),
            ),
            Self::AlreadyExists { resource, id } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "already_exists",
                    "message": format!("{} '{}' already exists", resource, id)
                }),
            ),
            Self::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "not_found",
                    "message": format!("{} '{}' not found", resource, id)
                }),
            ),
            Self::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error": "unavailable",
                    "message": "server is shutting down"
                }),
            ),
            Self::RealmStore { realm, source } => {
                tracing::error!(realm = %realm, error = %source, "realm store unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<RealmIdError> for ApiError {
    fn from(e: RealmIdError) -> Self {
        Self::InvalidRealm {
            reason: e.to_string(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => Self::NotFound { resource, id },
            DbError::AlreadyExists { resource, id } => Self::AlreadyExists { resource, id },
            _ => Self::Database(e),
        }
    }
}

impl From<HandleError> for ApiError {
    fn from(e: HandleError) -> Self {
        match e {
            HandleError::ShutDown => Self::Unavailable,
            // Caller picked a realm name that can never be a store
            HandleError::Open {
                source: source @ StoreError::UnsafeRealmName { .. },
                ..
            } => Self::InvalidRealm {
                reason: source.to_string(),
            },
            HandleError::Open { realm, source } => Self::RealmStore { realm, source },
        }
    }
}
