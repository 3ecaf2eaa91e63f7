//! Repository implementations

pub mod cars;

pub use cars::CarRepo;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("already exists: {resource} '{id}'")]
    AlreadyExists { resource: &'static str, id: String },
}
