//! Structured error types for realmctl-core.
//!
//! Library consumers get `thiserror` enums; the CLI wraps them in `anyhow`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::realm::RealmId;

/// Failure to open, initialize or close a realm's physical store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database engine error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Realm id cannot be turned into a store location
    #[error("realm '{realm}' cannot be mapped to a store: {reason}")]
    UnsafeRealmName { realm: String, reason: &'static str },

    /// Store was written by a newer schema than this build understands
    #[error("store schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i64, supported: i64 },
}

/// Errors surfaced by the handle cache to its callers
#[derive(Error, Debug)]
pub enum HandleError {
    /// The connection factory could not open the realm's store.
    /// Never cached: the next call retries.
    #[error("failed to open store for realm '{realm}': {source}")]
    Open {
        realm: RealmId,
        #[source]
        source: StoreError,
    },

    /// The cache has been shut down and hands out no more handles
    #[error("realm handle cache is shut down")]
    ShutDown,
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}
