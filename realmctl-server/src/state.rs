//! Shared application state

use std::sync::Arc;

use axum::http::HeaderName;
use realmctl_core::{
    ConfigError, HandleCache, RealmId, RealmctlConfig, Schema, SqliteFactory, TenancyConfig,
};

/// Schema of every realm store
pub const CARS_SCHEMA: Schema = Schema {
    version: 1,
    sql: r#"
        CREATE TABLE IF NOT EXISTS cars (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_cars_created_at ON cars (created_at);
    "#,
};

/// Cache of open realm stores
pub type RealmCache = HandleCache<SqliteFactory>;

/// How a request is mapped to its realm
#[derive(Debug, Clone)]
pub struct Tenancy {
    pub header: HeaderName,
    pub default_realm: RealmId,
}

impl Tenancy {
    pub fn from_config(config: &TenancyConfig) -> Result<Self, ConfigError> {
        let header = HeaderName::from_bytes(config.realm_header.as_bytes())
            .map_err(|e| ConfigError::invalid("tenancy.realm_header", e.to_string()))?;

        Ok(Self {
            header,
            default_realm: config.default_realm()?,
        })
    }
}

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub realms: Arc<RealmCache>,
    pub tenancy: Tenancy,
}

impl AppState {
    pub fn new(realms: Arc<RealmCache>, tenancy: Tenancy) -> Self {
        Self { realms, tenancy }
    }

    /// Build the realm cache described by `config`. Nothing is opened yet.
    pub fn from_config(config: &RealmctlConfig) -> Result<Self, ConfigError> {
        let factory = SqliteFactory::from_config(&config.storage).with_schema(CARS_SCHEMA);
        let cache = HandleCache::new(factory, config.cache.cache_config());

        Ok(Self::new(
            Arc::new(cache),
            Tenancy::from_config(&config.tenancy)?,
        ))
    }
}
