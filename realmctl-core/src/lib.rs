//! realmctl-core: per-realm store handles
//!
//! Every realm (tenant) keeps its data in its own physical database. This
//! crate owns the lifecycle of those databases inside one process:
//!
//! - [`RealmId`]: validated realm identifier
//! - [`ConnectionFactory`]: opens and closes one realm's store
//! - [`SqliteFactory`]: one SQLite file per realm, schema set up on first open
//! - [`HandleCache`]: at most one live handle per realm, idle eviction,
//!   explicit shutdown

pub mod cache;
pub mod config;
pub mod error;
pub mod factory;
pub mod realm;
pub mod sqlite;

pub use cache::{
    CacheConfig, HandleCache, RealmHandle, RemovalCause, Sweeper, DEFAULT_IDLE_TIMEOUT,
    MAX_SWEEP_INTERVAL,
};
pub use config::{
    CacheSection, RealmctlConfig, ServerSection, StorageConfig, TenancyConfig, DEFAULT_REALM_HEADER,
};
pub use error::{ConfigError, HandleError, StoreError};
pub use factory::ConnectionFactory;
pub use realm::{RealmId, RealmIdError, DEFAULT_REALM};
pub use sqlite::{Schema, SqliteFactory, StoreInfo};
