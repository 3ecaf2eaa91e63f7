//! SQLite connection factory
//!
//! One database file per realm under a storage root: `<root>/<realm>.db`.
//! Each handle is a small `SqlitePool` over that file. First-time setup is
//! detected with `PRAGMA user_version`: 0 means the file was just created.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use walkdir::WalkDir;

use crate::config::StorageConfig;
use crate::error::StoreError;
use crate::factory::ConnectionFactory;
use crate::realm::RealmId;

/// Extension of realm store files
const STORE_EXTENSION: &str = "db";

/// Default maximum connections per realm pool
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default time a connection waits on a locked database
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Realm ids usable as file stems: no separators, no leading dot
static STORE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,127}$").expect("invalid store name regex")
});

/// Versioned schema script applied to fresh or outdated stores.
///
/// The script must be idempotent (`IF NOT EXISTS`) since two processes may
/// race to initialize the same file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub version: i64,
    pub sql: &'static str,
}

impl Schema {
    /// No tables; stores are only created
    pub const EMPTY: Schema = Schema {
        version: 0,
        sql: "",
    };
}

/// What `open` found on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaState {
    Initialized { from: i64 },
    Current,
}

/// Realm store found on disk
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub realm: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Opens one SQLite database per realm
#[derive(Debug, Clone)]
pub struct SqliteFactory {
    root: PathBuf,
    max_connections: u32,
    busy_timeout: Duration,
    schema: Schema,
}

impl SqliteFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            schema: Schema::EMPTY,
        }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(&storage.root)
            .with_max_connections(storage.max_connections)
            .with_busy_timeout(Duration::from_secs(storage.busy_timeout_secs))
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// File backing `realm`'s store.
    ///
    /// Realm ids are caller supplied, so anything that is not a plain slug
    /// is refused rather than joined onto the root.
    pub fn store_path(&self, realm: &RealmId) -> Result<PathBuf, StoreError> {
        if !STORE_NAME_RE.is_match(realm.as_str()) {
            return Err(StoreError::UnsafeRealmName {
                realm: realm.to_string(),
                reason: "must be alphanumeric with hyphens/underscores, starting with alphanumeric",
            });
        }

        Ok(self
            .root
            .join(format!("{}.{}", realm.as_str(), STORE_EXTENSION)))
    }

    /// Realm stores present under the root, sorted by realm.
    ///
    /// A missing root yields an empty list.
    pub fn list_stores(&self) -> Result<Vec<StoreInfo>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut stores = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                StoreError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "walk error")
                }))
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(STORE_EXTENSION) {
                continue;
            }

            let Some(realm) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !STORE_NAME_RE.is_match(realm) {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| {
                StoreError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "metadata error")
                }))
            })?;

            stores.push(StoreInfo {
                realm: realm.to_owned(),
                path: path.to_path_buf(),
                size_bytes: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        stores.sort_by(|a, b| a.realm.cmp(&b.realm));
        Ok(stores)
    }

    /// Bring a freshly opened pool up to the configured schema version
    async fn migrate(&self, pool: &SqlitePool) -> Result<SchemaState, StoreError> {
        let found: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(pool)
            .await?;

        if found > self.schema.version {
            return Err(StoreError::SchemaTooNew {
                found,
                supported: self.schema.version,
            });
        }

        if found == self.schema.version {
            return Ok(SchemaState::Current);
        }

        sqlx::raw_sql(self.schema.sql).execute(pool).await?;

        // PRAGMA takes no bind parameters; the version is an integer we own
        let set_version = format!("PRAGMA user_version = {}", self.schema.version);
        sqlx::query(&set_version).execute(pool).await?;

        Ok(SchemaState::Initialized { from: found })
    }
}

#[async_trait]
impl ConnectionFactory for SqliteFactory {
    type Handle = SqlitePool;

    async fn open(&self, realm: &RealmId) -> Result<SqlitePool, StoreError> {
        let path = self.store_path(realm)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(self.busy_timeout)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await?;

        match self.migrate(&pool).await {
            Ok(SchemaState::Initialized { from }) => {
                tracing::info!(
                    realm = %realm,
                    path = %path.display(),
                    from,
                    to = self.schema.version,
                    "initialized realm schema"
                );
            }
            Ok(SchemaState::Current) => {
                tracing::debug!(realm = %realm, path = %path.display(), "reusing realm store");
            }
            Err(e) => {
                pool.close().await;
                return Err(e);
            }
        }

        Ok(pool)
    }

    async fn close(&self, realm: &RealmId, pool: &SqlitePool) -> Result<(), StoreError> {
        // Fold the WAL back into the main file before letting go
        let checkpoint = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(pool)
            .await;

        pool.close().await;
        tracing::debug!(realm = %realm, "realm pool closed");

        checkpoint?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NOTES_SCHEMA: Schema = Schema {
        version: 1,
        sql: "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL);",
    };

    fn realm(id: &str) -> RealmId {
        RealmId::new(id).unwrap()
    }

    async fn user_version(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn open_creates_store_and_schema() {
        let dir = TempDir::new().unwrap();
        let factory = SqliteFactory::new(dir.path().join("realms")).with_schema(NOTES_SCHEMA);

        let pool = factory.open(&realm("acme")).await.unwrap();

        assert!(dir.path().join("realms/acme.db").exists());
        assert_eq!(user_version(&pool).await, 1);

        sqlx::query("INSERT INTO notes (body) VALUES (?)")
            .bind("hello")
            .execute(&pool)
            .await
            .unwrap();

        factory.close(&realm("acme"), &pool).await.unwrap();
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn reopen_keeps_existing_data() {
        let dir = TempDir::new().unwrap();
        let factory = SqliteFactory::new(dir.path()).with_schema(NOTES_SCHEMA);

        let pool = factory.open(&realm("acme")).await.unwrap();
        sqlx::query("INSERT INTO notes (body) VALUES ('kept')")
            .execute(&pool)
            .await
            .unwrap();
        factory.close(&realm("acme"), &pool).await.unwrap();

        let pool = factory.open(&realm("acme")).await.unwrap();
        let body: String = sqlx::query_scalar("SELECT body FROM notes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(body, "kept");
        assert_eq!(user_version(&pool).await, 1);
        factory.close(&realm("acme"), &pool).await.unwrap();
    }

    #[tokio::test]
    async fn realms_get_separate_files() {
        let dir = TempDir::new().unwrap();
        let factory = SqliteFactory::new(dir.path()).with_schema(NOTES_SCHEMA);

        let a = factory.open(&realm("a")).await.unwrap();
        let b = factory.open(&realm("b")).await.unwrap();

        sqlx::query("INSERT INTO notes (body) VALUES ('only in a')")
            .execute(&a)
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
            .fetch_one(&b)
            .await
            .unwrap();
        assert_eq!(count, 0);

        factory.close(&realm("a"), &a).await.unwrap();
        factory.close(&realm("b"), &b).await.unwrap();
    }

    #[tokio::test]
    async fn newer_schema_is_refused() {
        let dir = TempDir::new().unwrap();
        let newer = SqliteFactory::new(dir.path()).with_schema(Schema {
            version: 2,
            sql: "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY);",
        });
        let pool = newer.open(&realm("acme")).await.unwrap();
        newer.close(&realm("acme"), &pool).await.unwrap();

        let older = SqliteFactory::new(dir.path()).with_schema(NOTES_SCHEMA);
        let err = older.open(&realm("acme")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::SchemaTooNew {
                found: 2,
                supported: 1
            }
        ));
    }

    #[test]
    fn unsafe_realm_names_are_rejected() {
        let factory = SqliteFactory::new("/srv/realms");

        for id in ["../etc/passwd", "a/b", ".hidden", "acme corp", "-dash"] {
            let err = factory.store_path(&realm(id)).unwrap_err();
            assert!(
                matches!(err, StoreError::UnsafeRealmName { .. }),
                "{id} should be rejected"
            );
        }

        assert_eq!(
            factory.store_path(&realm("Acme_01")).unwrap(),
            PathBuf::from("/srv/realms/Acme_01.db")
        );
    }

    #[tokio::test]
    async fn open_with_unsafe_name_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("realms");
        let factory = SqliteFactory::new(&root);

        let err = factory.open(&realm("../escape")).await.unwrap_err();
        assert!(matches!(err, StoreError::UnsafeRealmName { .. }));
        assert!(!root.exists());
        assert!(!dir.path().join("escape.db").exists());
    }

    #[test]
    fn list_stores_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("beta.db"), b"x").unwrap();
        std::fs::write(dir.path().join("alpha.db"), b"xyz").unwrap();
        std::fs::write(dir.path().join("alpha.db-wal"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested.db")).unwrap();

        let stores = SqliteFactory::new(dir.path()).list_stores().unwrap();
        let names: Vec<_> = stores.iter().map(|s| s.realm.as_str()).collect();

        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(stores[0].size_bytes, 3);
    }

    #[test]
    fn list_stores_on_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let factory = SqliteFactory::new(dir.path().join("nope"));
        assert!(factory.list_stores().unwrap().is_empty());
    }
}
