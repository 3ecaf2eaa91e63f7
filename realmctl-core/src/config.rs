//! realmctl configuration
//!
//! Sources, later ones winning:
//! - built-in defaults
//! - `~/.realmctl/config.toml`, or the file given with `--config`
//! - environment variables:
//!   - `REALMCTL_BIND`: listen address (default: 127.0.0.1:8080)
//!   - `REALMCTL_STORAGE_ROOT`: directory holding `<realm>.db` files
//!   - `REALMCTL_MAX_CONNECTIONS`: pool size per realm store
//!   - `REALMCTL_IDLE_TIMEOUT_SECS`: idle time before a store is closed
//!   - `REALMCTL_SWEEP_INTERVAL_SECS`: idle sweep period
//!   - `REALMCTL_REALM_HEADER`: request header naming the realm
//!   - `REALMCTL_DEFAULT_REALM`: realm used when the header is absent
//!
//! CLI flags are applied on top by the binary.

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, MAX_SWEEP_INTERVAL};
use crate::error::ConfigError;
use crate::realm::{RealmId, DEFAULT_REALM};

/// Header carrying the realm id
pub const DEFAULT_REALM_HEADER: &str = "Realm-Id";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RealmctlConfig {
    pub server: ServerSection,
    pub storage: StorageConfig,
    pub cache: CacheSection,
    pub tenancy: TenancyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: SocketAddr,
    /// Allow any CORS origin instead of localhost only
    pub cors_permissive: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            cors_permissive: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one `<realm>.db` file per realm
    pub root: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("realms"),
            max_connections: 5,
            busy_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub idle_timeout_secs: u64,
    /// Defaults to the idle timeout when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_interval_secs: Option<u64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 600,
            sweep_interval_secs: None,
        }
    }
}

impl CacheSection {
    pub fn cache_config(&self) -> CacheConfig {
        let idle_timeout = Duration::from_secs(self.idle_timeout_secs);
        CacheConfig {
            idle_timeout,
            sweep_interval: self
                .sweep_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(idle_timeout),
        }
    }
}

/// How requests are mapped to realms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenancyConfig {
    pub realm_header: String,
    pub default_realm: String,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            realm_header: DEFAULT_REALM_HEADER.to_string(),
            default_realm: DEFAULT_REALM.to_string(),
        }
    }
}

impl TenancyConfig {
    pub fn default_realm(&self) -> Result<RealmId, ConfigError> {
        RealmId::new(self.default_realm.as_str())
            .map_err(|e| ConfigError::invalid("tenancy.default_realm", e.to_string()))
    }
}

impl RealmctlConfig {
    /// Default config file path: ~/.realmctl/config.toml
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".realmctl")
            .join("config.toml")
    }

    /// Load from `path` (which must exist) or from the default path (which
    /// may not), then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_file(path)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::load_file(&default_path)?
                } else {
                    tracing::debug!(path = %default_path.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without env overrides
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `REALMCTL_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("REALMCTL_BIND") {
            self.server.bind = parse_var("REALMCTL_BIND", &bind)?;
        }
        if let Some(root) = lookup("REALMCTL_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(root);
        }
        if let Some(max) = lookup("REALMCTL_MAX_CONNECTIONS") {
            self.storage.max_connections = parse_var("REALMCTL_MAX_CONNECTIONS", &max)?;
        }
        if let Some(idle) = lookup("REALMCTL_IDLE_TIMEOUT_SECS") {
            self.cache.idle_timeout_secs = parse_var("REALMCTL_IDLE_TIMEOUT_SECS", &idle)?;
        }
        if let Some(sweep) = lookup("REALMCTL_SWEEP_INTERVAL_SECS") {
            self.cache.sweep_interval_secs =
                Some(parse_var("REALMCTL_SWEEP_INTERVAL_SECS", &sweep)?);
        }
        if let Some(header) = lookup("REALMCTL_REALM_HEADER") {
            self.tenancy.realm_header = header;
        }
        if let Some(realm) = lookup("REALMCTL_DEFAULT_REALM") {
            self.tenancy.default_realm = realm;
        }
        Ok(())
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.idle_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "cache.idle_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.cache.sweep_interval_secs == Some(0) {
            return Err(ConfigError::invalid(
                "cache.sweep_interval_secs",
                "must be greater than zero",
            ));
        }
        let max_secs = MAX_SWEEP_INTERVAL.as_secs();
        if self.cache.idle_timeout_secs > max_secs {
            return Err(ConfigError::invalid(
                "cache.idle_timeout_secs",
                format!("must be at most {max_secs} seconds"),
            ));
        }
        if self.cache.sweep_interval_secs.is_some_and(|secs| secs > max_secs) {
            return Err(ConfigError::invalid(
                "cache.sweep_interval_secs",
                format!("must be at most {max_secs} seconds"),
            ));
        }
        if self.storage.max_connections == 0 {
            return Err(ConfigError::invalid(
                "storage.max_connections",
                "must be greater than zero",
            ));
        }
        if header_name_invalid(&self.tenancy.realm_header) {
            return Err(ConfigError::invalid(
                "tenancy.realm_header",
                "must be a non-empty token (letters, digits, '-' or '_')",
            ));
        }
        self.tenancy.default_realm()?;
        Ok(())
    }

    /// Serialize back to TOML (for `realmctl config show`)
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn parse_var<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, format!("'{}': {}", value, e)))
}

fn header_name_invalid(name: &str) -> bool {
    name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_service_defaults() {
        let config = RealmctlConfig::default();
        assert_eq!(config.server.bind.port(), 8080);
        assert!(!config.server.cors_permissive);
        assert_eq!(config.tenancy.realm_header, "Realm-Id");
        assert_eq!(config.tenancy.default_realm, "default");

        let cache = config.cache.cache_config();
        assert_eq!(cache.idle_timeout, Duration::from_secs(600));
        assert_eq!(cache.sweep_interval, Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: RealmctlConfig = toml::from_str(
            r#"
            [storage]
            root = "/var/lib/realmctl"

            [cache]
            idle_timeout_secs = 30
            sweep_interval_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.root, PathBuf::from("/var/lib/realmctl"));
        assert_eq!(config.storage.max_connections, 5);
        assert_eq!(config.server.bind.port(), 8080);

        let cache = config.cache.cache_config();
        assert_eq!(cache.idle_timeout, Duration::from_secs(30));
        assert_eq!(cache.sweep_interval, Duration::from_secs(5));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = RealmctlConfig::default();
        config
            .apply_env(lookup_from(&[
                ("REALMCTL_BIND", "0.0.0.0:9000"),
                ("REALMCTL_IDLE_TIMEOUT_SECS", "120"),
                ("REALMCTL_DEFAULT_REALM", "public"),
            ]))
            .unwrap();

        assert_eq!(config.server.bind.port(), 9000);
        assert_eq!(config.cache.idle_timeout_secs, 120);
        assert_eq!(config.tenancy.default_realm, "public");
    }

    #[test]
    fn bad_env_value_names_variable() {
        let mut config = RealmctlConfig::default();
        let err = config
            .apply_env(lookup_from(&[("REALMCTL_IDLE_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("REALMCTL_IDLE_TIMEOUT_SECS"));
    }

    #[test]
    fn rejects_zero_idle_timeout() {
        let mut config = RealmctlConfig::default();
        config.cache.idle_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "cache.idle_timeout_secs",
                ..
            })
        ));
    }

    #[test]
    fn rejects_huge_cache_durations() {
        let max = u64::MAX.to_string();

        let mut config = RealmctlConfig::default();
        config
            .apply_env(lookup_from(&[("REALMCTL_SWEEP_INTERVAL_SECS", max.as_str())]))
            .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "cache.sweep_interval_secs",
                ..
            })
        ));

        let mut config = RealmctlConfig::default();
        config
            .apply_env(lookup_from(&[("REALMCTL_IDLE_TIMEOUT_SECS", max.as_str())]))
            .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "cache.idle_timeout_secs",
                ..
            })
        ));
    }

    #[test]
    fn accepts_cache_durations_up_to_a_year() {
        let mut config = RealmctlConfig::default();
        config.cache.idle_timeout_secs = MAX_SWEEP_INTERVAL.as_secs();
        config.cache.sweep_interval_secs = Some(MAX_SWEEP_INTERVAL.as_secs());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_default_realm() {
        let mut config = RealmctlConfig::default();
        config.tenancy.default_realm = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_header_name() {
        let mut config = RealmctlConfig::default();
        config.tenancy.realm_header = "Realm Id".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = RealmctlConfig::load_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn toml_round_trip_preserves_values() {
        let mut config = RealmctlConfig::default();
        config.cache.sweep_interval_secs = Some(15);
        let text = config.to_toml().unwrap();
        let parsed: RealmctlConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
