//! Custom Axum extractors

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use realmctl_core::{RealmHandle, RealmId};
use sqlx::SqlitePool;

use super::error::ApiError;
use crate::state::{AppState, Tenancy};

/// The request's realm, resolved from headers only.
///
/// Does not open the store, so handlers can reject a bad body before a new
/// realm gets a database file.
pub struct RequestRealm(pub RealmId);

impl FromRequestParts<Arc<AppState>> for RequestRealm {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let realm = resolve_realm(&parts.headers, &state.tenancy)?;
        tracing::debug!(realm = %realm, "resolved request realm");
        Ok(Self(realm))
    }
}

/// The request's realm and its open store.
///
/// Holding this pins the realm's cache entry, so the store stays open for
/// the rest of the request.
pub struct RealmContext {
    pub realm: RealmId,
    pub store: RealmHandle<SqlitePool>,
}

impl RealmContext {
    /// Store for an already resolved realm, opening it on first use
    pub async fn open(state: &AppState, realm: RealmId) -> Result<Self, ApiError> {
        let store = state.realms.get_or_create(&realm).await?;
        Ok(Self { realm, store })
    }
}

impl FromRequestParts<Arc<AppState>> for RealmContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let RequestRealm(realm) = RequestRealm::from_request_parts(parts, state).await?;
        Self::open(state, realm).await
    }
}

/// Realm named by the tenancy header. Absent or blank falls back to the
/// default realm.
pub fn resolve_realm(headers: &HeaderMap, tenancy: &Tenancy) -> Result<RealmId, ApiError> {
    let Some(value) = headers.get(&tenancy.header) else {
        return Ok(tenancy.default_realm.clone());
    };

    let value = value.to_str().map_err(|_| ApiError::InvalidRealm {
        reason: format!("{} header must be visible ASCII", tenancy.header),
    })?;

    let value = value.trim();
    if value.is_empty() {
        return Ok(tenancy.default_realm.clone());
    }

    Ok(RealmId::new(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use realmctl_core::TenancyConfig;

    fn tenancy() -> Tenancy {
        Tenancy::from_config(&TenancyConfig::default()).unwrap()
    }

    #[test]
    fn header_names_realm() {
        let mut headers = HeaderMap::new();
        headers.insert("Realm-Id", HeaderValue::from_static("acme"));
        assert_eq!(resolve_realm(&headers, &tenancy()).unwrap().as_str(), "acme");
    }

    #[test]
    fn missing_or_blank_header_uses_default() {
        let headers = HeaderMap::new();
        assert_eq!(
            resolve_realm(&headers, &tenancy()).unwrap().as_str(),
            "default"
        );

        let mut headers = HeaderMap::new();
        headers.insert("realm-id", HeaderValue::from_static("  "));
        assert_eq!(
            resolve_realm(&headers, &tenancy()).unwrap().as_str(),
            "default"
        );
    }

    #[test]
    fn non_ascii_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("realm-id", HeaderValue::from_bytes(b"caf\xe9").unwrap());
        assert!(matches!(
            resolve_realm(&headers, &tenancy()),
            Err(ApiError::InvalidRealm { .. })
        ));
    }

    #[test]
    fn oversized_realm_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "realm-id",
            HeaderValue::from_str(&"r".repeat(129)).unwrap(),
        );
        assert!(matches!(
            resolve_realm(&headers, &tenancy()),
            Err(ApiError::InvalidRealm { .. })
        ));
    }

    #[test]
    fn custom_header_name() {
        let tenancy = Tenancy::from_config(&TenancyConfig {
            realm_header: "X-Tenant".into(),
            default_realm: "public".into(),
        })
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("realm-id", HeaderValue::from_static("ignored"));
        assert_eq!(resolve_realm(&headers, &tenancy).unwrap().as_str(), "public");

        headers.insert("x-tenant", HeaderValue::from_static("acme"));
        assert_eq!(resolve_realm(&headers, &tenancy).unwrap().as_str(), "acme");
    }
}
