//! realmctl-server: HTTP service over per-realm stores
//!
//! Every request names a realm in a header. The realm's SQLite store is
//! taken from the shared [`HandleCache`](realmctl_core::HandleCache) and the
//! car endpoints read and write only that store.

pub mod db;
pub mod http;
pub mod models;
pub mod state;

pub use http::{build_router, run_server, ApiError, ServerConfig, ServerError};
pub use state::{AppState, RealmCache, Tenancy, CARS_SCHEMA};
