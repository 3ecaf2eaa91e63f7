//! HTTP layer
//!
//! Axum server with:
//! - Realm resolution per request
//! - CORS (localhost only by default)
//! - Request tracing
//! - Graceful shutdown
//! - JSON error responses

pub mod error;
pub mod extractors;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use extractors::{RealmContext, RequestRealm};
pub use server::{build_router, run_server, run_server_until, shutdown_signal, ServerConfig, ServerError};
