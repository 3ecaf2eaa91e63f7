//! Database layer - repositories over a realm's store
//!
//! - Repositories borrow the realm's `SqlitePool` for one request
//! - Rely on DB constraints and handle conflicts, no check-then-insert

pub mod repos;

pub use repos::{CarRepo, DbError};
