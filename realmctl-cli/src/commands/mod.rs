//! Command implementations for the realmctl CLI

pub mod config;
pub mod realms;
pub mod serve;

pub use config::run_config;
pub use realms::run_realms;
pub use serve::run_serve;
