//! HTTP server command
//!
//! Composition root: builds the realm cache from configuration, runs the
//! server, then stops the sweeper and closes every open realm store.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use realmctl_core::RealmctlConfig;
use realmctl_server::{run_server, AppState, ServerConfig};

/// Arguments for the serve command
#[derive(Parser, Debug, Default)]
pub struct ServeArgs {
    /// Address to bind to (default: 127.0.0.1:8080)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Directory holding one <realm>.db file per realm
    #[arg(long)]
    pub storage_root: Option<PathBuf>,

    /// Seconds a realm store may sit unused before it is closed
    #[arg(long, value_name = "SECS")]
    pub idle_timeout: Option<u64>,

    /// Seconds between idle sweeps (default: the idle timeout)
    #[arg(long, value_name = "SECS")]
    pub sweep_interval: Option<u64>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,
}

impl ServeArgs {
    /// Flags win over file and environment values
    fn apply(&self, config: &mut RealmctlConfig) {
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        if let Some(root) = &self.storage_root {
            config.storage.root = root.clone();
        }
        if let Some(idle) = self.idle_timeout {
            config.cache.idle_timeout_secs = idle;
        }
        if let Some(sweep) = self.sweep_interval {
            config.cache.sweep_interval_secs = Some(sweep);
        }
        if self.cors_permissive {
            config.server.cors_permissive = true;
        }
    }
}

/// Run the HTTP server until Ctrl+C or SIGTERM
pub async fn run_serve(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = RealmctlConfig::load(config_path).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let state = Arc::new(AppState::from_config(&config).context("Invalid tenancy settings")?);
    let cache = state.realms.config();

    tracing::info!(
        bind = %config.server.bind,
        storage_root = %config.storage.root.display(),
        idle_timeout_secs = cache.idle_timeout.as_secs(),
        sweep_interval_secs = cache.sweep_interval.as_secs(),
        "starting realmctl server"
    );

    let sweeper = state.realms.spawn_sweeper();
    let served = run_server(Arc::clone(&state), ServerConfig::from_section(&config.server)).await;

    sweeper.stop().await;
    let closed = state.realms.shutdown().await;
    tracing::info!(closed, "realm stores closed");

    served.context("Server error")
}
