//! realmctl CLI - per-realm store service
//!
//! Entry point and composition root:
//! - `serve`: run the HTTP service over the realm handle cache
//! - `realms`: inspect realm stores on disk
//! - `config`: show the effective configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "realmctl",
    author,
    version,
    about = "Serve per-realm SQLite stores behind one HTTP API",
    long_about = "Each realm (tenant) keeps its data in its own SQLite file. realmctl opens \
                  a realm's store on first use, shares it between requests and closes it \
                  again once the realm has been idle."
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.realmctl/config.toml)
    #[arg(long, global = true, env = "REALMCTL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve(commands::serve::ServeArgs),
    /// Inspect realm stores on disk
    Realms(commands::realms::RealmsArgs),
    /// Show configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // A .env next to the working directory may carry REALMCTL_* settings
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    tracing_setup::init(&TracingConfig { debug: cli.debug }).ok();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve(args) => commands::run_serve(args, config_path).await?,
        Commands::Realms(args) => commands::run_realms(args, config_path)?,
        Commands::Config(args) => commands::run_config(args, config_path)?,
    }
    Ok(())
}
