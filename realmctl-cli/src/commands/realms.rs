//! Realm store inspection

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use realmctl_core::{RealmctlConfig, SqliteFactory};

#[derive(Parser, Debug)]
pub struct RealmsArgs {
    #[command(subcommand)]
    pub command: RealmsCommands,
}

#[derive(Subcommand, Debug)]
pub enum RealmsCommands {
    /// List realm stores under the storage root
    List(ListArgs),
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Storage root to scan (overrides config)
    #[arg(long)]
    pub storage_root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run_realms(args: RealmsArgs, config_path: Option<&Path>) -> Result<()> {
    match args.command {
        RealmsCommands::List(args) => run_list(args, config_path),
    }
}

fn run_list(args: ListArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = RealmctlConfig::load(config_path).context("Failed to load configuration")?;
    if let Some(root) = args.storage_root {
        config.storage.root = root;
    }

    let factory = SqliteFactory::from_config(&config.storage);
    let stores = factory
        .list_stores()
        .with_context(|| format!("Failed to scan {}", factory.root().display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stores)?);
        return Ok(());
    }

    if stores.is_empty() {
        println!("No realm stores in {}", factory.root().display());
        return Ok(());
    }

    println!("{:<32} {:>12}  {}", "REALM", "SIZE", "MODIFIED");
    for store in &stores {
        let modified = store
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<32} {:>12}  {}", store.realm, store.size_bytes, modified);
    }
    println!("\n{} realm(s)", stores.len());

    Ok(())
}
