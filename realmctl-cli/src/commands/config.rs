//! Configuration inspection

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use realmctl_core::RealmctlConfig;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration (file + environment) as TOML
    Show,
    /// Show config file path
    Path,
}

pub fn run_config(args: ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    match args.command {
        ConfigCommands::Show => run_show(config_path),
        ConfigCommands::Path => run_path(config_path),
    }
}

fn run_show(config_path: Option<&Path>) -> Result<()> {
    let config = RealmctlConfig::load(config_path).context("Failed to load configuration")?;
    let text = config.to_toml().context("Failed to serialize configuration")?;
    print!("{}", text);
    Ok(())
}

fn run_path(config_path: Option<&Path>) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(RealmctlConfig::config_path);

    println!("{}", path.display());
    if !path.exists() {
        eprintln!("(file does not exist, defaults apply)");
    }
    Ok(())
}
