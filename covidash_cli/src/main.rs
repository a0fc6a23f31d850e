mod cli;
mod display;
mod error;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, RunCommand};
use covidash::config::Config;
use log::debug;

const DEFAULT_LOGGING_LEVEL: &str = "warn";

#[tokio::main]
async fn main() -> Result<()> {
    // Set RUST_LOG to `DEFAULT_LOGGING_LEVEL` if not set
    let _ =
        std::env::var("RUST_LOG").map_err(|_| std::env::set_var("RUST_LOG", DEFAULT_LOGGING_LEVEL));
    pretty_env_logger::init_timed();
    let args = Cli::parse();
    debug!("args: {args:?}");
    let config: Config = read_config_from_toml(args.config.as_deref())?;
    debug!("config: {config:?}");

    if let Some(command) = args.command {
        command.run(config).await?;
    }
    Ok(())
}

/// Read the configuration from `path`, or from the platform config directory when no path is
/// given. A missing default file means the default configuration.
fn read_config_from_toml(path: Option<&str>) -> Result<Config> {
    if let Some(path) = path {
        return Config::from_path(path).with_context(|| format!("Error reading config file {path}"));
    }
    // macOS: ~/Library/Application Support/covidash/config.toml
    let file_path = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("covidash")
        .join("config.toml");
    match std::fs::read_to_string(&file_path) {
        Ok(contents) => Config::from_toml_str(&contents).context("Invalid TOML in config file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(e).with_context(|| format!("Error reading config file {}", file_path.display())),
    }
}
