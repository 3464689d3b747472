//! Configuration management commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::Config;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a configuration file with the default values
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
        /// Destination file
        #[arg(long, default_value = "hsdp.toml")]
        path: PathBuf,
    },
}

pub fn run(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(),
        ConfigCommands::Init { force, path } => init(&path, force).map(|_| ()),
    }
}

fn show() -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    match Config::find_config_file() {
        Some(path) => println!("Config file: {}\n", path.display()),
        None => println!("No configuration file found. Using defaults.\n"),
    }

    let config = Config::load()?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{rendered}");

    Ok(())
}

/// Returns whether the file was written
fn init(config_path: &Path, force: bool) -> Result<bool> {
    if config_path.exists() && !force {
        println!("Configuration file already exists: {}", config_path.display());
        println!("Use --force to overwrite");
        return Ok(false);
    }

    std::fs::write(config_path, Config::default_toml()?)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    println!("Configuration file created: {}", config_path.display());

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hsdp.toml");

        assert!(init(&path, false).unwrap());
        let written: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, Config::default());

        std::fs::write(&path, "# edited\n").unwrap();
        assert!(!init(&path, false).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited\n");

        assert!(init(&path, true).unwrap());
        assert_ne!(std::fs::read_to_string(&path).unwrap(), "# edited\n");
    }
}
