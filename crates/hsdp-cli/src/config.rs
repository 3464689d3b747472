//! Configuration loading for the HSDP CLI

use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{ConfigBuilder, Environment, File};
use hsdp_solver::SolverOptions;
use serde::{Deserialize, Serialize};

/// Configuration for a solver run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub solver: SolverOptions,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where `solve` writes the value grid unless `--output` is given
    pub grid_file: PathBuf,
    pub log_level: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            grid_file: PathBuf::from("hsdp_grid.dat"),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        Self::load_from(Self::find_config_file())
    }

    /// Layer `path` (if any) under the `HSDP__` environment overrides
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = &config_path {
            tracing::debug!("Loading config from: {:?}", path);
            builder = builder.add_source(File::from(path.clone()).required(false));
        } else {
            tracing::debug!("No config file found, using defaults");
        }

        // HSDP__SOLVER__REDUCE_LP=false etc.
        builder = builder.add_source(
            Environment::with_prefix("HSDP")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Find the configuration file
    pub fn find_config_file() -> Option<PathBuf> {
        // Check in order: HSDP_CONFIG env, ./hsdp.toml, ~/.config/hsdp/hsdp.toml
        if let Ok(path) = std::env::var("HSDP_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("hsdp.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("hsdp").join("hsdp.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Defaults rendered as a config file
    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Config::default()).context("Failed to render default configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_from(None).unwrap();
        assert_eq!(config.output.grid_file, PathBuf::from("hsdp_grid.dat"));
        assert!(config.solver.reduce_lp);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hsdp.toml");
        std::fs::write(
            &path,
            "[solver]\nalways_flush = true\nflush_percent_minimum = 0.5\n\n[output]\ngrid_file = \"out.dat\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert!(config.solver.always_flush);
        assert_eq!(config.solver.flush_percent_minimum, 0.5);
        // untouched keys keep their defaults
        assert_eq!(config.solver.node_budget, 2_000_000);
        assert_eq!(config.output.grid_file, PathBuf::from("out.dat"));
        assert_eq!(config.output.log_level, "info");
    }

    #[test]
    fn test_default_toml_parses_back() {
        let rendered = Config::default_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
