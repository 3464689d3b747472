//! HSDP CLI - solve hybrid symbolic dynamic programming problem files
//!
//! `hsdp solve` runs fixed-horizon symbolic value iteration and optionally
//! exports a value grid; `hsdp inspect` checks a problem file without solving.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{config as config_cmd, inspect, solve};

#[derive(Debug, Parser)]
#[command(name = "hsdp")]
#[command(author, version, about = "HSDP - hybrid symbolic dynamic programming solver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Solve a problem file by symbolic value iteration
    Solve(solve::SolveArgs),

    /// Print the parsed problem definition
    Inspect {
        /// Problem file
        file: PathBuf,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(config_cmd::ConfigCommands),
}

/// Crates whose events are shown without `RUST_LOG`
const LOG_TARGETS: [&str; 4] = ["hsdp", "hsdp_solver", "hsdp_xadd", "hsdp_core"];

fn default_filter(log_level: &str) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={log_level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    // Initialize logging based on verbosity
    let log_level = if cli.verbose {
        "debug"
    } else {
        config.output.log_level.as_str()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Solve(args) => solve::run(&args, &config),
        Commands::Inspect { file } => inspect::run(&file),
        Commands::Config(cmd) => config_cmd::run(cmd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_positional_arguments() {
        let cli = Cli::try_parse_from([
            "hsdp", "solve", "rover.hsdp", "3", "true", "pos", "energy", "20",
        ])
        .unwrap();
        let Commands::Solve(args) = cli.command else {
            panic!("expected solve");
        };
        assert_eq!(args.max_iterations, 3);
        assert_eq!(args.emit_3d_grid, Some(true));
        assert_eq!(args.x_var.as_deref(), Some("pos"));
        assert_eq!(args.y_var.as_deref(), Some("energy"));
        assert_eq!(args.grid_resolution, Some(20));
    }

    #[test]
    fn test_negative_iterations_parse() {
        let cli = Cli::try_parse_from(["hsdp", "solve", "keep_bit.hsdp", "-1", "--json"]).unwrap();
        let Commands::Solve(args) = cli.command else {
            panic!("expected solve");
        };
        assert_eq!(args.max_iterations, -1);
        assert!(args.json);
        assert_eq!(args.emit_3d_grid, None);
    }

    #[test]
    fn test_default_filter_covers_every_crate() {
        let filter = default_filter("debug");
        for target in ["hsdp=debug", "hsdp_solver=debug", "hsdp_xadd=debug", "hsdp_core=debug"] {
            assert!(filter.split(',').any(|d| d == target), "{filter}");
        }
        assert!(tracing_subscriber::EnvFilter::try_new(&filter).is_ok());
    }

    #[test]
    fn test_grid_flag_must_be_boolean() {
        assert!(Cli::try_parse_from(["hsdp", "solve", "p.hsdp", "2", "yes"]).is_err());
    }

    #[test]
    fn test_global_verbose_and_config_init() {
        let cli = Cli::try_parse_from(["hsdp", "config", "init", "--force", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Config(config_cmd::ConfigCommands::Init { force: true, .. })
        ));
    }
}
