//! Symbolic value iteration over a problem file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args};

use hsdp_core::HsdpError;
use hsdp_solver::{GridSpec, SolverContext, ValueIteration};

use crate::config::Config;

#[derive(Debug, Args)]
pub struct SolveArgs {
    /// Problem file
    pub file: PathBuf,

    /// Horizons to compute; negative uses the file's `iterations`
    #[arg(allow_negative_numbers = true)]
    pub max_iterations: i64,

    /// Write a value grid for 3-D plotting after the run (true|false)
    #[arg(action = ArgAction::Set)]
    pub emit_3d_grid: Option<bool>,

    /// Continuous variable along the grid's X axis
    pub x_var: Option<String>,

    /// Continuous variable along the grid's Y axis
    pub y_var: Option<String>,

    /// Points per grid axis
    pub grid_resolution: Option<usize>,

    /// Grid file, overriding `output.grid_file`
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the run report as JSON instead of the summary table
    #[arg(long)]
    pub json: bool,
}

impl SolveArgs {
    pub fn iterations(&self) -> Option<usize> {
        usize::try_from(self.max_iterations).ok()
    }

    pub fn grid_spec(&self) -> std::result::Result<Option<GridSpec>, HsdpError> {
        if self.emit_3d_grid != Some(true) {
            return Ok(None);
        }
        match (&self.x_var, &self.y_var, self.grid_resolution) {
            (Some(x), Some(y), Some(resolution)) => Ok(Some(GridSpec {
                x_var: x.clone(),
                y_var: y.clone(),
                resolution,
            })),
            _ => Err(HsdpError::Usage(
                "emit-3d-grid=true requires <x-var> <y-var> <grid-resolution>".to_string(),
            )),
        }
    }
}

pub fn run(args: &SolveArgs, config: &Config) -> Result<()> {
    let grid_spec = args.grid_spec()?;

    let spec = hsdp_core::parse_file(&args.file)
        .with_context(|| format!("Failed to load problem file {}", args.file.display()))?;
    print!("{spec}");

    let ctx = SolverContext::from_spec(&spec).context("Invalid problem")?;
    let mut vi = ValueIteration::new(ctx, config.solver.clone());

    // Reject bad axes before spending time on the run
    if let Some(grid_spec) = &grid_spec {
        vi.grid(grid_spec)?;
    }

    let report = vi.solve(args.iterations())?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("\n{}", report.summary());
    }

    if let Some(grid_spec) = &grid_spec {
        let path = args
            .output
            .clone()
            .unwrap_or_else(|| config.output.grid_file.clone());
        vi.grid(grid_spec)?
            .write_file(&path)
            .with_context(|| format!("Failed to write grid file {}", path.display()))?;
    }

    Ok(())
}
