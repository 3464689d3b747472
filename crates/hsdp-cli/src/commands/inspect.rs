//! Problem inspection

use std::path::Path;

use anyhow::{Context, Result};
use hsdp_solver::SolverContext;

pub fn run(file: &Path) -> Result<()> {
    let spec = hsdp_core::parse_file(file)
        .with_context(|| format!("Failed to load problem file {}", file.display()))?;
    print!("{spec}");

    // Building the context checks every action against the declared variables
    let ctx = SolverContext::from_spec(&spec).context("Invalid problem")?;
    println!("\nDiagrams:");
    for action in &ctx.model.actions {
        let mut nodes = ctx.forest.node_count(action.reward)?;
        for &dd in action.transitions.values().chain(action.observations.values()) {
            nodes += ctx.forest.node_count(dd)?;
        }
        println!(
            "  {}: {} transitions, {} observations, {} nodes",
            action.name,
            action.transitions.len(),
            action.observations.len(),
            nodes
        );
    }
    println!("  constraints: {}", ctx.model.constraints.len());
    println!("  forest size: {}", ctx.forest.len());

    Ok(())
}
