//! Value grid export for 3-D plotting

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use hsdp_core::{HsdpError, Result};
use hsdp_xadd::{DiagramId, Forest};

use crate::context::Model;

/// Which variables span the grid and how finely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSpec {
    pub x_var: String,
    pub y_var: String,
    pub resolution: usize,
}

/// `values[i][j]` is the value at `x = xs[j]`, `y = ys[i]`
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub values: Vec<Vec<f64>>,
}

fn axis(model: &Model, var: &str, resolution: usize) -> Result<Vec<f64>> {
    let v = model
        .variable(var)
        .ok_or_else(|| HsdpError::UnknownVariable(format!("{var} (grid axis)")))?;
    let (Some(min), Some(max)) = (v.min, v.max) else {
        return Err(HsdpError::Usage(format!(
            "grid axis {var} needs both min and max bounds"
        )));
    };
    let step = (max - min) / (resolution - 1) as f64;
    Ok((0..resolution).map(|i| min + step * i as f64).collect())
}

/// Evaluate `value` on a grid; other continuous variables sit at their
/// minimum (or 0 if unbounded) and booleans are false
pub fn evaluate_grid(forest: &Forest, model: &Model, value: DiagramId, spec: &GridSpec) -> Result<Grid> {
    if spec.resolution < 2 {
        return Err(HsdpError::Usage(format!(
            "grid resolution must be at least 2, got {}",
            spec.resolution
        )));
    }
    let xs = axis(model, &spec.x_var, spec.resolution)?;
    let ys = axis(model, &spec.y_var, spec.resolution)?;

    let bools: HashMap<String, bool> = model.boolean.iter().map(|b| (b.clone(), false)).collect();
    let mut conts: HashMap<String, f64> = model
        .continuous
        .iter()
        .map(|v| (v.name.clone(), v.min.unwrap_or(0.0)))
        .collect();

    let mut values = Vec::with_capacity(ys.len());
    for &y in &ys {
        let mut row = Vec::with_capacity(xs.len());
        for &x in &xs {
            conts.insert(spec.x_var.clone(), x);
            conts.insert(spec.y_var.clone(), y);
            row.push(forest.evaluate(value, &bools, &conts)?);
        }
        values.push(row);
    }
    Ok(Grid { xs, ys, values })
}

impl Grid {
    /// Rows of `X[i] Y[i] v[i][0] .. v[i][n-1]`
    pub fn write_to(&self, out: &mut impl Write) -> Result<()> {
        for (i, row) in self.values.iter().enumerate() {
            write!(out, "{} {}", self.xs[i], self.ys[i])?;
            for v in row {
                write!(out, " {v}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write_to(&mut out)?;
        out.flush()?;
        info!("Wrote {}x{} value grid to {}", self.xs.len(), self.ys.len(), path.display());
        Ok(())
    }
}
