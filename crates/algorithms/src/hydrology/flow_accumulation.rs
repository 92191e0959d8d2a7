//! Flow accumulation algorithm
//!
//! Counts, for every cell, how many cells drain through it based on D8
//! flow direction. The count includes the cell itself, so a headwater cell
//! holds 1 and the value never decreases downstream.

use ndarray::Array2;
use tracing::debug;
use upbasin_core::raster::{d8, Raster};
use upbasin_core::{Algorithm, Error, Result};

/// Flow accumulation algorithm
#[derive(Debug, Clone, Default)]
pub struct FlowAccumulation;

impl Algorithm for FlowAccumulation {
    type Input = Raster<u8>;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Accumulation"
    }

    fn description(&self) -> &'static str {
        "Calculate upstream contributing area from D8 flow direction"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        flow_accumulation(&input)
    }
}

/// Calculate flow accumulation from a D8 flow direction raster.
///
/// Each valid cell receives 1 for itself plus the count of every cell
/// upstream of it. No-data cells hold `0.0`, which is also the output's
/// no-data value.
///
/// # Algorithm
/// 1. Count incoming flows for each cell (in-degree)
/// 2. Start from cells with in-degree 0 (headwaters)
/// 3. Propagate downstream, releasing a cell once all its donors are done
///
/// # Errors
/// `CycleDetected` if some cells are never released because the
/// directions form a loop; `InvalidParameter` for a code outside 0-8 and
/// 255.
pub fn flow_accumulation(flow_dir: &Raster<u8>) -> Result<Raster<f64>> {
    accumulate(flow_dir, |_, _| 1.0)
}

/// Weighted flow accumulation: sum of `weights` over the cell and
/// everything upstream of it. No-data weights count as zero.
///
/// # Errors
/// `SizeMismatch` if `weights` is not co-registered with `flow_dir`, plus
/// the errors of [`flow_accumulation`].
pub fn flow_accumulation_weighted(flow_dir: &Raster<u8>, weights: &Raster<f64>) -> Result<Raster<f64>> {
    flow_dir.ensure_coregistered(weights)?;
    accumulate(flow_dir, |row, col| {
        let w = unsafe { weights.get_unchecked(row, col) };
        if weights.is_nodata(w) { 0.0 } else { w }
    })
}

fn is_nodata_dir(flow_dir: &Raster<u8>, dir: u8) -> bool {
    dir == d8::NODATA || flow_dir.is_nodata(dir)
}

/// Downstream in-grid valid cell of (row, col), `None` for sinks and outlets
fn downstream(flow_dir: &Raster<u8>, row: usize, col: usize) -> Option<(usize, usize)> {
    let dir = unsafe { flow_dir.get_unchecked(row, col) };
    let (nr, nc) = d8::target(row, col, dir)?;
    if !flow_dir.contains(nr, nc) {
        return None;
    }
    let (nr, nc) = (nr as usize, nc as usize);
    let target = unsafe { flow_dir.get_unchecked(nr, nc) };
    (!is_nodata_dir(flow_dir, target)).then_some((nr, nc))
}

fn accumulate<W>(flow_dir: &Raster<u8>, weight: W) -> Result<Raster<f64>>
where
    W: Fn(usize, usize) -> f64,
{
    let (rows, cols) = flow_dir.shape();

    // Step 1: Build in-degree count and seed each valid cell with its weight
    let mut in_degree = Array2::<u32>::zeros((rows, cols));
    let mut accumulation = Array2::<f64>::zeros((rows, cols));
    let mut valid = 0usize;

    for row in 0..rows {
        for col in 0..cols {
            let dir = unsafe { flow_dir.get_unchecked(row, col) };
            if is_nodata_dir(flow_dir, dir) {
                continue;
            }
            if dir != d8::NO_FLOW && !d8::is_direction(dir) {
                return Err(Error::InvalidParameter {
                    name: "flow_dir",
                    value: dir.to_string(),
                    reason: format!("unknown D8 code at ({}, {})", row, col),
                });
            }

            valid += 1;
            accumulation[(row, col)] = weight(row, col);
            if let Some(target) = downstream(flow_dir, row, col) {
                in_degree[target] += 1;
            }
        }
    }

    // Step 2: Initialize stack with headwater cells (in-degree = 0)
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            let dir = unsafe { flow_dir.get_unchecked(row, col) };
            if !is_nodata_dir(flow_dir, dir) && in_degree[(row, col)] == 0 {
                stack.push((row, col));
            }
        }
    }

    // Step 3: Topological sweep; each cell hands its total downstream
    let mut processed = 0usize;
    while let Some((row, col)) = stack.pop() {
        processed += 1;

        let Some(target) = downstream(flow_dir, row, col) else {
            continue;
        };

        accumulation[target] += accumulation[(row, col)];
        in_degree[target] -= 1;
        if in_degree[target] == 0 {
            stack.push(target);
        }
    }

    if processed < valid {
        // Cells on or below a loop keep a positive in-degree
        let stuck = in_degree
            .indexed_iter()
            .find(|&(_, &d)| d > 0)
            .map(|(idx, _)| idx);
        if let Some((row, col)) = stuck {
            return Err(Error::CycleDetected { row, col });
        }
    }

    debug!(cells = valid, "flow accumulation computed");
    flow_dir.with_data(accumulation, Some(0.0))
}
