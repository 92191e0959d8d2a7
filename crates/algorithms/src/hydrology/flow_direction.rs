//! D8 flow direction algorithm
//!
//! Calculates the direction of flow from each cell to its steepest
//! downslope neighbor using the D8 (deterministic eight-node) method.
//!
//! Flow direction encoding:
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! 0 = interior sink (no outflow), 1-8 = direction to steepest neighbor,
//! 255 = no-data.

use ndarray::Array2;
use tracing::debug;
use crate::maybe_rayon::*;
use upbasin_core::raster::{d8, Raster};
use upbasin_core::{Algorithm, Error, Result};

use super::ensure_has_data;

/// Flow direction algorithm (D8)
#[derive(Debug, Clone, Default)]
pub struct FlowDirection;

impl Algorithm for FlowDirection {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Direction (D8)"
    }

    fn description(&self) -> &'static str {
        "Calculate D8 flow direction from a conditioned DEM"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        flow_direction(&input)
    }
}

/// Calculate D8 flow direction from a DEM.
///
/// The input DEM should be hydrologically conditioned (pits and
/// depressions filled, flats resolved) for a sink-free result.
///
/// # Rules
/// - Steepest positive drop (elevation difference / distance) wins.
///   Diagonal distance uses both cell dimensions.
/// - Equal drops resolve to the lower direction code (E, NE, N, ..., SE).
/// - A cell with no downslope neighbour on the raster edge or next to
///   no-data points at its first off-grid or no-data neighbour in the same
///   order; following that direction leaves the DEM, so the cell is an
///   outlet.
/// - Any other cell without a downslope neighbour is a sink: `d8::NO_FLOW`.
/// - No-data cells get `d8::NODATA`, which is also the output's no-data value.
///
/// # Errors
/// `EmptyRaster` if the DEM holds no valid cell.
pub fn flow_direction(dem: &Raster<f64>) -> Result<Raster<u8>> {
    ensure_has_data(dem)?;

    let (rows, cols) = dem.shape();
    let gt = dem.transform();
    let dx = gt.pixel_width.abs();
    let dy = gt.pixel_height.abs();
    let diagonal = dx.hypot(dy);

    // Distance to each neighbour indexed by direction code
    let mut distances = [0.0_f64; 9];
    for dir in d8::CODES {
        let (dr, dc) = d8::OFFSETS[dir as usize];
        distances[dir as usize] = match (dr, dc) {
            (0, _) => dx,
            (_, 0) => dy,
            _ => diagonal,
        };
    }

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![d8::NODATA; cols];
            for (col, cell) in row_data.iter_mut().enumerate() {
                *cell = cell_direction(dem, row, col, &distances);
            }
            row_data
        })
        .collect();

    let sinks = output_data.iter().filter(|&&d| d == d8::NO_FLOW).count();
    debug!(rows, cols, sinks, "flow direction computed");

    let data = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    dem.with_data(data, Some(d8::NODATA))
}

fn cell_direction(dem: &Raster<f64>, row: usize, col: usize, distances: &[f64; 9]) -> u8 {
    let center = unsafe { dem.get_unchecked(row, col) };
    if dem.is_nodata(center) {
        return d8::NODATA;
    }

    let mut max_drop = 0.0_f64;
    let mut best_dir = d8::NO_FLOW;
    let mut first_exit = None;

    for dir in d8::CODES {
        let (dr, dc) = d8::OFFSETS[dir as usize];
        let nr = row as isize + dr;
        let nc = col as isize + dc;

        if !dem.contains(nr, nc) {
            first_exit.get_or_insert(dir);
            continue;
        }

        let neighbor = unsafe { dem.get_unchecked(nr as usize, nc as usize) };
        if dem.is_nodata(neighbor) {
            first_exit.get_or_insert(dir);
            continue;
        }

        let drop = (center - neighbor) / distances[dir as usize];
        if drop > max_drop {
            max_drop = drop;
            best_dir = dir;
        }
    }

    if best_dir != d8::NO_FLOW {
        best_dir
    } else {
        first_exit.unwrap_or(d8::NO_FLOW)
    }
}
