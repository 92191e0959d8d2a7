//! Priority-Flood depression filling
//!
//! O(n log n) algorithm for filling depressions in a DEM. Uses a priority
//! queue (min-heap) to process cells in elevation order, starting from the
//! drainage boundary: the raster edge and every cell next to no-data.
//!
//! Reference:
//! Barnes, R., Lehman, C., & Mulla, D. (2014). Priority-Flood: An optimal
//! depression-filling and watershed-labeling algorithm for digital elevation
//! models. *Computers & Geosciences*, 62, 117–127.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use ndarray::Array2;
use tracing::debug;
use upbasin_core::raster::{d8, Raster};
use upbasin_core::{Algorithm, Error, Result};

use super::{ensure_has_data, is_boundary};

/// A cell in the priority queue, ordered by elevation then insertion order.
#[derive(Debug, Clone)]
struct Cell {
    elevation: f64,
    order: u64,
    row: usize,
    col: usize,
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so BinaryHeap (max-heap) pops the lowest, oldest cell first
impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .elevation
            .total_cmp(&self.elevation)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Parameters for depression filling
#[derive(Debug, Clone)]
pub struct FillDepressionsParams {
    /// Minimum elevation increment enforced from a spill cell into the
    /// depression it drains. `0.0` (default) fills depressions flat and
    /// leaves the flats for `resolve_flats`.
    pub epsilon: f64,
}

impl Default for FillDepressionsParams {
    fn default() -> Self {
        Self { epsilon: 0.0 }
    }
}

/// Priority-Flood depression filling
#[derive(Debug, Clone, Default)]
pub struct FillDepressions;

impl Algorithm for FillDepressions {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = FillDepressionsParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Fill Depressions"
    }

    fn description(&self) -> &'static str {
        "Fill depressions using Priority-Flood (Barnes 2014)"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        fill_depressions(&input, params)
    }
}

/// Fill depressions in a DEM using Priority-Flood.
///
/// # Algorithm
/// 1. Seed a min-heap with every boundary cell (raster edge or next to
///    no-data) and mark it visited
/// 2. Pop the lowest cell
/// 3. For each unvisited valid neighbour:
///    `output = max(neighbour, popped + epsilon)`, mark visited, push
/// 4. Repeat until the heap is empty
///
/// Afterwards every valid cell has a non-increasing path to the boundary.
/// With `epsilon = 0` a depression-free surface comes back unchanged.
///
/// # Errors
/// `EmptyRaster` if the DEM holds no valid cell; `InvalidParameter` for a
/// negative or non-finite epsilon.
pub fn fill_depressions(dem: &Raster<f64>, params: FillDepressionsParams) -> Result<Raster<f64>> {
    ensure_has_data(dem)?;
    let epsilon = params.epsilon;
    if !(epsilon.is_finite() && epsilon >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "epsilon",
            value: epsilon.to_string(),
            reason: "must be finite and >= 0".into(),
        });
    }

    let (rows, cols) = dem.shape();
    let mut output = dem.data().clone();
    let mut visited = Array2::<bool>::from_elem((rows, cols), false);
    let mut heap = BinaryHeap::new();
    let mut order = 0u64;

    // Step 1: Seed the priority queue with boundary cells
    for row in 0..rows {
        for col in 0..cols {
            let val = unsafe { dem.get_unchecked(row, col) };

            if dem.is_nodata(val) {
                visited[(row, col)] = true;
                continue;
            }

            if is_boundary(dem, row, col) {
                heap.push(Cell { elevation: val, order, row, col });
                order += 1;
                visited[(row, col)] = true;
            }
        }
    }

    // Step 2: Process cells in order of increasing elevation
    let mut raised = 0usize;
    while let Some(cell) = heap.pop() {
        for &(dr, dc) in &d8::OFFSETS[1..] {
            let nr = cell.row as isize + dr;
            let nc = cell.col as isize + dc;

            if !dem.contains(nr, nc) {
                continue;
            }

            let (nr, nc) = (nr as usize, nc as usize);
            if visited[(nr, nc)] {
                continue;
            }
            visited[(nr, nc)] = true;

            let neighbor_elev = unsafe { dem.get_unchecked(nr, nc) };

            // Raise the neighbour if it sits below the spill level
            let filled_elev = if neighbor_elev < cell.elevation + epsilon {
                raised += 1;
                cell.elevation + epsilon
            } else {
                neighbor_elev
            };

            output[(nr, nc)] = filled_elev;
            heap.push(Cell {
                elevation: filled_elev,
                order,
                row: nr,
                col: nc,
            });
            order += 1;
        }
    }

    debug!(raised, epsilon, "depression filling finished");
    dem.with_data(output, dem.nodata())
}
