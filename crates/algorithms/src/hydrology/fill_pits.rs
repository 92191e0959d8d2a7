//! Single-cell pit filling
//!
//! A pit is an interior cell strictly lower than all eight neighbours. Pits
//! are raised to their lowest neighbour so that depression filling starts
//! from a surface free of one-cell artefacts.

use tracing::debug;
use upbasin_core::raster::{Neighborhood, NeighborhoodIterator, Raster};
use upbasin_core::{Algorithm, Error, Result};

use super::ensure_has_data;

/// Pit filling algorithm
#[derive(Debug, Clone, Default)]
pub struct FillPits;

impl Algorithm for FillPits {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Fill Pits"
    }

    fn description(&self) -> &'static str {
        "Raise single-cell pits to their lowest neighbour"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        fill_pits(&input)
    }
}

/// Fill single-cell pits in a DEM.
///
/// A cell is a pit when it is not on the raster edge, all eight neighbours
/// hold data, and every neighbour is strictly higher. Each pass raises all
/// pits found on the previous surface; passes repeat until nothing changes.
/// No-data cells are copied through untouched.
///
/// # Errors
/// `EmptyRaster` if the DEM holds no valid cell.
pub fn fill_pits(dem: &Raster<f64>) -> Result<Raster<f64>> {
    ensure_has_data(dem)?;

    let (rows, cols) = dem.shape();
    let mut current = dem.clone();
    let mut passes = 0usize;
    let mut total_filled = 0usize;

    loop {
        let mut raised = Vec::new();

        for row in 1..rows.saturating_sub(1) {
            for col in 1..cols.saturating_sub(1) {
                let z = unsafe { current.get_unchecked(row, col) };
                if current.is_nodata(z) {
                    continue;
                }
                if let Some(lowest) = pit_floor(&current, row, col, z) {
                    raised.push((row, col, lowest));
                }
            }
        }

        if raised.is_empty() {
            break;
        }

        passes += 1;
        total_filled += raised.len();
        let data = current.data_mut();
        for (row, col, lowest) in raised {
            data[(row, col)] = lowest;
        }
    }

    debug!(filled = total_filled, passes, "pit filling finished");
    Ok(current)
}

/// Lowest neighbour elevation if (row, col) is a pit
fn pit_floor(dem: &Raster<f64>, row: usize, col: usize, z: f64) -> Option<f64> {
    let mut lowest = f64::INFINITY;

    for neighbor in NeighborhoodIterator::new(dem, row, col, Neighborhood::Queen3x3) {
        let (_, _, nz) = neighbor?;
        if dem.is_nodata(nz) || nz <= z {
            return None;
        }
        lowest = lowest.min(nz);
    }

    Some(lowest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use upbasin_core::GeoTransform;

    fn dem_from(values: &[f64], rows: usize, cols: usize) -> Raster<f64> {
        let mut dem = Raster::from_vec(values.to_vec(), rows, cols).unwrap();
        dem.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        dem
    }

    #[test]
    fn test_fill_pits_raises_single_pit() {
        let dem = dem_from(
            &[
                5.0, 5.0, 5.0,
                5.0, 1.0, 4.0,
                5.0, 6.0, 5.0,
            ],
            3,
            3,
        );
        let filled = fill_pits(&dem).unwrap();
        assert_eq!(filled.get(1, 1).unwrap(), 4.0);
        assert_eq!(filled.get(0, 0).unwrap(), 5.0);
    }

    #[test]
    fn test_fill_pits_ignores_two_cell_depression() {
        // Two adjacent low cells: neither is strictly lower than all neighbours
        let dem = dem_from(
            &[
                5.0, 5.0, 5.0, 5.0,
                5.0, 1.0, 1.0, 5.0,
                5.0, 5.0, 5.0, 5.0,
            ],
            3,
            4,
        );
        let filled = fill_pits(&dem).unwrap();
        assert_eq!(filled.data(), dem.data());
    }

    #[test]
    fn test_fill_pits_skips_cells_next_to_nodata() {
        let mut dem = dem_from(
            &[
                6.0, 5.0, 5.0,
                5.0, 1.0, 5.0,
                5.0, 5.0, -9999.0,
            ],
            3,
            3,
        );
        dem.set_nodata(Some(-9999.0));
        let filled = fill_pits(&dem).unwrap();

        // The centre can drain into the no-data hole, so it is not a pit
        assert_eq!(filled.get(1, 1).unwrap(), 1.0);
        assert_eq!(filled.get(2, 2).unwrap(), -9999.0);
    }

    #[test]
    fn test_fill_pits_empty_raster() {
        let mut dem = Raster::filled(3, 3, -9999.0);
        dem.set_nodata(Some(-9999.0));
        assert!(matches!(fill_pits(&dem), Err(Error::EmptyRaster)));
    }
}
