//! Flat resolution
//!
//! After depression filling a DEM contains flats: connected areas of equal
//! elevation where D8 finds no downslope neighbour. This module imposes a
//! drainage gradient on every flat that touches lower terrain, combining a
//! gradient away from higher terrain with a (dominant) gradient towards the
//! flat's outlets.
//!
//! The gradient is applied to the DEM itself by raising each flat cell a
//! whole number of small steps scaled to the flat's elevation. The surface
//! moves by a tiny fraction of its elevation while every drainable flat cell gains a
//! strictly lower neighbour, including flats at or below sea level.
//!
//! Reference:
//! Barnes, R., Lehman, C., & Mulla, D. (2014). An efficient assignment of
//! drainage direction over flat surfaces in raster digital elevation models.
//! *Computers & Geosciences*, 62, 128–135.

use ndarray::Array2;
use tracing::{debug, warn};
use upbasin_core::raster::{d8, Raster};
use upbasin_core::{Algorithm, Error, Result};

use super::flow_direction::flow_direction;

/// Output of [`resolve_flats_detailed`]
#[derive(Debug, Clone)]
pub struct FlatResolution {
    /// DEM with drainable flats inflated
    pub dem: Raster<f64>,
    /// Number of flats that received a gradient
    pub flats: usize,
    /// Cells without a downslope neighbour that no flat outlet can reach.
    /// These stay sinks in any flow direction computed from `dem`.
    pub undrainable: Vec<(usize, usize)>,
}

/// Flat resolution algorithm
#[derive(Debug, Clone, Default)]
pub struct ResolveFlats;

impl Algorithm for ResolveFlats {
    type Input = Raster<f64>;
    type Output = FlatResolution;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Resolve Flats"
    }

    fn description(&self) -> &'static str {
        "Impose a drainage gradient on flat areas (Barnes 2014)"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        resolve_flats_detailed(&input)
    }
}

/// Resolve flats in a depression-filled DEM.
///
/// See [`resolve_flats_detailed`]; this variant only returns the surface.
pub fn resolve_flats(dem: &Raster<f64>) -> Result<Raster<f64>> {
    resolve_flats_detailed(dem).map(|resolution| resolution.dem)
}

/// Resolve flats and report the cells that could not be drained.
///
/// # Algorithm
/// 1. Compute D8 directions; valid cells without one are flat cells
/// 2. Low edges: cells with a direction next to a flat cell of the same
///    elevation. High edges: flat cells next to higher terrain
/// 3. Label each flat by flood-filling equal elevations from its low edges;
///    high edges of unlabelled flats are dropped
/// 4. Breadth-first distance from the high edges (away from higher)
/// 5. Breadth-first distance from the low edges (towards lower), combined
///    as `2 * towards + (flat_height - away)`
/// 6. Raise each cell by its combined value times [`flat_increment`] of
///    the flat's elevation
///
/// Flats without a low edge are undrainable: left unchanged, logged and
/// listed in [`FlatResolution::undrainable`].
///
/// # Errors
/// `EmptyRaster` if the DEM holds no valid cell.
pub fn resolve_flats_detailed(dem: &Raster<f64>) -> Result<FlatResolution> {
    let fdir = flow_direction(dem)?;
    let (rows, cols) = dem.shape();

    let is_flat = |row: usize, col: usize| {
        let dir = unsafe { fdir.get_unchecked(row, col) };
        dir == d8::NO_FLOW
    };

    // Step 2: Find flat edges
    let mut low_edges = Vec::new();
    let mut high_edges = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            let dir = unsafe { fdir.get_unchecked(row, col) };
            if dir == d8::NODATA {
                continue;
            }
            let z = unsafe { dem.get_unchecked(row, col) };

            for (nr, nc) in valid_neighbors(dem, row, col) {
                let nz = unsafe { dem.get_unchecked(nr, nc) };
                if dir != d8::NO_FLOW && is_flat(nr, nc) && nz == z {
                    low_edges.push((row, col));
                    break;
                }
                if dir == d8::NO_FLOW && nz > z {
                    high_edges.push((row, col));
                    break;
                }
            }
        }
    }

    // Step 3: Label flats from their low edges
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut next_label = 1u32;
    for &(row, col) in &low_edges {
        if labels[(row, col)] == 0 {
            label_flat(dem, &mut labels, row, col, next_label);
            next_label += 1;
        }
    }
    let flats = (next_label - 1) as usize;

    let mut undrainable = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            if is_flat(row, col) && labels[(row, col)] == 0 {
                undrainable.push((row, col));
            }
        }
    }
    high_edges.retain(|&(row, col)| labels[(row, col)] != 0);

    if !undrainable.is_empty() {
        warn!(cells = undrainable.len(), "flats without an outlet left unresolved");
    }

    // Step 4: Gradient away from higher terrain
    let mut flat_height = vec![0u64; next_label as usize];
    let mut away = Array2::<u64>::zeros((rows, cols));
    let mut frontier = high_edges;
    let mut loops = 1u64;

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for (row, col) in frontier {
            if away[(row, col)] > 0 {
                continue;
            }
            away[(row, col)] = loops;
            let label = labels[(row, col)];
            flat_height[label as usize] = loops;

            for (nr, nc) in valid_neighbors(dem, row, col) {
                if labels[(nr, nc)] == label && is_flat(nr, nc) && away[(nr, nc)] == 0 {
                    next.push((nr, nc));
                }
            }
        }
        frontier = next;
        loops += 1;
    }

    // Step 5: Gradient towards lower terrain, combined with step 4
    let mut mask = Array2::<u64>::zeros((rows, cols));
    let mut frontier = low_edges;
    let mut loops = 1u64;

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for (row, col) in frontier {
            if mask[(row, col)] > 0 {
                continue;
            }
            let label = labels[(row, col)];
            let a = away[(row, col)];
            mask[(row, col)] = if a > 0 {
                flat_height[label as usize] - a + 2 * loops
            } else {
                2 * loops
            };

            for (nr, nc) in valid_neighbors(dem, row, col) {
                if labels[(nr, nc)] == label && is_flat(nr, nc) && mask[(nr, nc)] == 0 {
                    next.push((nr, nc));
                }
            }
        }
        frontier = next;
        loops += 1;
    }

    // Step 6: Inflate
    let mut output = dem.data().clone();
    let mut raised = 0usize;
    for ((row, col), &steps) in mask.indexed_iter() {
        if steps > 0 {
            let z = output[(row, col)];
            output[(row, col)] = z + steps as f64 * flat_increment(z);
            raised += 1;
        }
    }

    debug!(flats, raised, undrainable = undrainable.len(), "flats resolved");

    Ok(FlatResolution {
        dem: dem.with_data(output, dem.nodata())?,
        flats,
        undrainable,
    })
}

fn valid_neighbors(
    dem: &Raster<f64>,
    row: usize,
    col: usize,
) -> impl Iterator<Item = (usize, usize)> + '_ {
    d8::OFFSETS[1..].iter().filter_map(move |&(dr, dc)| {
        let nr = row as isize + dr;
        let nc = col as isize + dc;
        if !dem.contains(nr, nc) {
            return None;
        }
        let (nr, nc) = (nr as usize, nc as usize);
        dem.is_valid_at(nr, nc).then_some((nr, nc))
    })
}

/// Flood-fill `label` over the equal-elevation region containing (row, col)
fn label_flat(dem: &Raster<f64>, labels: &mut Array2<u32>, row: usize, col: usize, label: u32) {
    let z = unsafe { dem.get_unchecked(row, col) };
    let mut stack = vec![(row, col)];
    labels[(row, col)] = label;

    while let Some((r, c)) = stack.pop() {
        for (nr, nc) in valid_neighbors(dem, r, c) {
            if labels[(nr, nc)] == 0 && unsafe { dem.get_unchecked(nr, nc) } == z {
                labels[(nr, nc)] = label;
                stack.push((nr, nc));
            }
        }
    }
}

/// Elevation added per unit of the combined gradient on a flat at `z`.
///
/// Four ULPs of `max(|z|, 1)`: large enough that neighbouring steps stay
/// distinct after rounding and their slope over any cell distance stays a
/// normal float, so flats near sea level drain as well as high ones.
fn flat_increment(z: f64) -> f64 {
    4.0 * z.abs().max(1.0) * f64::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use upbasin_core::GeoTransform;

    /// West, north and south walls of 20, an east column of 5, and a 3x3
    /// plateau at 10 in between.
    fn plateau_dem() -> Raster<f64> {
        plateau_dem_at(10.0, 1.0)
    }

    /// The same shape with the plateau at `z` and square cells of `cell`
    fn plateau_dem_at(z: f64, cell: f64) -> Raster<f64> {
        let mut dem = Raster::filled(5, 5, z);
        dem.set_transform(GeoTransform::new(0.0, 5.0 * cell, cell, -cell));
        for i in 0..5 {
            dem.set(0, i, z + 10.0).unwrap();
            dem.set(4, i, z + 10.0).unwrap();
            dem.set(i, 0, z + 10.0).unwrap();
        }
        for i in 0..5 {
            dem.set(i, 4, z - 5.0).unwrap();
        }
        dem
    }

    fn follow_to_exit(fdir: &Raster<u8>, mut row: usize, mut col: usize) -> (isize, isize) {
        for _ in 0..fdir.len() {
            let dir = fdir.get(row, col).unwrap();
            assert!(d8::is_direction(dir), "sink at ({}, {})", row, col);
            let (nr, nc) = d8::target(row, col, dir).unwrap();
            if !fdir.contains(nr, nc) || fdir.get(nr as usize, nc as usize).unwrap() == d8::NODATA {
                return (nr, nc);
            }
            if nc == 4 {
                return (nr, nc);
            }
            row = nr as usize;
            col = nc as usize;
        }
        panic!("flow path from ({}, {}) does not terminate", row, col);
    }

    #[test]
    fn test_flat_increment_survives_slope_division() {
        for z in [0.0, -0.0, 1e-9, -3.0, 10.0, 4_500.0, -420.0] {
            let step = flat_increment(z);
            let lower = z + 3.0 * step;
            let upper = z + 4.0 * step;
            assert!(upper > lower, "z={}", z);
            let slope = (upper - lower) / (1_000.0_f64).hypot(1_000.0);
            assert!(slope.is_normal(), "z={} slope={:e}", z, slope);
        }
    }

    #[test]
    fn test_plateau_drains_towards_lower_side() {
        let dem = plateau_dem();
        let resolved = resolve_flats_detailed(&dem).unwrap();
        assert_eq!(resolved.flats, 1);
        assert!(resolved.undrainable.is_empty());

        let fdir = flow_direction(&resolved.dem).unwrap();
        for row in 1..4 {
            for col in 1..4 {
                let (_, exit_col) = follow_to_exit(&fdir, row, col);
                assert_eq!(exit_col, 4, "plateau cell ({}, {}) must reach the east side", row, col);
            }
        }
    }

    #[test]
    fn test_sea_level_plateau_drains() {
        for z in [0.0, -2.0, 1e-6] {
            let dem = plateau_dem_at(z, 30.0);
            let resolved = resolve_flats_detailed(&dem).unwrap();
            assert!(resolved.undrainable.is_empty());

            let fdir = flow_direction(&resolved.dem).unwrap();
            for row in 1..4 {
                for col in 1..4 {
                    let (_, exit_col) = follow_to_exit(&fdir, row, col);
                    assert_eq!(exit_col, 4, "z={} cell ({}, {})", z, row, col);
                }
            }
        }
    }

    #[test]
    fn test_changes_are_tiny_and_upward() {
        let dem = plateau_dem();
        let resolved = resolve_flats(&dem).unwrap();

        for (orig, new) in dem.data().iter().zip(resolved.data().iter()) {
            assert!(new >= orig);
            assert!((new - orig).abs() < 1e-12);
        }
        // Walls and the low column are not part of the flat
        assert_eq!(resolved.get(0, 0).unwrap(), 20.0);
        assert_eq!(resolved.get(2, 4).unwrap(), 5.0);
        // Cells further from the outlet end up higher
        assert!(resolved.get(2, 1).unwrap() > resolved.get(2, 2).unwrap());
        assert!(resolved.get(2, 2).unwrap() > resolved.get(2, 3).unwrap());
    }

    #[test]
    fn test_undrainable_flat_reported() {
        // A 2-cell flat enclosed by higher terrain: no low edge anywhere
        let mut dem = Raster::filled(4, 5, 10.0);
        dem.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        dem.set(1, 1, 3.0).unwrap();
        dem.set(1, 2, 3.0).unwrap();

        let resolved = resolve_flats_detailed(&dem).unwrap();
        let mut cells = resolved.undrainable.clone();
        cells.sort();
        assert!(cells.contains(&(1, 1)));
        assert!(cells.contains(&(1, 2)));
        assert_eq!(resolved.dem.get(1, 1).unwrap(), 3.0);
        assert_eq!(resolved.dem.get(1, 2).unwrap(), 3.0);
    }

    #[test]
    fn test_surface_without_flats_is_unchanged() {
        let data = (0..36).map(|i| ((i / 6) * 2 + (i % 6)) as f64).collect();
        let mut dem = Raster::from_vec(data, 6, 6).unwrap();
        dem.set_transform(GeoTransform::new(0.0, 6.0, 1.0, -1.0));

        let resolved = resolve_flats_detailed(&dem).unwrap();
        assert_eq!(resolved.flats, 0);
        assert_eq!(resolved.dem.data(), dem.data());
    }

    #[test]
    fn test_fully_flat_dem_drains_to_edges() {
        let mut dem = Raster::filled(6, 6, 1.0);
        dem.set_transform(GeoTransform::new(0.0, 6.0, 1.0, -1.0));

        let resolved = resolve_flats_detailed(&dem).unwrap();
        assert!(resolved.undrainable.is_empty());

        let fdir = flow_direction(&resolved.dem).unwrap();
        assert!(fdir.data().iter().all(|&d| d8::is_direction(d)));
    }
}
