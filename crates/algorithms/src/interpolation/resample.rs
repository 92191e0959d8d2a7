//! Grid resampling by a uniform scale factor
//!
//! Output shape per axis is `round(n * scale_factor)` (ties to even), and
//! output cell `i` samples input position `i * (n_in - 1) / (n_out - 1)`,
//! so the first and last rows and columns of both grids coincide.

use ndarray::{Array2, Axis};
use tracing::debug;
use crate::maybe_rayon::*;
use upbasin_core::raster::Raster;
use upbasin_core::{Algorithm, Error, Result};

use super::spline::{poles, prefilter_line, taps, MAX_ORDER};

/// Parameters for resampling
#[derive(Debug, Clone)]
pub struct ResampleParams {
    /// Output cells per input cell along each axis
    pub scale_factor: f64,
    /// 0 nearest, 1 bilinear, 2-5 B-spline
    pub order: usize,
}

impl Default for ResampleParams {
    fn default() -> Self {
        Self {
            scale_factor: 0.5,
            order: 1,
        }
    }
}

/// Resampling algorithm
#[derive(Debug, Clone, Default)]
pub struct Resample;

impl Algorithm for Resample {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = ResampleParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Resample"
    }

    fn description(&self) -> &'static str {
        "Resample a grid by a scale factor with spline interpolation"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        resample(&input, params.scale_factor, params.order)
    }
}

/// Resample `dem` by `scale_factor` using interpolation of degree `order`.
///
/// The pixel size is divided by `scale_factor`; origin, CRS and no-data
/// value are kept. An output cell is no-data when any input cell it draws
/// on is. For spline orders the no-data cells are first replaced by the
/// mean of the valid cells so the prefilter stays finite.
///
/// # Errors
/// `InvalidInterpolationOrder` for `order > 5`, `InvalidParameter` for a
/// non-positive or non-finite scale factor or an empty output, `EmptyRaster`
/// when the input has no valid cell.
pub fn resample(dem: &Raster<f64>, scale_factor: f64, order: usize) -> Result<Raster<f64>> {
    if order > MAX_ORDER {
        return Err(Error::InvalidInterpolationOrder { order, max: MAX_ORDER });
    }
    if !(scale_factor.is_finite() && scale_factor > 0.0) {
        return Err(Error::InvalidParameter {
            name: "scale_factor",
            value: scale_factor.to_string(),
            reason: "must be finite and > 0".into(),
        });
    }

    let (rows, cols) = dem.shape();
    let out_rows = output_len(rows, scale_factor);
    let out_cols = output_len(cols, scale_factor);
    if out_rows == 0 || out_cols == 0 {
        return Err(Error::InvalidParameter {
            name: "scale_factor",
            value: scale_factor.to_string(),
            reason: format!("{}x{} grid would shrink to nothing", rows, cols),
        });
    }

    let valid = dem.data().mapv(|v| !dem.is_nodata(v));
    let valid_count = valid.iter().filter(|&&v| v).count();
    if valid_count == 0 {
        return Err(Error::EmptyRaster);
    }

    let source = if order >= 2 {
        spline_coefficients(dem, &valid, valid_count, order)
    } else {
        dem.data().clone()
    };

    let row_taps: Vec<Vec<(usize, f64)>> = (0..out_rows)
        .map(|i| taps(sample_position(i, rows, out_rows), rows, order))
        .collect();
    let col_taps: Vec<Vec<(usize, f64)>> = (0..out_cols)
        .map(|j| taps(sample_position(j, cols, out_cols), cols, order))
        .collect();

    let fill = dem.nodata().unwrap_or(f64::NAN);

    let output_data: Vec<f64> = (0..out_rows)
        .into_par_iter()
        .flat_map(|i| {
            let mut row_data = vec![fill; out_cols];
            let rt = &row_taps[i];

            for (j, cell) in row_data.iter_mut().enumerate() {
                let ct = &col_taps[j];
                let touches_nodata = rt
                    .iter()
                    .any(|&(r, _)| ct.iter().any(|&(c, _)| !valid[(r, c)]));
                if touches_nodata {
                    continue;
                }

                let mut value = 0.0;
                for &(r, wr) in rt {
                    for &(c, wc) in ct {
                        value += wr * wc * source[(r, c)];
                    }
                }
                *cell = value;
            }

            row_data
        })
        .collect();

    debug!(rows, cols, out_rows, out_cols, order, scale_factor, "grid resampled");

    let data = Array2::from_shape_vec((out_rows, out_cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    let mut output = Raster::from_array(data);
    output.set_transform(dem.transform().scaled(scale_factor));
    output.set_crs(dem.crs().cloned());
    output.set_nodata(dem.nodata());

    Ok(output)
}

fn output_len(n: usize, scale_factor: f64) -> usize {
    (n as f64 * scale_factor).round_ties_even() as usize
}

fn sample_position(i: usize, n_in: usize, n_out: usize) -> f64 {
    if n_out <= 1 {
        0.0
    } else {
        i as f64 * (n_in - 1) as f64 / (n_out - 1) as f64
    }
}

/// Separable prefilter along rows, then columns
fn spline_coefficients(dem: &Raster<f64>, valid: &Array2<bool>, valid_count: usize, order: usize) -> Array2<f64> {
    let mean = dem
        .data()
        .iter()
        .zip(valid.iter())
        .filter(|(_, &ok)| ok)
        .map(|(&v, _)| v)
        .sum::<f64>()
        / valid_count as f64;

    let mut coeffs = dem.data().clone();
    coeffs.zip_mut_with(valid, |v, &ok| {
        if !ok {
            *v = mean;
        }
    });

    let poles = poles(order);
    for axis in [Axis(1), Axis(0)] {
        for mut lane in coeffs.lanes_mut(axis) {
            let mut line = lane.to_vec();
            prefilter_line(&mut line, poles);
            lane.iter_mut().zip(line).for_each(|(dst, v)| *dst = v);
        }
    }
    coeffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use upbasin_core::{GeoTransform, CRS};

    fn grid(values: Vec<f64>, rows: usize, cols: usize) -> Raster<f64> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(500.0, 900.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32633)));
        r
    }

    fn noisy(rows: usize, cols: usize) -> Raster<f64> {
        let values = (0..rows * cols)
            .map(|i| {
                let (r, c) = (i / cols, i % cols);
                100.0 - r as f64 + ((r * 7 + c * 13) % 17) as f64 * 0.1
            })
            .collect();
        grid(values, rows, cols)
    }

    #[test]
    fn test_output_shape_and_metadata() {
        let dem = noisy(10, 8);
        let half = resample(&dem, 0.5, 1).unwrap();
        assert_eq!(half.shape(), (5, 4));
        assert_eq!(half.transform().pixel_width, 20.0);
        assert_eq!(half.transform().pixel_height, -20.0);
        assert_eq!(half.transform().origin_x, 500.0);
        assert_eq!(half.crs(), dem.crs());

        let back = resample(&half, 2.0, 1).unwrap();
        assert_eq!(back.shape(), dem.shape());
        assert_eq!(back.transform(), dem.transform());
    }

    #[test]
    fn test_shape_rounds_ties_to_even() {
        let dem = noisy(5, 7);
        let out = resample(&dem, 0.5, 0).unwrap();
        // 2.5 -> 2, 3.5 -> 4
        assert_eq!(out.shape(), (2, 4));
    }

    #[test]
    fn test_nearest_neighbour() {
        let dem = grid((0..9).map(|v| v as f64).collect(), 3, 3);
        let out = resample(&dem, 2.0, 0).unwrap();
        assert_eq!(out.shape(), (6, 6));
        // Positions 0, 0.4, 0.8, 1.2, 1.6, 2.0 -> 0, 0, 1, 1, 2, 2
        let first_row: Vec<f64> = out.data().row(0).to_vec();
        assert_eq!(first_row, vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);
        assert_eq!(out.get(5, 5).unwrap(), 8.0);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let dem = grid(vec![0.0, 10.0, 20.0, 30.0], 2, 2);
        let out = resample(&dem, 1.5, 1).unwrap();
        assert_eq!(out.shape(), (3, 3));
        assert_abs_diff_eq!(out.get(1, 1).unwrap(), 15.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.get(0, 1).unwrap(), 5.0, epsilon = 1e-12);
        assert_eq!(out.get(2, 2).unwrap(), 30.0);
    }

    #[test]
    fn test_identity_scale_reproduces_input() {
        let dem = noisy(9, 11);
        for order in 0..=MAX_ORDER {
            let out = resample(&dem, 1.0, order).unwrap();
            for (a, b) in dem.data().iter().zip(out.data().iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_constant_surface_stays_constant() {
        let dem = grid(vec![42.0; 48], 6, 8);
        for order in 0..=MAX_ORDER {
            let out = resample(&dem, 1.7, order).unwrap();
            for &v in out.data().iter() {
                assert_abs_diff_eq!(v, 42.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_nodata_footprint() {
        let mut values = vec![1.0; 16];
        values[5] = -9999.0; // (1,1)
        let mut dem = grid(values, 4, 4);
        dem.set_nodata(Some(-9999.0));

        let same = resample(&dem, 1.0, 1).unwrap();
        assert_eq!(same.value_at(1, 1).unwrap(), None);
        assert_eq!(same.value_at(1, 2).unwrap(), Some(1.0));

        let up = resample(&dem, 2.0, 1).unwrap();
        assert_eq!(up.nodata(), Some(-9999.0));
        assert_eq!(up.value_at(0, 0).unwrap(), Some(1.0));
        // Output (2,2) samples position (6/7, 6/7), between cells 0 and 1
        assert_eq!(up.value_at(2, 2).unwrap(), None);
        assert_eq!(up.value_at(7, 7).unwrap(), Some(1.0));

        // Spline footprints are wider but the far corner stays valid
        let cubic = resample(&dem, 2.0, 3).unwrap();
        assert_eq!(cubic.value_at(2, 2).unwrap(), None);
        assert!(cubic.value_at(7, 7).unwrap().is_some());
    }

    #[test]
    fn test_invalid_arguments() {
        let dem = noisy(4, 4);
        assert!(matches!(
            resample(&dem, 0.5, 6),
            Err(Error::InvalidInterpolationOrder { order: 6, max: 5 })
        ));
        assert!(matches!(
            resample(&dem, 0.0, 1),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            resample(&dem, f64::NAN, 1),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            resample(&dem, 0.01, 1),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
