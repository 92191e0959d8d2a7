//! Hydrologic conditioning: the fixed fill / flood / flatten sequence

use serde::{Deserialize, Serialize};
use tracing::info;
use upbasin_core::raster::Raster;
use upbasin_core::Result;

use super::{ensure_has_data, fill_depressions, fill_pits, resolve_flats_detailed, FillDepressionsParams};

/// Which conditioning steps to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConditioningParams {
    pub fill_pits: bool,
    pub fill_depressions: bool,
    pub resolve_flats: bool,
    /// Gradient imposed while filling depressions; 0 leaves filled areas flat
    pub depression_epsilon: f64,
}

impl Default for ConditioningParams {
    fn default() -> Self {
        Self {
            fill_pits: true,
            fill_depressions: true,
            resolve_flats: true,
            depression_epsilon: 0.0,
        }
    }
}

/// Condition a DEM for D8 routing.
///
/// Runs pit filling, depression filling and flat resolution in that order,
/// skipping the disabled ones. The input is never modified.
///
/// # Errors
/// `EmptyRaster` if the DEM holds no valid cell, plus any error of the
/// individual steps.
pub fn condition_dem(dem: &Raster<f64>, params: &ConditioningParams) -> Result<Raster<f64>> {
    ensure_has_data(dem)?;

    let mut current = dem.clone();
    if params.fill_pits {
        current = fill_pits(&current)?;
    }
    if params.fill_depressions {
        current = fill_depressions(
            &current,
            FillDepressionsParams {
                epsilon: params.depression_epsilon,
            },
        )?;
    }
    if params.resolve_flats {
        let resolution = resolve_flats_detailed(&current)?;
        info!(
            flats = resolution.flats,
            undrainable = resolution.undrainable.len(),
            "DEM conditioned"
        );
        current = resolution.dem;
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_direction;
    use upbasin_core::raster::d8;
    use upbasin_core::GeoTransform;

    #[test]
    fn test_conditioned_dem_has_no_sinks() {
        // Closed basin with a pit and a flat floor
        let mut dem = Raster::filled(7, 7, 4.0);
        dem.set_transform(GeoTransform::new(0.0, 7.0, 1.0, -1.0));
        for i in 0..7 {
            dem.set(0, i, 9.0).unwrap();
            dem.set(6, i, 9.0).unwrap();
            dem.set(i, 0, 9.0).unwrap();
            dem.set(i, 6, 9.0).unwrap();
        }
        dem.set(3, 3, 1.0).unwrap();
        dem.set(2, 2, 2.0).unwrap();

        let conditioned = condition_dem(&dem, &ConditioningParams::default()).unwrap();
        let fdir = flow_direction(&conditioned).unwrap();
        assert!(fdir.data().iter().all(|&d| d != d8::NO_FLOW));
    }

    #[test]
    fn test_all_steps_disabled_is_identity() {
        let mut dem = Raster::filled(3, 3, 2.0);
        dem.set(1, 1, 0.0).unwrap();
        let params = ConditioningParams {
            fill_pits: false,
            fill_depressions: false,
            resolve_flats: false,
            depression_epsilon: 0.0,
        };
        let out = condition_dem(&dem, &params).unwrap();
        assert_eq!(out.data(), dem.data());
    }

    #[test]
    fn test_params_from_partial_toml() {
        let params: ConditioningParams = toml::from_str("resolve_flats = false").unwrap();
        assert!(params.fill_pits);
        assert!(!params.resolve_flats);
        assert!(toml::from_str::<ConditioningParams>("breach = true").is_err());
    }
}
