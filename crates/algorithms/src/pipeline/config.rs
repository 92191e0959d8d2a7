use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use upbasin_core::{Error, Result, CRS};

use crate::hydrology::{ConditioningParams, OutletPoint};

/// Every knob of a delineation run, with its default.
///
/// Read once at call entry; the pipeline never changes it.
///
/// ```toml
/// crs = "EPSG:32633"
/// search_radius = 5.0
/// clip_to_catchment = true
///
/// [conditioning]
/// depression_epsilon = 0.001
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DelineationOptions {
    /// CRS of grids that carry none of their own
    pub crs: CRS,
    /// CRS of outlets built with [`DelineationOptions::coordinate_outlet`]
    pub coordinate_crs: CRS,
    /// Snapping radius in cells; `None` searches the whole grid
    pub search_radius: Option<f64>,
    /// Cut every output down to the catchment's bounding box
    pub clip_to_catchment: bool,
    pub conditioning: ConditioningParams,
    /// Write the conditioned DEM here as an ASCII grid
    pub conditioned_dem_output: Option<PathBuf>,
}

impl Default for DelineationOptions {
    fn default() -> Self {
        Self {
            crs: CRS::wgs84(),
            coordinate_crs: CRS::wgs84(),
            search_radius: None,
            clip_to_catchment: false,
            conditioning: ConditioningParams::default(),
            conditioned_dem_output: None,
        }
    }
}

impl DelineationOptions {
    /// Parse and validate options from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Parse and validate options from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Reject values no run could use
    pub fn validate(&self) -> Result<()> {
        if let Some(r) = self.search_radius {
            if !(r.is_finite() && r >= 0.0) {
                return Err(Error::Config(format!(
                    "search_radius must be a finite number >= 0, got {}",
                    r
                )));
            }
        }
        let eps = self.conditioning.depression_epsilon;
        if !(eps.is_finite() && eps >= 0.0) {
            return Err(Error::Config(format!(
                "conditioning.depression_epsilon must be a finite number >= 0, got {}",
                eps
            )));
        }
        Ok(())
    }

    /// Coordinate outlet in `coordinate_crs`
    pub fn coordinate_outlet(&self, x: f64, y: f64) -> OutletPoint {
        OutletPoint::coordinate(x, y, self.coordinate_crs.clone())
    }
}
