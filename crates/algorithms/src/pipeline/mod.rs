//! Delineation entry points
//!
//! Chains the stages for one outlet: condition the DEM, route flow,
//! accumulate, resolve the outlet and trace its catchment. Accumulation is
//! always computed on the full grid; clipping to the catchment happens last
//! and only windows the results.

mod config;

pub use config::DelineationOptions;

use tracing::info;
use upbasin_core::io::write_ascii_grid;
use upbasin_core::raster::Raster;
use upbasin_core::{CrsTransform, Result, UtmTransform};

use crate::hydrology::{
    clip_to_mask, condition_dem, flow_accumulation, flow_direction, trace, CatchmentMask,
    CellIndex, OutletPoint, OutletResolver,
};
use crate::interpolation::resample;

/// Every intermediate of a delineation run, co-registered with each other.
#[derive(Debug, Clone)]
pub struct CatchmentAnalysis {
    /// Conditioned DEM
    pub dem: Raster<f64>,
    pub flow_direction: Raster<u8>,
    /// Computed on the full grid, windowed when clipped
    pub accumulation: Raster<f64>,
    /// Resolved outlet, in the coordinates of these rasters
    pub outlet: CellIndex,
    pub catchment: CatchmentMask,
}

impl CatchmentAnalysis {
    /// Window every raster to the catchment's bounding box.
    pub fn clipped(self) -> Result<Self> {
        let catchment = self.catchment.clip()?;
        let (row0, col0) = match self.catchment.bounding_box() {
            Some((row, col, _, _)) => (row, col),
            None => (0, 0),
        };

        Ok(Self {
            dem: clip_to_mask(&self.dem, &self.catchment)?,
            flow_direction: clip_to_mask(&self.flow_direction, &self.catchment)?,
            accumulation: clip_to_mask(&self.accumulation, &self.catchment)?,
            outlet: CellIndex::new(self.outlet.row - row0, self.outlet.col - col0),
            catchment,
        })
    }
}

/// Catchment mask of `outlet` on `grid`, reprojecting with [`UtmTransform`].
///
/// `threshold` enables snapping of coordinate outlets to the nearest cell
/// whose accumulation exceeds it.
pub fn delineate_catchment(
    grid: &Raster<f64>,
    outlet: &OutletPoint,
    threshold: Option<f64>,
    options: &DelineationOptions,
) -> Result<CatchmentMask> {
    delineate_catchment_with(grid, outlet, threshold, options, &UtmTransform)
}

/// [`delineate_catchment`] with a caller-supplied CRS transform service.
pub fn delineate_catchment_with(
    grid: &Raster<f64>,
    outlet: &OutletPoint,
    threshold: Option<f64>,
    options: &DelineationOptions,
    service: &dyn CrsTransform,
) -> Result<CatchmentMask> {
    analyze_catchment_with(grid, outlet, threshold, options, service).map(|a| a.catchment)
}

/// Full delineation run keeping every intermediate raster.
pub fn analyze_catchment(
    grid: &Raster<f64>,
    outlet: &OutletPoint,
    threshold: Option<f64>,
    options: &DelineationOptions,
) -> Result<CatchmentAnalysis> {
    analyze_catchment_with(grid, outlet, threshold, options, &UtmTransform)
}

/// [`analyze_catchment`] with a caller-supplied CRS transform service.
///
/// # Errors
/// `Config` for invalid options, then any stage error unchanged.
pub fn analyze_catchment_with(
    grid: &Raster<f64>,
    outlet: &OutletPoint,
    threshold: Option<f64>,
    options: &DelineationOptions,
    service: &dyn CrsTransform,
) -> Result<CatchmentAnalysis> {
    options.validate()?;

    let dem = condition_dem(grid, &options.conditioning)?;
    if let Some(path) = &options.conditioned_dem_output {
        write_ascii_grid(&dem, path)?;
    }

    let fdir = flow_direction(&dem)?;
    let acc = flow_accumulation(&fdir)?;

    let resolver =
        OutletResolver::new(service, options.crs.clone()).with_search_radius(options.search_radius);
    let cell = resolver.resolve(&dem, outlet, &acc, threshold)?;
    let catchment = trace(&fdir, cell)?;
    let outlet_acc = acc.get(cell.row, cell.col)?;

    info!(
        outlet = %cell,
        cells = catchment.cell_count(),
        accumulation = outlet_acc,
        clip = options.clip_to_catchment,
        "delineation finished"
    );

    let analysis = CatchmentAnalysis {
        dem,
        flow_direction: fdir,
        accumulation: acc,
        outlet: cell,
        catchment,
    };
    if options.clip_to_catchment {
        analysis.clipped()
    } else {
        Ok(analysis)
    }
}

/// Resample `grid` by `scale_factor` with interpolation of degree `order`.
pub fn resample_grid(grid: &Raster<f64>, scale_factor: f64, order: usize) -> Result<Raster<f64>> {
    resample(grid, scale_factor, order)
}
