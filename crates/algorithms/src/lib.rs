//! # upbasin algorithms
//!
//! Catchment delineation on gridded elevation models.
//!
//! ## Modules
//!
//! - **hydrology**: pit and depression filling, flat resolution, D8 flow
//!   direction, flow accumulation, outlet resolution, catchment tracing
//! - **interpolation**: grid resampling (nearest, bilinear, B-spline)
//! - **pipeline**: `delineate_catchment`, `analyze_catchment` and
//!   `resample_grid` with their [`DelineationOptions`]
//!
//! ```no_run
//! use upbasin_algorithms::prelude::*;
//! use upbasin_core::io::read_ascii_grid;
//!
//! # fn main() -> upbasin_core::Result<()> {
//! let dem = read_ascii_grid("dem.asc")?;
//! let mask = delineate_catchment(&dem, &OutletPoint::index(120, 87), None, &DelineationOptions::default())?;
//! println!("{} cells drain to the outlet", mask.cell_count());
//! # Ok(())
//! # }
//! ```

pub mod hydrology;
pub mod interpolation;
pub mod pipeline;

mod maybe_rayon;

pub use pipeline::{
    analyze_catchment, analyze_catchment_with, delineate_catchment, delineate_catchment_with,
    resample_grid, CatchmentAnalysis, DelineationOptions,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrology::{
        clip_to_mask, condition_dem, fill_depressions, fill_pits, flow_accumulation,
        flow_direction, resolve_flats, snap_to_high_accumulation, trace, CatchmentMask,
        CellIndex, ConditioningParams, FillDepressionsParams, OutletPoint,
    };
    pub use crate::interpolation::resample;
    pub use crate::pipeline::{
        analyze_catchment, delineate_catchment, resample_grid, CatchmentAnalysis,
        DelineationOptions,
    };
    pub use upbasin_core::prelude::*;
}
