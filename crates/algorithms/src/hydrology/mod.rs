//! Hydrological analysis algorithms
//!
//! Everything needed to go from a raw DEM to a catchment mask:
//! - Fill pits: raise single-cell pits to their lowest neighbour
//! - Priority-Flood: optimal O(n log n) depression filling (Barnes 2014)
//! - Resolve flats: impose a drainage gradient on flat areas (Barnes 2014)
//! - Flow direction: D8 single flow direction with boundary outlets
//! - Flow accumulation: upstream contributing area
//! - Outlet: index/coordinate pour points and accumulation snapping
//! - Catchment: upstream tracing from an outlet and mask clipping

mod catchment;
mod condition;
mod fill_pits;
pub(crate) mod flow_accumulation;
pub(crate) mod flow_direction;
mod outlet;
mod priority_flood;
mod resolve_flats;

pub use catchment::{clip_to_mask, trace, CatchmentMask, CatchmentTracer};
pub use condition::{condition_dem, ConditioningParams};
pub use fill_pits::{fill_pits, FillPits};
pub use flow_accumulation::{flow_accumulation, flow_accumulation_weighted, FlowAccumulation};
pub use flow_direction::{flow_direction, FlowDirection};
pub use outlet::{
    resolve_coordinate_point, resolve_index_point, snap_to_high_accumulation, CellIndex,
    OutletPoint, OutletResolver,
};
pub use priority_flood::{fill_depressions, FillDepressions, FillDepressionsParams};
pub use resolve_flats::{resolve_flats, resolve_flats_detailed, FlatResolution, ResolveFlats};

use upbasin_core::raster::{d8, Raster};
use upbasin_core::{Error, Result};

/// Fail with `EmptyRaster` when the DEM has no valid cell to work on
pub(crate) fn ensure_has_data(dem: &Raster<f64>) -> Result<()> {
    if dem.is_empty() || dem.valid_count() == 0 {
        return Err(Error::EmptyRaster);
    }
    Ok(())
}

/// A valid cell drains off the DEM when it sits on the raster edge or
/// touches a no-data cell.
pub(crate) fn is_boundary(dem: &Raster<f64>, row: usize, col: usize) -> bool {
    d8::OFFSETS[1..].iter().any(|&(dr, dc)| {
        let nr = row as isize + dr;
        let nc = col as isize + dc;
        !dem.contains(nr, nc) || !dem.is_valid_at(nr as usize, nc as usize)
    })
}
