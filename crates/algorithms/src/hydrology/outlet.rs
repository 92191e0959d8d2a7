//! Outlet (pour point) resolution
//!
//! Turns a user-supplied outlet into a cell index on the DEM grid. Index
//! outlets are taken as-is after a bounds check. Coordinate outlets are
//! reprojected into the raster's CRS, mapped to the containing cell and,
//! when a threshold is given, snapped to the nearest cell whose flow
//! accumulation exceeds it.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use upbasin_core::raster::{Raster, RasterElement};
use upbasin_core::{CrsTransform, Error, Result, CRS};

/// A cell of the DEM grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellIndex {
    pub row: usize,
    pub col: usize,
}

impl CellIndex {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for CellIndex {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Where the catchment drains to, as supplied by the caller
#[derive(Debug, Clone, PartialEq)]
pub enum OutletPoint {
    /// Grid cell, used without snapping
    Index { row: usize, col: usize },
    /// Map coordinate in `crs`
    Coordinate { x: f64, y: f64, crs: CRS },
}

impl OutletPoint {
    pub fn index(row: usize, col: usize) -> Self {
        OutletPoint::Index { row, col }
    }

    pub fn coordinate(x: f64, y: f64, crs: CRS) -> Self {
        OutletPoint::Coordinate { x, y, crs }
    }
}

/// Bounds-checked identity mapping of a grid index.
pub fn resolve_index_point<T: RasterElement>(grid: &Raster<T>, row: usize, col: usize) -> Result<CellIndex> {
    let (rows, cols) = grid.shape();
    if row >= rows || col >= cols {
        return Err(Error::IndexOutOfBounds { row, col, rows, cols });
    }
    Ok(CellIndex { row, col })
}

/// Map a coordinate in `source_crs` to the cell that contains it.
///
/// The point is moved into the raster's own CRS, or into `target_crs` when
/// the raster carries none. Equivalent CRSs skip the transform service.
///
/// # Errors
/// `CrsTransform` when the service cannot handle the pair,
/// `CoordinateOutOfBounds` when the point lies outside the grid.
pub fn resolve_coordinate_point<T: RasterElement>(
    grid: &Raster<T>,
    x: f64,
    y: f64,
    source_crs: &CRS,
    target_crs: &CRS,
    service: &dyn CrsTransform,
) -> Result<CellIndex> {
    let (tx, ty) = project_to_grid(grid, x, y, source_crs, target_crs, service)?;
    let (row, col) = grid.coordinate_to_index(tx, ty)?;
    debug!(x = tx, y = ty, row, col, "coordinate mapped to cell");
    Ok(CellIndex { row, col })
}

/// (x, y) expressed in the grid's CRS
fn project_to_grid<T: RasterElement>(
    grid: &Raster<T>,
    x: f64,
    y: f64,
    source_crs: &CRS,
    target_crs: &CRS,
    service: &dyn CrsTransform,
) -> Result<(f64, f64)> {
    let target = grid.crs().unwrap_or(target_crs);
    if source_crs.is_equivalent(target) {
        return Ok((x, y));
    }
    let projected = service.transform(x, y, source_crs, target)?;
    debug!(from = %source_crs, to = %target, "outlet reprojected");
    Ok(projected)
}

/// Nearest cell to `raw_point` whose accumulation is strictly above
/// `threshold`.
///
/// `raw_point` is a map coordinate in the grid's CRS and must lie on the
/// grid. Distance runs from that point to each cell centre in map units;
/// `search_radius` is given in cells (multiples of the cell size) and
/// `None` searches the whole raster. Ties go to the smaller distance, then
/// the smaller row, then the smaller column. No-data cells never qualify.
///
/// # Errors
/// `NoQualifyingCell` if nothing within reach exceeds the threshold;
/// `CoordinateOutOfBounds` when `raw_point` is off the grid;
/// `InvalidParameter` for a NaN threshold or a negative radius.
pub fn snap_to_high_accumulation(
    acc: &Raster<f64>,
    threshold: f64,
    search_radius: Option<f64>,
    raw_point: (f64, f64),
) -> Result<CellIndex> {
    if threshold.is_nan() {
        return Err(Error::InvalidParameter {
            name: "threshold",
            value: threshold.to_string(),
            reason: "must be a number".into(),
        });
    }
    if let Some(r) = search_radius {
        if !(r >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "search_radius",
                value: r.to_string(),
                reason: "must be >= 0".into(),
            });
        }
    }

    let (x, y) = raw_point;
    let (raw_row, raw_col) = acc.coordinate_to_index(x, y)?;
    let (frac_col, frac_row) = acc.geo_to_pixel(x, y);
    let gt = *acc.transform();

    // Squared map distance from the raw point to the centre of (row, col)
    let distance2 = |row: usize, col: usize| {
        let dc = col as f64 + 0.5 - frac_col;
        let dr = row as f64 + 0.5 - frac_row;
        let dx = dc * gt.pixel_width + dr * gt.row_rotation;
        let dy = dc * gt.col_rotation + dr * gt.pixel_height;
        dx * dx + dy * dy
    };

    // Rows and columns that can hold a cell centre within reach
    let (rows, cols) = acc.shape();
    let (row_range, col_range, limit) = match search_radius {
        Some(radius) => {
            let reach = radius * acc.cell_size();
            let span = |pixel: f64, extent: usize, at: usize| {
                let cells = (reach / pixel.abs()).ceil().min(extent as f64) as usize + 1;
                at.saturating_sub(cells)..(at + cells + 1).min(extent)
            };
            (
                span(gt.pixel_height, rows, raw_row),
                span(gt.pixel_width, cols, raw_col),
                reach * reach,
            )
        }
        None => (0..rows, 0..cols, f64::INFINITY),
    };

    let mut best: Option<(f64, usize, usize)> = None;
    for row in row_range {
        for col in col_range.clone() {
            let v = unsafe { acc.get_unchecked(row, col) };
            if acc.is_nodata(v) || !(v > threshold) {
                continue;
            }
            let key = (distance2(row, col), row, col);
            if key.0 <= limit && best.map_or(true, |b| key < b) {
                best = Some(key);
            }
        }
    }

    match best {
        Some((d2, row, col)) => {
            let snapped = CellIndex { row, col };
            let raw = CellIndex::new(raw_row, raw_col);
            info!(
                from = %raw,
                to = %snapped,
                distance = d2.sqrt(),
                "outlet snapped"
            );
            Ok(snapped)
        }
        None => Err(Error::NoQualifyingCell { threshold }),
    }
}

/// Resolves [`OutletPoint`]s against one grid, with a fixed CRS service
/// and snapping radius.
pub struct OutletResolver<'a> {
    service: &'a dyn CrsTransform,
    raster_crs: CRS,
    search_radius: Option<f64>,
}

impl<'a> OutletResolver<'a> {
    /// `raster_crs` is used for grids that carry no CRS of their own.
    pub fn new(service: &'a dyn CrsTransform, raster_crs: CRS) -> Self {
        Self {
            service,
            raster_crs,
            search_radius: None,
        }
    }

    pub fn with_search_radius(mut self, search_radius: Option<f64>) -> Self {
        self.search_radius = search_radius;
        self
    }

    /// Resolve `outlet` on `grid`.
    ///
    /// Coordinate outlets are snapped on `acc` when `threshold` is given;
    /// index outlets never are. A coordinate outside the grid fails before
    /// any snapping.
    pub fn resolve<T: RasterElement>(
        &self,
        grid: &Raster<T>,
        outlet: &OutletPoint,
        acc: &Raster<f64>,
        threshold: Option<f64>,
    ) -> Result<CellIndex> {
        match outlet {
            OutletPoint::Index { row, col } => resolve_index_point(grid, *row, *col),
            OutletPoint::Coordinate { x, y, crs } => {
                let point = project_to_grid(grid, *x, *y, crs, &self.raster_crs, self.service)?;
                let (row, col) = grid.coordinate_to_index(point.0, point.1)?;
                match threshold {
                    Some(t) => {
                        grid.ensure_coregistered(acc)?;
                        snap_to_high_accumulation(acc, t, self.search_radius, point)
                    }
                    None => Ok(CellIndex { row, col }),
                }
            }
        }
    }
}
