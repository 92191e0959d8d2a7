//! Catchment delineation
//!
//! Traces every cell that drains to an outlet by walking the D8 graph
//! upstream, and clips rasters to the resulting catchment.

use ndarray::{s, Array2};
use std::collections::VecDeque;
use tracing::info;
use upbasin_core::raster::{d8, GeoTransform, Raster, RasterElement};
use upbasin_core::{Algorithm, Error, Result, CRS};

use super::outlet::{resolve_index_point, CellIndex};

/// Cells draining to an outlet, co-registered with the DEM it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchmentMask {
    data: Array2<bool>,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl CatchmentMask {
    /// Wrap a boolean grid with the georeferencing of `like`
    pub fn from_array<T: RasterElement>(data: Array2<bool>, like: &Raster<T>) -> Result<Self> {
        if data.dim() != like.shape() {
            let (ar, ac) = data.dim();
            return Err(Error::SizeMismatch {
                er: like.rows(),
                ec: like.cols(),
                ar,
                ac,
            });
        }
        Ok(Self {
            data,
            transform: *like.transform(),
            crs: like.crs().cloned(),
        })
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Whether (row, col) drains to the outlet; false outside the grid
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.data.get((row, col)).copied().unwrap_or(false)
    }

    /// Number of cells in the catchment
    pub fn cell_count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn data(&self) -> &Array2<bool> {
        &self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Smallest window (row, col, rows, cols) holding every catchment cell
    pub fn bounding_box(&self) -> Option<(usize, usize, usize, usize)> {
        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for ((row, col), &inside) in self.data.indexed_iter() {
            if !inside {
                continue;
            }
            bounds = Some(match bounds {
                None => (row, col, row, col),
                Some((r0, c0, r1, c1)) => (r0.min(row), c0.min(col), r1.max(row), c1.max(col)),
            });
        }
        bounds.map(|(r0, c0, r1, c1)| (r0, c0, r1 - r0 + 1, c1 - c0 + 1))
    }

    /// Whether `raster` has this mask's shape and transform
    pub fn is_coregistered<T: RasterElement>(&self, raster: &Raster<T>) -> bool {
        self.shape() == raster.shape() && self.transform == *raster.transform()
    }

    /// The mask cut down to its bounding box
    pub fn clip(&self) -> Result<CatchmentMask> {
        let (row, col, rows, cols) = self.bounding_box().ok_or(Error::EmptyRaster)?;
        Ok(Self {
            data: self.data.slice(s![row..row + rows, col..col + cols]).to_owned(),
            transform: self.transform.shifted(row, col),
            crs: self.crs.clone(),
        })
    }

    /// As a `u8` raster: 1 inside, 0 outside. For grid output.
    pub fn to_raster(&self) -> Raster<u8> {
        let mut raster = Raster::from_array(self.data.mapv(u8::from));
        raster.set_transform(self.transform);
        raster.set_crs(self.crs.clone());
        raster
    }
}

/// Catchment tracing algorithm
#[derive(Debug, Clone, Default)]
pub struct CatchmentTracer;

impl Algorithm for CatchmentTracer {
    type Input = Raster<u8>;
    type Output = CatchmentMask;
    type Params = CellIndex;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Catchment"
    }

    fn description(&self) -> &'static str {
        "Trace all cells draining to an outlet from D8 flow direction"
    }

    fn execute(&self, input: Self::Input, outlet: Self::Params) -> Result<Self::Output> {
        trace(&input, outlet)
    }
}

/// Trace the catchment of `outlet` on a D8 flow direction raster.
///
/// Breadth-first search against the flow: a neighbour joins the catchment
/// when its direction points at a cell already in it. The outlet itself is
/// always part of the mask.
///
/// # Errors
/// `IndexOutOfBounds` for an outlet outside the grid, `NoDataOutlet` when
/// the outlet has no data, `CycleDetected` when the outlet's own flow path
/// loops back into it.
pub fn trace(flow_dir: &Raster<u8>, outlet: CellIndex) -> Result<CatchmentMask> {
    let CellIndex { row, col } = resolve_index_point(flow_dir, outlet.row, outlet.col)?;
    let (rows, cols) = flow_dir.shape();

    let outlet_dir = unsafe { flow_dir.get_unchecked(row, col) };
    if outlet_dir == d8::NODATA || flow_dir.is_nodata(outlet_dir) {
        return Err(Error::NoDataOutlet { row, col });
    }

    let mut mask = Array2::<bool>::from_elem((rows, cols), false);
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    mask[(row, col)] = true;
    queue.push_back((row, col));

    // A neighbour in direction k flows into the current cell when its own
    // direction is the opposite of k
    while let Some((r, c)) = queue.pop_front() {
        for dir in d8::CODES {
            let Some((nr, nc)) = d8::target(r, c, dir) else {
                continue;
            };
            if !flow_dir.contains(nr, nc) {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);

            let neighbor_dir = unsafe { flow_dir.get_unchecked(nr, nc) };
            if neighbor_dir != d8::opposite(dir) {
                continue;
            }
            if (nr, nc) == (row, col) {
                return Err(Error::CycleDetected { row, col });
            }
            if !mask[(nr, nc)] {
                mask[(nr, nc)] = true;
                queue.push_back((nr, nc));
            }
        }
    }

    let catchment = CatchmentMask::from_array(mask, flow_dir)?;
    info!(outlet = %outlet, cells = catchment.cell_count(), "catchment traced");
    Ok(catchment)
}

/// Cut `raster` down to the bounding box of the catchment.
///
/// Values are copied as they are; nothing is recomputed for the smaller
/// extent.
///
/// # Errors
/// `SizeMismatch` if the raster is not co-registered with the mask,
/// `EmptyRaster` if the mask is empty.
pub fn clip_to_mask<T: RasterElement>(raster: &Raster<T>, mask: &CatchmentMask) -> Result<Raster<T>> {
    if !mask.is_coregistered(raster) {
        let (er, ec) = mask.shape();
        let (ar, ac) = raster.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }
    let (row, col, rows, cols) = mask.bounding_box().ok_or(Error::EmptyRaster)?;
    raster.window(row, col, rows, cols)
}
