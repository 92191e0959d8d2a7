//! Neighborhood operations for raster analysis

use super::{Raster, RasterElement};

/// Defines a neighborhood pattern around a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighborhood {
    /// 3x3 neighborhood (8 neighbors + center)
    Queen3x3,
}

impl Neighborhood {
    /// Get the radius of the neighborhood
    pub fn radius(&self) -> usize {
        match self {
            Neighborhood::Queen3x3 => 1,
        }
    }

    /// Relative positions in this neighborhood, row-major
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius() as isize;
        (-r..=r)
            .flat_map(|dr| (-r..=r).map(move |dc| (dr, dc)))
            .collect()
    }

    /// Get offsets excluding the center cell
    pub fn offsets_no_center(&self) -> Vec<(isize, isize)> {
        self.offsets()
            .into_iter()
            .filter(|&(dr, dc)| dr != 0 || dc != 0)
            .collect()
    }
}

/// D8 flow directions.
///
/// ```text
///   4  3  2
///   5  0  1
///   6  7  8
/// ```
/// `0` is a cell without outflow (interior sink), `255` marks no-data.
/// Codes are also the tie-break priority: when two neighbours are equally
/// steep the lower code wins.
pub mod d8 {
    /// Cell has no downslope neighbour
    pub const NO_FLOW: u8 = 0;

    /// Direction value stored for no-data cells
    pub const NODATA: u8 = 255;

    /// Direction offsets: (row_offset, col_offset)
    /// Indexed by direction code (1-8), 0 is unused
    pub const OFFSETS: [(isize, isize); 9] = [
        (0, 0),   // 0: no flow / pit
        (0, 1),   // 1: E
        (-1, 1),  // 2: NE
        (-1, 0),  // 3: N
        (-1, -1), // 4: NW
        (0, -1),  // 5: W
        (1, -1),  // 6: SW
        (1, 0),   // 7: S
        (1, 1),   // 8: SE
    ];

    /// Direction codes in tie-break priority order
    pub const CODES: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

    /// Whether `dir` is one of the eight compass codes
    pub fn is_direction(dir: u8) -> bool {
        (1..=8).contains(&dir)
    }

    /// Offset for a compass code, `None` for sinks, no-data and junk
    pub fn offset(dir: u8) -> Option<(isize, isize)> {
        is_direction(dir).then(|| OFFSETS[dir as usize])
    }

    /// Cell reached by following `dir` from (row, col), possibly off-grid
    pub fn target(row: usize, col: usize, dir: u8) -> Option<(isize, isize)> {
        offset(dir).map(|(dr, dc)| (row as isize + dr, col as isize + dc))
    }

    /// Get the opposite direction
    pub fn opposite(dir: u8) -> u8 {
        if is_direction(dir) {
            ((dir - 1 + 4) % 8) + 1
        } else {
            dir
        }
    }
}

/// Iterator over neighborhood values for a specific cell
pub struct NeighborhoodIterator<'a, T: RasterElement> {
    raster: &'a Raster<T>,
    center_row: usize,
    center_col: usize,
    offsets: Vec<(isize, isize)>,
    index: usize,
}

impl<'a, T: RasterElement> NeighborhoodIterator<'a, T> {
    pub fn new(raster: &'a Raster<T>, row: usize, col: usize, neighborhood: Neighborhood) -> Self {
        Self {
            raster,
            center_row: row,
            center_col: col,
            offsets: neighborhood.offsets_no_center(),
            index: 0,
        }
    }
}

impl<'a, T: RasterElement> Iterator for NeighborhoodIterator<'a, T> {
    /// (row, col, value) or None if out of bounds
    type Item = Option<(usize, usize, T)>;

    fn next(&mut self) -> Option<Self::Item> {
        let &(dr, dc) = self.offsets.get(self.index)?;
        self.index += 1;

        let new_row = self.center_row as isize + dr;
        let new_col = self.center_col as isize + dc;

        if !self.raster.contains(new_row, new_col) {
            return Some(None);
        }

        let (r, c) = (new_row as usize, new_col as usize);
        // Safe because contains() checked bounds
        let value = unsafe { self.raster.get_unchecked(r, c) };
        Some(Some((r, c, value)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.offsets.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a, T: RasterElement> ExactSizeIterator for NeighborhoodIterator<'a, T> {}
