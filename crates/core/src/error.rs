//! Error types for upbasin

use thiserror::Error;

/// Main error type for upbasin operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed grid input. `line` is 1-based; 0 when the problem is not
    /// tied to a single line (e.g. a value count mismatch).
    #[error("Malformed grid at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("Raster contains no valid data cells")]
    EmptyRaster,

    /// The flow graph contains a cycle. Always a conditioning bug or a
    /// hand-built direction field; never retried.
    #[error("Cycle detected in flow graph at ({row}, {col})")]
    CycleDetected { row: usize, col: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Coordinate ({x}, {y}) lies outside the raster extent")]
    CoordinateOutOfBounds { x: f64, y: f64 },

    #[error("No cell with accumulation above {threshold} within the search radius")]
    NoQualifyingCell { threshold: f64 },

    #[error("Outlet ({row}, {col}) is a no-data cell")]
    NoDataOutlet { row: usize, col: usize },

    #[error("Invalid interpolation order {order}: must be in 0..={max}")]
    InvalidInterpolationOrder { order: usize, max: usize },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS transform failed ({source_crs} -> {target_crs}): {reason}")]
    CrsTransform {
        source_crs: String,
        target_crs: String,
        reason: String,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        Error::Format {
            line,
            message: message.into(),
        }
    }

    /// Whether the caller can reasonably retry with different parameters.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::IndexOutOfBounds { .. }
                | Error::CoordinateOutOfBounds { .. }
                | Error::NoQualifyingCell { .. }
                | Error::NoDataOutlet { .. }
        )
    }
}

/// Result type alias for upbasin operations
pub type Result<T> = std::result::Result<T, Error>;
