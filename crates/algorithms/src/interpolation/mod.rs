//! Grid resampling
//!
//! Rescale a DEM by a uniform factor before delineation:
//! - Order 0: nearest neighbour
//! - Order 1: bilinear
//! - Orders 2-5: B-spline with a mirror-boundary prefilter

mod resample;
pub mod spline;

pub use resample::{resample, Resample, ResampleParams};
