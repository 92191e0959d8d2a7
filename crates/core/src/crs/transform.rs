//! Coordinate transformation services.
//!
//! The delineation pipeline treats reprojection as an opaque service behind
//! [`CrsTransform`]. [`UtmTransform`] is a pure-Rust WGS84 <-> UTM
//! implementation (Snyder 1987, USGS formulas) covering EPSG 326xx/327xx,
//! which is what ASCII-grid DEMs are usually delivered in.

use super::CRS;
use crate::error::{Error, Result};

/// Transforms a point between two coordinate reference systems.
///
/// Coordinates are always (x, y) = (easting, northing) or (longitude,
/// latitude) in degrees.
pub trait CrsTransform {
    fn transform(&self, x: f64, y: f64, source: &CRS, target: &CRS) -> Result<(f64, f64)>;
}

/// Accepts only equivalent CRS pairs and returns the point unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl CrsTransform for IdentityTransform {
    fn transform(&self, x: f64, y: f64, source: &CRS, target: &CRS) -> Result<(f64, f64)> {
        if source.is_equivalent(target) {
            Ok((x, y))
        } else {
            Err(unsupported(source, target, "identity transform needs equivalent CRSs"))
        }
    }
}

/// WGS84 geographic (EPSG:4326) <-> UTM north/south zones.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtmTransform;

impl CrsTransform for UtmTransform {
    fn transform(&self, x: f64, y: f64, source: &CRS, target: &CRS) -> Result<(f64, f64)> {
        if source.is_equivalent(target) {
            return Ok((x, y));
        }

        let (lon, lat) = match source.epsg() {
            Some(code) if is_wgs84(code) => (x, y),
            Some(code) => match parse_utm_epsg(code) {
                Some((zone, north)) => utm_to_wgs84(x, y, zone, north),
                None => return Err(unsupported(source, target, "unsupported source CRS")),
            },
            None => return Err(unsupported(source, target, "source CRS has no EPSG code")),
        };

        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(unsupported(
                source,
                target,
                &format!("({}, {}) is not a valid longitude/latitude", lon, lat),
            ));
        }

        match target.epsg() {
            Some(code) if is_wgs84(code) => Ok((lon, lat)),
            Some(code) => match parse_utm_epsg(code) {
                Some((zone, north)) => Ok(wgs84_to_utm(lon, lat, zone, north)),
                None => Err(unsupported(source, target, "unsupported target CRS")),
            },
            None => Err(unsupported(source, target, "target CRS has no EPSG code")),
        }
    }
}

fn unsupported(source: &CRS, target: &CRS, reason: &str) -> Error {
    Error::CrsTransform {
        source_crs: source.identifier(),
        target_crs: target.identifier(),
        reason: reason.to_string(),
    }
}

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Check if an EPSG code represents WGS84 geographic.
pub(crate) fn is_wgs84(epsg: u32) -> bool {
    epsg == 4326
}

/// Parse an EPSG code into UTM zone info: `Some((zone, is_north))`.
///
/// - EPSG 326xx → zone xx, North hemisphere
/// - EPSG 327xx → zone xx, South hemisphere
pub(crate) fn parse_utm_epsg(epsg: u32) -> Option<(u32, bool)> {
    if (32601..=32660).contains(&epsg) {
        Some((epsg - 32600, true))
    } else if (32701..=32760).contains(&epsg) {
        Some((epsg - 32700, false))
    } else {
        None
    }
}

fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

/// WGS84 (longitude, latitude) in degrees to UTM (easting, northing) in metres.
fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a = cos_lat * (lon - central_meridian(zone));
    let m = meridional_arc(lat);

    let a2 = a * a;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0
        * n
        * (a + (1.0 - t + c) * a2 * a / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a / 120.0)
        + FALSE_EASTING;

    // Snyder eq. 8-10
    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    if north {
        (easting, northing)
    } else {
        (easting, northing + FALSE_NORTHING_SOUTH)
    }
}

/// UTM (easting, northing) in metres to WGS84 (longitude, latitude) in degrees.
/// Snyder eqs. 8-17 to 8-25 via the footpoint latitude.
fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let mu = y / K0 / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let sqrt_1me2 = (1.0 - E2).sqrt();
    let e1 = (1.0 - sqrt_1me2) / (1.0 + sqrt_1me2);
    let (e1_2, e1_3) = (e1 * e1, e1 * e1 * e1);
    let e1_4 = e1_2 * e1_2;

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin1 = phi1.sin();
    let cos1 = phi1.cos();
    let tan1 = phi1.tan();

    let c1 = E_PRIME2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let w = 1.0 - E2 * sin1 * sin1;
    let n1 = A / w.sqrt();
    let r1 = A * (1.0 - E2) / w.powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d4 = d2 * d2;
    let d6 = d4 * d2;

    let lat = phi1
        - (n1 * tan1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d4
                * d
                / 120.0)
            / cos1;

    (lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians).
/// Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}
