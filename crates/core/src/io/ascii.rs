//! ESRI ASCII grid reading/writing
//!
//! ```text
//! ncols         4
//! nrows         3
//! xllcorner     500000.0
//! yllcorner     4100000.0
//! cellsize      30.0
//! NODATA_value  -9999
//! 12.5 13.0 13.1 -9999
//! ...
//! ```
//! `xllcenter`/`yllcenter` are accepted in place of the corner keys, header
//! keys are case-insensitive and `NODATA_value` is optional. Values are read
//! row-major, north to south. Output always uses corner registration and the
//! shortest decimal form that reads back to the same `f64`, so a read/write
//! cycle is lossless.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// No-data value written when a raster has NaN cells but no declared sentinel
pub const DEFAULT_NODATA: f64 = -9999.0;

#[derive(Debug, Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    x: Option<(f64, bool)>,
    y: Option<(f64, bool)>,
    cellsize: Option<f64>,
    nodata: Option<f64>,
}

/// Read an ASCII grid file into a Raster
pub fn read_ascii_grid<P: AsRef<Path>>(path: P) -> Result<Raster<f64>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let raster = read_ascii_grid_from_str(&text)?;
    debug!(
        path = %path.as_ref().display(),
        rows = raster.rows(),
        cols = raster.cols(),
        "read ASCII grid"
    );
    Ok(raster)
}

/// Parse an ASCII grid held in memory
pub fn read_ascii_grid_from_str(text: &str) -> Result<Raster<f64>> {
    let mut header = Header::default();
    let mut lines = text.lines().enumerate().peekable();

    // Header lines start with a keyword; the first numeric line starts the body
    while let Some(&(idx, line)) = lines.peek() {
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            lines.next();
            continue;
        };
        if !key.starts_with(|c: char| c.is_ascii_alphabetic()) || is_number(key) {
            break;
        }
        lines.next();

        let line_no = idx + 1;
        let value = tokens
            .next()
            .ok_or_else(|| Error::format(line_no, format!("missing value for '{}'", key)))?;
        if tokens.next().is_some() {
            return Err(Error::format(line_no, format!("trailing tokens after '{}'", key)));
        }
        parse_header_entry(&mut header, key, value, line_no)?;
    }

    let first_body_line = lines.peek().map_or(text.lines().count() + 1, |&(idx, _)| idx + 1);
    let missing = |key: &str| Error::format(first_body_line, format!("header is missing '{}'", key));

    let ncols = header.ncols.ok_or_else(|| missing("ncols"))?;
    let nrows = header.nrows.ok_or_else(|| missing("nrows"))?;
    let (x, x_center) = header.x.ok_or_else(|| missing("xllcorner"))?;
    let (y, y_center) = header.y.ok_or_else(|| missing("yllcorner"))?;
    let cellsize = header.cellsize.ok_or_else(|| missing("cellsize"))?;

    let half = cellsize / 2.0;
    let x_ll = if x_center { x - half } else { x };
    let y_ll = if y_center { y - half } else { y };

    let expected = nrows * ncols;
    let mut values = Vec::with_capacity(expected);
    for (idx, line) in lines {
        for token in line.split_whitespace() {
            let value = token.parse::<f64>().map_err(|_| {
                Error::format(idx + 1, format!("'{}' is not a number", token))
            })?;
            values.push(value);
        }
    }

    if values.len() != expected {
        return Err(Error::format(
            0,
            format!(
                "expected {} values ({} rows x {} cols), found {}",
                expected,
                nrows,
                ncols,
                values.len()
            ),
        ));
    }

    let mut raster = Raster::from_vec(values, nrows, ncols)?;
    raster.set_transform(GeoTransform::from_lower_left(x_ll, y_ll, cellsize, nrows));
    raster.set_nodata(header.nodata);
    Ok(raster)
}

fn is_number(token: &str) -> bool {
    token.parse::<f64>().is_ok()
}

fn parse_header_entry(header: &mut Header, key: &str, value: &str, line: usize) -> Result<()> {
    let number = || {
        value
            .parse::<f64>()
            .map_err(|_| Error::format(line, format!("'{}' is not a number for '{}'", value, key)))
    };
    let count = || {
        value
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| Error::format(line, format!("'{}' must be a positive integer", key)))
    };

    let key_lower = key.to_ascii_lowercase();
    let duplicate = match key_lower.as_str() {
        "ncols" => header.ncols.replace(count()?).is_some(),
        "nrows" => header.nrows.replace(count()?).is_some(),
        "xllcorner" => header.x.replace((number()?, false)).is_some(),
        "xllcenter" => header.x.replace((number()?, true)).is_some(),
        "yllcorner" => header.y.replace((number()?, false)).is_some(),
        "yllcenter" => header.y.replace((number()?, true)).is_some(),
        "cellsize" => {
            let size = number()?;
            if !(size.is_finite() && size > 0.0) {
                return Err(Error::format(line, "cellsize must be positive"));
            }
            header.cellsize.replace(size).is_some()
        }
        "nodata_value" => header.nodata.replace(number()?).is_some(),
        _ => return Err(Error::format(line, format!("unknown header key '{}'", key))),
    };

    if duplicate {
        return Err(Error::format(line, format!("duplicate header key '{}'", key)));
    }
    Ok(())
}

/// Write a raster to an ASCII grid file
pub fn write_ascii_grid<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_ascii_grid(raster, &mut writer)?;
    writer.flush()?;
    debug!(path = %path.as_ref().display(), "wrote ASCII grid");
    Ok(())
}

/// Render a raster as ASCII grid text
pub fn write_ascii_grid_to_string<T: RasterElement>(raster: &Raster<T>) -> Result<String> {
    let mut buf = Vec::new();
    encode_ascii_grid(raster, &mut buf)?;
    String::from_utf8(buf).map_err(|e| Error::Other(e.to_string()))
}

fn encode_ascii_grid<T, W>(raster: &Raster<T>, writer: &mut W) -> Result<()>
where
    T: RasterElement,
    W: Write,
{
    let gt = raster.transform();
    if !gt.is_square_north_up() {
        return Err(Error::InvalidParameter {
            name: "transform",
            value: format!("{:?}", gt),
            reason: "ASCII grids need square, unrotated, north-up cells".into(),
        });
    }

    let (rows, cols) = raster.shape();
    let (x_ll, _) = gt.lower_left(rows);
    let y_ll = lower_left_y(gt.origin_y, rows, gt.cell_size());

    let cells: Vec<f64> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f64::NAN
            } else {
                v.to_f64().unwrap_or(f64::NAN)
            }
        })
        .collect();

    let declared = raster.nodata().and_then(|nd| nd.to_f64()).filter(|nd| !nd.is_nan());
    let nodata = match declared {
        Some(nd) => Some(nd),
        None if cells.iter().any(|v| v.is_nan()) => Some(DEFAULT_NODATA),
        None => None,
    };

    writeln!(writer, "ncols         {}", cols)?;
    writeln!(writer, "nrows         {}", rows)?;
    writeln!(writer, "xllcorner     {}", x_ll)?;
    writeln!(writer, "yllcorner     {}", y_ll)?;
    writeln!(writer, "cellsize      {}", gt.cell_size())?;
    if let Some(nd) = nodata {
        writeln!(writer, "NODATA_value  {}", nd)?;
    }

    for row in cells.chunks(cols.max(1)) {
        let mut first = true;
        for &v in row {
            if !first {
                writer.write_all(b" ")?;
            }
            first = false;
            match (v.is_nan(), nodata) {
                (true, Some(nd)) => write!(writer, "{}", nd)?,
                _ => write!(writer, "{}", v)?,
            }
        }
        writer.write_all(b"\n")?;
    }

    Ok(())
}

/// Shortest `yllcorner` that reads back to a grid whose top edge is `top`.
///
/// `top - rows * cell` is not always exact, so the subtraction alone can
/// print `0.09999999999999998` for a header that said `0.1`.
fn lower_left_y(top: f64, rows: usize, cell: f64) -> f64 {
    let height = rows as f64 * cell;
    let naive = top - height;
    (0..=17)
        .filter_map(|digits| format!("{:.*}", digits, naive).parse::<f64>().ok())
        .find(|&y| y + height == top)
        .unwrap_or(naive)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "ncols 3\nnrows 2\nxllcorner 100.0\nyllcorner 200.0\ncellsize 10\nNODATA_value -9999\n1 2 3\n4 -9999 6.25\n";

    #[test]
    fn test_read_sample() {
        let raster = read_ascii_grid_from_str(SAMPLE).unwrap();
        assert_eq!(raster.shape(), (2, 3));
        assert_eq!(raster.get(1, 2).unwrap(), 6.25);
        assert_eq!(raster.value_at(1, 1).unwrap(), None);
        assert_eq!(raster.transform().origin_y, 220.0);
        assert_eq!(raster.index_to_coordinate(1, 0).unwrap(), (105.0, 205.0));
    }

    #[test]
    fn test_read_center_registration() {
        let text = "NCOLS 2\nNROWS 2\nXLLCENTER 5\nYLLCENTER 5\nCELLSIZE 10\n1 2\n3 4\n";
        let raster = read_ascii_grid_from_str(text).unwrap();
        assert_eq!(raster.transform().origin_x, 0.0);
        assert_eq!(raster.transform().origin_y, 20.0);
        assert_eq!(raster.nodata(), None);
    }

    #[test]
    fn test_value_count_mismatch() {
        let text = "ncols 3\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n";
        let err = read_ascii_grid_from_str(text).unwrap_err();
        assert!(matches!(err, Error::Format { line: 0, .. }), "{}", err);
    }

    #[test]
    fn test_malformed_header_and_values() {
        let text = "ncols 3\nnrows two\n";
        assert!(matches!(
            read_ascii_grid_from_str(text),
            Err(Error::Format { line: 2, .. })
        ));

        let text = "ncols 2\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 x\n";
        assert!(matches!(
            read_ascii_grid_from_str(text),
            Err(Error::Format { line: 6, .. })
        ));

        let text = "ncols 1\nnrows 1\nxllcorner 0\ncellsize 1\n1\n";
        let err = read_ascii_grid_from_str(text).unwrap_err();
        assert!(err.to_string().contains("yllcorner"));

        let text = "ncols 1\nncols 1\n";
        assert!(read_ascii_grid_from_str(text).is_err());
    }

    #[test]
    fn test_string_roundtrip_is_lossless() {
        let raster = read_ascii_grid_from_str(SAMPLE).unwrap();
        let text = write_ascii_grid_to_string(&raster).unwrap();
        let again = read_ascii_grid_from_str(&text).unwrap();

        assert_eq!(again.shape(), raster.shape());
        assert_eq!(again.transform(), raster.transform());
        assert_eq!(again.nodata(), Some(-9999.0));
        assert_eq!(again.data(), raster.data());
    }

    #[test]
    fn test_fractional_corner_is_written_back_verbatim() {
        let text = "ncols 2\nnrows 3\nxllcorner 0.3\nyllcorner 0.1\ncellsize 0.1\n1 2\n3 4\n5 6\n";
        let raster = read_ascii_grid_from_str(text).unwrap();
        let written = write_ascii_grid_to_string(&raster).unwrap();

        assert!(written.contains("xllcorner     0.3\n"), "{}", written);
        assert!(written.contains("yllcorner     0.1\n"), "{}", written);
        assert!(written.contains("cellsize      0.1\n"), "{}", written);
        let again = read_ascii_grid_from_str(&written).unwrap();
        assert_eq!(again.transform(), raster.transform());
    }

    #[test]
    fn test_lower_left_y_prefers_short_decimals() {
        assert_eq!(lower_left_y(0.1 + 3.0 * 0.1, 3, 0.1), 0.1);
        assert_eq!(lower_left_y(4_100_090.0, 3, 30.0), 4_100_000.0);
        assert_eq!(lower_left_y(-12.5, 2, 0.25), -13.0);
    }

    #[test]
    fn test_write_nan_without_declared_nodata() {
        let mut raster = Raster::from_vec(vec![1.0, f64::NAN], 1, 2).unwrap();
        raster.set_transform(GeoTransform::new(0.0, 1.0, 1.0, -1.0));
        let text = write_ascii_grid_to_string(&raster).unwrap();
        assert!(text.contains("NODATA_value  -9999"));
        assert!(text.ends_with("1 -9999\n"));
    }

    #[test]
    fn test_write_rejects_rectangular_cells() {
        let mut raster: Raster<f64> = Raster::new(2, 2);
        raster.set_transform(GeoTransform::new(0.0, 0.0, 1.0, -2.0));
        assert!(write_ascii_grid_to_string(&raster).is_err());
    }
}
