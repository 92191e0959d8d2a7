//! ASCII grid file round trips through the filesystem.

use upbasin_core::io::{read_ascii_grid, write_ascii_grid};
use upbasin_core::{Error, GeoTransform, Raster};

const SAMPLE: &str = "\
ncols 4
nrows 3
xllcorner 500000
yllcorner 4100000
cellsize 30
NODATA_value -9999
12.5 13 13.1 -9999
11 10.25 9.75 9
8.5 8 7.125 6
";

#[test]
fn file_roundtrip_is_lossless() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("sample.asc");
    std::fs::write(&src, SAMPLE).unwrap();

    let dem = read_ascii_grid(&src).unwrap();
    assert_eq!(dem.shape(), (3, 4));
    assert_eq!(dem.nodata(), Some(-9999.0));
    assert_eq!(dem.value_at(0, 3).unwrap(), None);
    assert_eq!(dem.valid_count(), 11);

    let copy = dir.path().join("copy.asc");
    write_ascii_grid(&dem, &copy).unwrap();
    let again = read_ascii_grid(&copy).unwrap();

    assert_eq!(again.data(), dem.data());
    assert_eq!(again.transform(), dem.transform());
    assert_eq!(again.nodata(), dem.nodata());
}

#[test]
fn coordinates_follow_lower_left_corner() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("sample.asc");
    std::fs::write(&src, SAMPLE).unwrap();
    let dem = read_ascii_grid(&src).unwrap();

    // Top edge = 4100000 + 3 * 30
    assert_eq!(dem.transform().origin_y, 4_100_090.0);
    assert_eq!(dem.index_to_coordinate(0, 0).unwrap(), (500_015.0, 4_100_075.0));
    assert_eq!(dem.coordinate_to_index(500_100.0, 4_100_010.0).unwrap(), (2, 3));
    assert!(matches!(
        dem.coordinate_to_index(499_000.0, 4_100_010.0),
        Err(Error::CoordinateOutOfBounds { .. })
    ));
}

#[test]
fn written_values_survive_unusual_floats() {
    let values = vec![0.1 + 0.2, 1e-12, -3.5e7, 123_456.789_012_345, 0.0, -0.0];
    let mut raster = Raster::from_vec(values, 2, 3).unwrap();
    raster.set_transform(GeoTransform::new(10.0, 20.0, 0.5, -0.5));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("floats.asc");
    write_ascii_grid(&raster, &path).unwrap();
    let back = read_ascii_grid(&path).unwrap();

    for (a, b) in raster.data().iter().zip(back.data().iter()) {
        assert_eq!(a, b);
    }
    assert_eq!(back.transform(), raster.transform());
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        read_ascii_grid(dir.path().join("absent.asc")),
        Err(Error::Io(_))
    ));
}

#[test]
fn truncated_body_is_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.asc");
    let text = SAMPLE.lines().take(8).collect::<Vec<_>>().join("\n");
    std::fs::write(&path, text).unwrap();
    assert!(matches!(read_ascii_grid(&path), Err(Error::Format { .. })));
}
