//! Delineation demo: synthetic valley, end to end
//!
//! Builds a 60x80 synthetic DEM in UTM zone 33N (a tilted valley with a
//! closed depression and a flat terrace), then:
//!   1. dem.asc             the synthetic input
//!   2. dem_coarse.asc      the DEM resampled to half resolution (cubic)
//!   3. conditioned.asc     the conditioned DEM written by the pipeline
//!   4. catchment.asc       the clipped catchment mask (1 inside, 0 outside)
//!
//! The outlet is given as a WGS84 longitude/latitude and snapped onto the
//! channel. Set `RUST_LOG=debug` for per-stage logging.
//!
//! Run:
//!   cargo run -p upbasin-algorithms --example delineate_demo

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use upbasin_algorithms::{analyze_catchment, resample_grid, DelineationOptions};
use upbasin_core::io::{read_ascii_grid, write_ascii_grid};
use upbasin_core::{CrsTransform, GeoTransform, Raster, UtmTransform, CRS};

const ROWS: usize = 60;
const COLS: usize = 80;
const CELL: f64 = 30.0;
const ORIGIN_X: f64 = 500_000.0;
const ORIGIN_Y: f64 = 5_300_000.0;

fn setup_logging() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn main() -> Result<()> {
    setup_logging()?;

    let out_dir = Path::new("output/delineate_demo");
    fs::create_dir_all(out_dir).context("cannot create output directory")?;

    // --- 1. Synthetic DEM, round-tripped through the ASCII format ---
    let dem_path = out_dir.join("dem.asc");
    write_ascii_grid(&build_valley(), &dem_path)?;
    let dem = read_ascii_grid(&dem_path).context("failed to read the synthetic DEM back")?;
    print_stats("dem", &dem);

    // --- 2. Resampling ---
    let coarse = resample_grid(&dem, 0.5, 3)?;
    write_ascii_grid(&coarse, out_dir.join("dem_coarse.asc"))?;
    print_stats("coarse", &coarse);

    // --- 3. Outlet as lon/lat near the valley mouth ---
    let utm33n = CRS::from_epsg(32633);
    let (mouth_x, mouth_y) = dem.index_to_coordinate(ROWS - 1, COLS / 2 + 2)?;
    let (lon, lat) = UtmTransform.transform(mouth_x, mouth_y, &utm33n, &CRS::wgs84())?;
    println!("\nOutlet: lon {:.6}, lat {:.6}", lon, lat);

    // --- 4. Delineation ---
    let options = DelineationOptions {
        crs: utm33n,
        search_radius: Some(5.0),
        clip_to_catchment: true,
        conditioned_dem_output: Some(out_dir.join("conditioned.asc")),
        ..Default::default()
    };
    let outlet = options.coordinate_outlet(lon, lat);
    let analysis = analyze_catchment(&dem, &outlet, Some(100.0), &options)
        .context("delineation failed")?;

    let area_km2 = analysis.catchment.cell_count() as f64 * CELL * CELL / 1e6;
    println!(
        "Catchment: {} cells ({:.3} km2), outlet {} in the clipped grid, accumulation {}",
        analysis.catchment.cell_count(),
        area_km2,
        analysis.outlet,
        analysis.accumulation.get(analysis.outlet.row, analysis.outlet.col)?,
    );
    write_ascii_grid(&analysis.catchment.to_raster(), out_dir.join("catchment.asc"))?;

    println!("\nOutputs written to {}", out_dir.display());
    Ok(())
}

/// Valley sloping south with a depression at (20, 30) and a flat terrace
fn build_valley() -> Raster<f64> {
    let mut dem = Raster::new(ROWS, COLS);
    dem.set_transform(GeoTransform::new(ORIGIN_X, ORIGIN_Y, CELL, -CELL));
    dem.set_crs(Some(CRS::from_epsg(32633)));

    let axis = COLS as f64 / 2.0;
    for row in 0..ROWS {
        for col in 0..COLS {
            let across = (col as f64 - axis).abs() * 1.5;
            let along = (ROWS - row) as f64 * 0.8;
            let dr = row as f64 - 20.0;
            let dc = col as f64 - 30.0;
            let pit = 6.0 * (-(dr * dr + dc * dc) / 18.0).exp();
            let mut z = 400.0 + along + across - pit;
            if (8..14).contains(&row) && (50..60).contains(&col) {
                z = 430.0;
            }
            dem.data_mut()[(row, col)] = (z * 100.0).round() / 100.0;
        }
    }
    dem
}

fn print_stats(label: &str, raster: &Raster<f64>) {
    let stats = raster.statistics();
    println!(
        "  {:<8} {}x{}  min={:.2}  max={:.2}  mean={:.2}  cell={}",
        label,
        raster.rows(),
        raster.cols(),
        stats.min.unwrap_or(f64::NAN),
        stats.max.unwrap_or(f64::NAN),
        stats.mean.unwrap_or(f64::NAN),
        raster.cell_size(),
    );
}
