//! The delineation stages driven through the `Algorithm` trait give the
//! same results as the free functions.

use upbasin_algorithms::hydrology::{
    fill_depressions, fill_pits, flow_accumulation, flow_direction, resolve_flats_detailed, trace,
    CatchmentTracer, CellIndex, FillDepressions, FillDepressionsParams, FillPits,
    FlowAccumulation, FlowDirection, ResolveFlats,
};
use upbasin_algorithms::interpolation::{resample, Resample, ResampleParams};
use upbasin_core::{Algorithm, GeoTransform, Raster};

/// Tilted 9x9 surface draining south, with a one-cell pit, a closed
/// hollow and a flat terrace
fn terrain() -> Raster<f64> {
    let mut dem = Raster::new(9, 9);
    dem.set_transform(GeoTransform::new(0.0, 90.0, 10.0, -10.0));
    for row in 0..9 {
        for col in 0..9 {
            let z = (9 - row) as f64 * 2.0 + (col as f64 - 4.0).abs();
            dem.set(row, col, z).unwrap();
        }
    }
    dem.set(2, 2, 1.0).unwrap();
    for (row, col) in [(5, 6), (5, 7), (6, 6)] {
        dem.set(row, col, 3.0).unwrap();
    }
    for col in 1..4 {
        dem.set(4, col, 12.0).unwrap();
    }
    dem
}

fn label<A: Algorithm>(algorithm: &A) -> String {
    format!("{}: {}", algorithm.name(), algorithm.description())
}

#[test]
fn conditioning_stages_match_free_functions() {
    let dem = terrain();

    let pits = FillPits.execute_default(dem.clone()).unwrap();
    assert_eq!(pits.data(), fill_pits(&dem).unwrap().data());

    let params = FillDepressionsParams { epsilon: 0.0 };
    let filled = FillDepressions.execute(pits.clone(), params.clone()).unwrap();
    assert_eq!(filled.data(), fill_depressions(&pits, params).unwrap().data());

    let flats = ResolveFlats.execute_default(filled.clone()).unwrap();
    let expected = resolve_flats_detailed(&filled).unwrap();
    assert_eq!(flats.dem.data(), expected.dem.data());
    assert_eq!(flats.flats, expected.flats);
    assert!(flats.undrainable.is_empty());
}

#[test]
fn routing_stages_match_free_functions() {
    let dem = resolve_flats_detailed(&fill_depressions(&terrain(), Default::default()).unwrap())
        .unwrap()
        .dem;

    let fdir = FlowDirection.execute_default(dem.clone()).unwrap();
    assert_eq!(fdir.data(), flow_direction(&dem).unwrap().data());

    let acc = FlowAccumulation.execute_default(fdir.clone()).unwrap();
    assert_eq!(acc.data(), flow_accumulation(&fdir).unwrap().data());

    let outlet = CellIndex::new(8, 4);
    let mask = CatchmentTracer.execute(fdir.clone(), outlet).unwrap();
    assert_eq!(mask, trace(&fdir, outlet).unwrap());
    assert_eq!(mask.cell_count() as f64, acc.get(8, 4).unwrap());
}

#[test]
fn resample_stage_matches_free_function() {
    let dem = terrain();
    let params = ResampleParams {
        scale_factor: 2.0,
        order: 3,
    };
    let fine = Resample.execute(dem.clone(), params).unwrap();
    assert_eq!(fine.shape(), (18, 18));
    assert_eq!(fine.data(), resample(&dem, 2.0, 3).unwrap().data());

    // Defaults halve the grid bilinearly
    let coarse = Resample.execute_default(dem).unwrap();
    assert_eq!(coarse.shape(), (4, 4));
}

#[test]
fn every_stage_is_named() {
    let labels = [
        label(&FillPits),
        label(&FillDepressions),
        label(&ResolveFlats),
        label(&FlowDirection),
        label(&FlowAccumulation),
        label(&CatchmentTracer),
        label(&Resample),
    ];
    for (i, a) in labels.iter().enumerate() {
        assert!(!a.starts_with(':'), "unnamed stage: {}", a);
        for b in &labels[i + 1..] {
            assert_ne!(a, b);
        }
    }
}
