//! Benchmarks for the delineation stages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use upbasin_algorithms::hydrology::{
    condition_dem, fill_depressions, flow_accumulation, flow_direction, resolve_flats, trace,
    CellIndex, ConditioningParams, FillDepressionsParams,
};
use upbasin_algorithms::interpolation::resample;
use upbasin_core::{GeoTransform, Raster};

/// Closed basin around the centre with a little noise, so every stage
/// has depressions and flats to work on
fn create_basin_dem(size: usize) -> Raster<f64> {
    let mut dem = Raster::new(size, size);
    dem.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
    let center = size as f64 / 2.0;
    for row in 0..size {
        for col in 0..size {
            let dx = col as f64 - center;
            let dy = row as f64 - center;
            let dist = (dx * dx + dy * dy).sqrt();
            let noise = ((row * 7 + col * 13) % 17) as f64 * 0.01;
            dem.set(row, col, (dist + noise).round()).unwrap();
        }
    }
    dem
}

fn bench_fill_depressions(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/fill_depressions");
    for size in [128, 256, 512, 1024] {
        let dem = create_basin_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| fill_depressions(black_box(&dem), FillDepressionsParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_resolve_flats(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/resolve_flats");
    for size in [128, 256, 512] {
        let filled = fill_depressions(&create_basin_dem(size), FillDepressionsParams::default()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| resolve_flats(black_box(&filled)).unwrap())
        });
    }
    group.finish();
}

fn bench_flow_direction(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_direction");
    for size in [256, 512, 1024, 2048] {
        let dem = create_basin_dem(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| flow_direction(black_box(&dem)).unwrap())
        });
    }
    group.finish();
}

fn bench_flow_accumulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/flow_accumulation");
    for size in [256, 512, 1024, 2048] {
        let dem = create_basin_dem(size);
        let fdir = flow_direction(&dem).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| flow_accumulation(black_box(&fdir)).unwrap())
        });
    }
    group.finish();
}

fn bench_trace(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrology/trace");
    for size in [256, 512, 1024] {
        let conditioned = condition_dem(&create_basin_dem(size), &ConditioningParams::default()).unwrap();
        let fdir = flow_direction(&conditioned).unwrap();
        let outlet = CellIndex::new(size - 1, size / 2);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| trace(black_box(&fdir), outlet).unwrap())
        });
    }
    group.finish();
}

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolation/resample");
    let dem = create_basin_dem(512);
    for order in [0, 1, 3, 5] {
        group.bench_with_input(BenchmarkId::from_parameter(order), &order, |b, &order| {
            b.iter(|| resample(black_box(&dem), 0.5, order).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_fill_depressions,
    bench_resolve_flats,
    bench_flow_direction,
    bench_flow_accumulation,
    bench_trace,
    bench_resample,
);
criterion_main!(benches);
