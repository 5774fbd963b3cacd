use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use brovey_pansharp_rs::image_pipeline::sharpen::PhaseCorrelator;
use brovey_pansharp_rs::image_pipeline::{
    Crs, GeoProfile, GeoTransform, PansharpenConfig, PansharpenPipeline, RasterBand,
};
use ndarray::Array2;

fn generate_band(size: usize, pixel_size: f64, gain: f32) -> RasterBand {
    let data = Array2::from_shape_fn((size, size), |(r, c)| {
        let (y, x) = (r as f32 * pixel_size as f32, c as f32 * pixel_size as f32);
        gain * (300.0 + 100.0 * (y / 11.0).sin() * (x / 7.0).cos() + 0.5 * x)
    });
    let profile = GeoProfile::new(
        size,
        size,
        GeoTransform::new(440_000.0, 4_470_000.0, pixel_size, -pixel_size),
        Crs::Epsg(32630),
    );
    RasterBand::new(data, profile).unwrap()
}

fn generate_scene(size: usize) -> (RasterBand, [RasterBand; 3]) {
    // Multispectral bands at a quarter of the panchromatic resolution
    let ms_size = size / 4;
    (
        generate_band(size, 1.0, 1.0),
        [
            generate_band(ms_size, 4.0, 0.9),
            generate_band(ms_size, 4.0, 1.0),
            generate_band(ms_size, 4.0, 1.1),
        ],
    )
}

fn benchmark_sharpen_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("sharpen_by_size");
    group.sample_size(10);

    for size in [256, 512, 1024] {
        let (pan, ms) = generate_scene(size);
        let pipeline = PansharpenPipeline::new(PansharpenConfig::default());

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let _ = pipeline.sharpen(black_box(&pan), [&ms[0], &ms[1], &ms[2]]);
            });
        });
    }

    group.finish();
}

fn benchmark_band_parallelism(c: &mut Criterion) {
    let mut group = c.benchmark_group("band_parallelism");
    group.sample_size(10);
    let (pan, ms) = generate_scene(512);

    for (parallel, label) in [(true, "parallel"), (false, "sequential")] {
        let config = PansharpenConfig::builder().parallel_bands(parallel).build();
        let pipeline = PansharpenPipeline::new(config);

        group.bench_function(label, |b| {
            b.iter(|| {
                let _ = pipeline.sharpen(black_box(&pan), [&ms[0], &ms[1], &ms[2]]);
            });
        });
    }

    group.finish();
}

fn benchmark_phase_correlation(c: &mut Criterion) {
    let mut group = c.benchmark_group("phase_correlation");
    let reference = generate_band(512, 1.0, 1.0);
    let target = generate_band(512, 1.0, 0.8);

    for factor in [1, 10, 100] {
        let correlator = PhaseCorrelator::new(factor);
        group.bench_with_input(BenchmarkId::from_parameter(factor), &factor, |b, _| {
            b.iter(|| {
                let _ = correlator.estimate(
                    black_box(&reference.data().view()),
                    black_box(&target.data().view()),
                );
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_sharpen_sizes,
    benchmark_band_parallelism,
    benchmark_phase_correlation
);
criterion_main!(benches);
