//! Dispersion engine benchmarks

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use disperser_core::{DisperserConfig, TopologyKey};
use disperser_dsp::coefficients::fill_stage_coefficients;
use disperser_dsp::engine::DispersionEngine;
use disperser_dsp::{BlockProcessor, Disperser, NullObserver};

fn test_signal() -> Vec<f32> {
    (0..1024).map(|i| (i as f32 * 0.01).sin()).collect()
}

fn bench_coefficients(c: &mut Criterion) {
    let mut coeffs = vec![0.0; 128];

    c.bench_function("coefficients_128", |b| {
        b.iter(|| {
            fill_stage_coefficients(black_box(&mut coeffs), black_box(1000.0), 0.3, 128, 48000.0);
        })
    });
}

fn bench_engine_direct(c: &mut Criterion) {
    let mut engine = DispersionEngine::new(48000.0, 128);
    engine.set_topology(TopologyKey::new(128, 1, false), 1000.0, 0.0);
    let mut left = test_signal();
    let mut right = test_signal();

    c.bench_function("engine_direct_128x1_stereo_1024", |b| {
        b.iter(|| {
            engine.process(black_box(&mut left[..]), Some(black_box(&mut right[..])), &mut NullObserver);
        })
    });
}

fn bench_engine_reverse(c: &mut Criterion) {
    let mut engine = DispersionEngine::new(48000.0, 128);
    engine.set_topology(TopologyKey::new(64, 2, true), 1000.0, 0.0);
    let mut left = test_signal();
    let mut right = test_signal();

    c.bench_function("engine_reverse_64x2_stereo_1024", |b| {
        b.iter(|| {
            engine.process(black_box(&mut left[..]), Some(black_box(&mut right[..])), &mut NullObserver);
        })
    });
}

fn bench_disperser_block(c: &mut Criterion) {
    let mut disperser = Disperser::new(DisperserConfig::default());
    disperser.params().set_stages(64.0);
    disperser.params().set_series(2);
    if disperser.prepare(48000.0, 1024).is_err() {
        return;
    }
    let mut left = test_signal();
    let mut right = test_signal();

    c.bench_function("disperser_block_64x2_stereo_1024", |b| {
        b.iter(|| {
            disperser.process_block(&mut [black_box(&mut left[..]), black_box(&mut right[..])]);
        })
    });
}

criterion_group!(
    benches,
    bench_coefficients,
    bench_engine_direct,
    bench_engine_reverse,
    bench_disperser_block
);
criterion_main!(benches);
