//! Disperser Regression Test Suite
//!
//! These tests pin down numerical properties of the stage ladder, the
//! engine and the orchestrator so that refactors keep the same sound.

use std::f64::consts::PI;

use disperser_core::{DisperserConfig, TopologyKey};
use disperser_dsp::coefficients::{FrequencyBand, allpass_coefficient, fill_stage_coefficients};
use disperser_dsp::engine::DispersionEngine;
use disperser_dsp::{BlockProcessor, Disperser, NullObserver};

// ============================================================================
// TEST UTILITIES
// ============================================================================

/// Generate a sine wave test signal
fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (0.5 * (2.0 * PI * frequency * t).sin()) as f32
        })
        .collect()
}

/// Generate white noise
fn generate_noise(num_samples: usize, seed: u64) -> Vec<f32> {
    let mut state = seed;
    (0..num_samples)
        .map(|_| {
            // Simple LCG for reproducible noise
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state as f64 / u64::MAX as f64) * 2.0 - 1.0) as f32
        })
        .collect()
}

fn render(config: DisperserConfig, stages: f64, series: usize, block: usize, input: &[f32]) -> Vec<f32> {
    let mut disperser = Disperser::new(config);
    let params = disperser.params();
    params.set_stages(stages);
    params.set_series(series);
    params.set_shape(0.35);
    params.set_frequency(700.0);
    disperser.prepare(48000.0, block).expect("valid prepare");

    let mut output = input.to_vec();
    for chunk in output.chunks_mut(block) {
        disperser.process_block(&mut [chunk]);
    }
    output
}

// ============================================================================
// STAGE LADDER
// ============================================================================

#[test]
fn test_ladder_is_log_symmetric() {
    // Stage i and its mirror sit an equal number of octaves either side of the center
    for shape in [0.0, 0.25, 0.6, 0.9] {
        let band = FrequencyBand::new(1000.0, 24, 128, shape, 48000.0);
        for i in 0..24 {
            let lo = band.stage_frequency(i, 24);
            let hi = band.stage_frequency(23 - i, 24);
            assert!(
                ((lo * hi).sqrt() - 1000.0).abs() < 1e-6,
                "shape {shape}: stage {i} mirror mean {}",
                (lo * hi).sqrt()
            );
        }
    }
}

#[test]
fn test_shape_concentrates_stages() {
    // The inner half of the stages spans less of the ladder as shape rises
    let inner_share = |shape: f64| {
        let band = FrequencyBand::new(1000.0, 33, 128, shape, 48000.0);
        let outer = (band.stage_frequency(32, 33) / band.stage_frequency(0, 33)).log2();
        let inner = (band.stage_frequency(24, 33) / band.stage_frequency(8, 33)).log2();
        inner / outer
    };
    assert!((inner_share(0.0) - 0.5).abs() < 1e-9);
    assert!(inner_share(0.5) < inner_share(0.0));
}

#[test]
fn test_coefficients_stable_across_sample_rates() {
    for sr in [8000.0, 22050.0, 44100.0, 48000.0, 96000.0, 192000.0] {
        for stages in [1usize, 7, 64, 128] {
            for shape in [0.0, 0.5, 1.0] {
                let mut coeffs = vec![0.0; stages];
                fill_stage_coefficients(&mut coeffs, 20000.0, shape, 128, sr);
                assert!(coeffs.iter().all(|a| a.abs() < 1.0 && a.is_finite()));

                fill_stage_coefficients(&mut coeffs, 20.0, shape, 128, sr);
                assert!(coeffs.iter().all(|a| a.abs() < 1.0 && a.is_finite()));
            }
        }
    }
}

#[test]
fn test_reference_coefficient() {
    // 1 kHz at 48 kHz
    let t = (PI / 48.0).tan();
    assert!((allpass_coefficient(1000.0, 48000.0) - (1.0 - t) / (1.0 + t)).abs() < 1e-15);
    assert!((allpass_coefficient(1000.0, 48000.0) - 0.876976).abs() < 1e-6);
}

// ============================================================================
// ENGINE
// ============================================================================

#[test]
fn test_group_delay_grows_with_stages() {
    let mut previous = 0.0;
    for stages in [4usize, 16, 64] {
        let mut engine = DispersionEngine::new(48000.0, 128);
        engine.set_topology(TopologyKey::new(stages, 1, false), 300.0, 0.0);
        let delay = engine.group_delay_samples();
        assert!(delay > previous);
        previous = delay;
    }
}

#[test]
fn test_engine_sine_gain_is_unity() {
    let mut engine = DispersionEngine::new(48000.0, 128);
    engine.set_topology(TopologyKey::new(48, 3, false), 1500.0, 0.2);

    let mut signal = generate_sine(1000.0, 48000.0, 48000);
    engine.process(&mut signal, None, &mut NullObserver);

    let peak = signal[24000..].iter().fold(0.0f32, |m, y| m.max(y.abs()));
    assert!((peak - 0.5).abs() < 1e-3, "peak {peak}");
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

#[test]
fn test_block_size_independence() {
    // Same sub-block grid -> bit-identical output
    let input = generate_noise(8192, 7);
    let a = render(DisperserConfig::default(), 40.0, 2, 64, &input);
    let b = render(DisperserConfig::default(), 40.0, 2, 512, &input);
    assert_eq!(a, b);
}

#[test]
fn test_deterministic_output() {
    let input = generate_noise(4096, 42);
    let a = render(DisperserConfig::default(), 96.0, 4, 256, &input);
    let b = render(DisperserConfig::default(), 96.0, 4, 256, &input);
    assert_eq!(a, b);
    assert!(a.iter().all(|y| y.is_finite()));
}

#[test]
fn test_max_stage_ceiling_256() {
    let input = generate_noise(2048, 3);
    let output = render(DisperserConfig::default().with_max_stages(256), 256.0, 1, 256, &input);
    assert!(output.iter().all(|y| y.is_finite()));
    assert_ne!(output, input);
}
