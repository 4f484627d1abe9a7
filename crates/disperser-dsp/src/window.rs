//! Window functions for the reverse overlap-add pipeline

use disperser_core::Sample;
use std::f64::consts::PI;

/// Fill `out` with a square-root Hann window sampled at half-sample offsets:
/// `w[k] = sin(pi * (k + 0.5) / N)`.
///
/// The half-sample offset makes the window exactly symmetric, so a time
/// reversed frame sees the same window, and `w[k]^2 + w[k + N/2]^2 == 1`
/// for even `N` (constant overlap-add at 50% hop with analysis and synthesis
/// windowing).
pub fn fill_sqrt_hann(out: &mut [Sample]) {
    let n = out.len() as f64;
    for (k, w) in out.iter_mut().enumerate() {
        *w = (PI * (k as f64 + 0.5) / n).sin();
    }
}

/// Allocating variant of [`fill_sqrt_hann`]
pub fn sqrt_hann(size: usize) -> Vec<Sample> {
    let mut window = vec![0.0; size];
    fill_sqrt_hann(&mut window);
    window
}
