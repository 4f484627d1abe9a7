//! Sample types and host buffer helpers

/// Type alias for internal samples (f64 for filter state precision)
pub type Sample = f64;

/// Type alias for host-facing samples
pub type HostSample = f32;

/// Flip the sign of every sample in a host buffer
#[inline]
pub fn invert_in_place(buffer: &mut [HostSample]) {
    for sample in buffer.iter_mut() {
        *sample = -*sample;
    }
}

/// Convert milliseconds to a sample count, clamped to `[min, max]`
#[inline]
pub fn ms_to_samples(ms: f64, sample_rate: f64, min: usize, max: usize) -> usize {
    let samples = (ms * 0.001 * sample_rate).round();
    if !samples.is_finite() || samples <= min as f64 {
        return min;
    }
    (samples as usize).min(max)
}
