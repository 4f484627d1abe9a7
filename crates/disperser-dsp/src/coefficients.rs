//! Allpass coefficient generation
//!
//! Each stage of the dispersion chain is a first-order allpass tuned to its own
//! break frequency. Stage frequencies form a log-spaced ladder around the
//! center frequency:
//!
//! - the ladder width (in octaves) grows with the stage count and shrinks with shape
//! - a warp exponent concentrates stages toward the center as shape rises
//! - every stage is finally pulled toward the center in the log domain by `shape`
//!
//! Frequencies are turned into coefficients with the bilinear transform.

use disperser_core::{MIN_FREQ_HZ, Sample};
use std::f64::consts::PI;

/// Coefficients are kept strictly inside the unit circle
pub const COEFF_LIMIT: Sample = 0.9999;

const BASE_SPREAD_MIN_OCT: f64 = 0.10;
const BASE_SPREAD_RANGE_OCT: f64 = 2.90;
const WARP_GAMMA_RANGE: f64 = 4.0;

/// Coefficient memoization resolution
const FREQ_BINS_PER_OCTAVE: f64 = 240.0;
const SHAPE_BINS: f64 = 1000.0;

/// First-order allpass coefficient for a break frequency (bilinear transform).
///
/// `t = tan(pi * f / sr)`, `a = (1 - t) / (1 + t)`, clamped to ±[`COEFF_LIMIT`].
/// A non-finite tangent yields 0.
#[inline]
pub fn allpass_coefficient(freq: f64, sample_rate: f64) -> Sample {
    let t = (PI * freq / sample_rate).tan();
    if !t.is_finite() {
        return 0.0;
    }
    let a = (1.0 - t) / (1.0 + t);
    if !a.is_finite() {
        return 0.0;
    }
    a.clamp(-COEFF_LIMIT, COEFF_LIMIT)
}

/// Inverse of [`allpass_coefficient`] (ignoring the clamp)
#[inline]
pub fn frequency_from_coefficient(a: Sample, sample_rate: f64) -> f64 {
    let t = (1.0 - a) / (1.0 + a);
    t.atan() * sample_rate / PI
}

/// Upper frequency bound for a sample rate, never below [`MIN_FREQ_HZ`]
#[inline]
pub fn nyquist(sample_rate: f64) -> f64 {
    (0.5 * sample_rate).max(MIN_FREQ_HZ)
}

/// Frequency span covered by the stage ladder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyBand {
    pub center: f64,
    pub min: f64,
    pub max: f64,
    /// Stage-position warp exponent
    pub gamma: f64,
    /// Pull toward the center applied to every stage (0..=1)
    pub pinch: f64,
}

impl FrequencyBand {
    pub fn new(center: f64, stages: usize, max_stages: usize, shape: f64, sample_rate: f64) -> Self {
        let lo = MIN_FREQ_HZ;
        let hi = nyquist(sample_rate);
        let center = if center.is_finite() { center.clamp(lo, hi) } else { lo };
        let pinch = if shape.is_finite() { shape.clamp(0.0, 1.0) } else { 0.0 };

        let n = (stages as f64 / max_stages.max(1) as f64).clamp(0.0, 1.0);
        let base_spread = BASE_SPREAD_MIN_OCT + BASE_SPREAD_RANGE_OCT * n.sqrt();
        let spread_oct = base_spread * (1.0 - pinch);
        let gamma = 1.0 + WARP_GAMMA_RANGE * pinch;

        let ratio = spread_oct.exp2();
        let mut min = center / ratio;
        let mut max = center * ratio;

        // Keep sqrt(min * max) == center while only one side hits a bound
        if min < lo {
            min = lo;
            max = center * center / lo;
        }
        if max > hi {
            max = hi;
            min = center * center / hi;
        }
        let min = min.clamp(lo, hi);
        let max = max.clamp(lo, hi);

        Self {
            center,
            min,
            max,
            gamma,
            pinch,
        }
    }

    #[inline]
    pub fn geometric_mean(&self) -> f64 {
        (self.min * self.max).sqrt()
    }

    /// Half-width of the band in octaves
    #[inline]
    pub fn spread_octaves(&self) -> f64 {
        0.5 * (self.max / self.min).log2()
    }

    /// Break frequency of stage `index` out of `total`
    pub fn stage_frequency(&self, index: usize, total: usize) -> f64 {
        if total <= 1 {
            return self.center;
        }

        let pos = index.min(total - 1) as f64 / (total - 1) as f64;
        // Symmetric warp: gamma > 1 packs stages toward the middle of the band
        let u = 2.0 * pos - 1.0;
        let warped = u.abs().powf(self.gamma).copysign(u);
        let p = 0.5 * (warped + 1.0);

        let ladder = self.min * (self.max / self.min).powf(p);

        // Log-domain blend toward the center
        (ladder.ln() * (1.0 - self.pinch) + self.center.ln() * self.pinch).exp()
    }
}

/// Write one coefficient per stage into `out` (`out.len()` is the stage count)
pub fn fill_stage_coefficients(
    out: &mut [Sample],
    center: f64,
    shape: f64,
    max_stages: usize,
    sample_rate: f64,
) {
    let total = out.len();
    if total == 0 {
        return;
    }
    let band = FrequencyBand::new(center, total, max_stages, shape, sample_rate);
    for (i, coeff) in out.iter_mut().enumerate() {
        *coeff = allpass_coefficient(band.stage_frequency(i, total), sample_rate);
    }
}

/// Quantized (frequency, shape) pair used to skip redundant coefficient rebuilds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoefficientBin {
    pub freq: i64,
    pub shape: i64,
    pub stages: usize,
}

impl CoefficientBin {
    pub fn quantize(freq: f64, shape: f64, stages: usize) -> Self {
        let octaves = (freq.max(MIN_FREQ_HZ) / MIN_FREQ_HZ).log2();
        let freq_bin = if octaves.is_finite() {
            (octaves * FREQ_BINS_PER_OCTAVE).round() as i64
        } else {
            0
        };
        let shape_bin = if shape.is_finite() {
            (shape.clamp(0.0, 1.0) * SHAPE_BINS).round() as i64
        } else {
            0
        };
        Self {
            freq: freq_bin,
            shape: shape_bin,
            stages,
        }
    }
}
