//! Lock-Free Parameter Smoothing
//!
//! Click-free control changes for the audio thread:
//! - Atomic target (may be written from any thread)
//! - Linear, exponential or no smoothing
//! - Per-sample (`next`) or control-rate (`advance`) stepping
//! - Zero allocation

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

// ============ Smoothing Algorithms ============

/// Smoothing algorithm type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmoothingType {
    /// Linear ramp reaching the target in exactly the smoothing time
    #[default]
    Linear,
    /// Exponential decay (RC filter style)
    Exponential,
    /// No smoothing (instant change)
    None,
}

// ============ Smoothed Parameter ============

/// Lock-free smoothed parameter
#[derive(Debug)]
pub struct SmoothedParam {
    /// Target value
    target: AtomicU64,
    /// Current smoothed value
    current: f64,
    /// Smoothing coefficient for exponential
    coeff: f64,
    smoothing_type: SmoothingType,
    /// Smoothing time in samples
    smoothing_samples: f64,
    /// Step size for linear smoothing
    linear_step: f64,
    /// Remaining samples of the linear ramp
    linear_remaining: u64,
    /// Set when the target moved and the ramp must be recomputed
    dirty: AtomicBool,
    min_value: f64,
    max_value: f64,
}

impl SmoothedParam {
    pub fn new(
        initial_value: f64,
        smoothing_time_ms: f64,
        sample_rate: f64,
        smoothing_type: SmoothingType,
    ) -> Self {
        let smoothing_samples = Self::time_to_samples(smoothing_time_ms, sample_rate);

        Self {
            target: AtomicU64::new(initial_value.to_bits()),
            current: initial_value,
            coeff: Self::calculate_coeff(smoothing_samples),
            smoothing_type,
            smoothing_samples,
            linear_step: 0.0,
            linear_remaining: 0,
            dirty: AtomicBool::new(false),
            min_value: f64::NEG_INFINITY,
            max_value: f64::INFINITY,
        }
    }

    /// Create with value range
    pub fn with_range(
        initial_value: f64,
        smoothing_time_ms: f64,
        sample_rate: f64,
        smoothing_type: SmoothingType,
        min: f64,
        max: f64,
    ) -> Self {
        let mut param = Self::new(
            initial_value.clamp(min, max),
            smoothing_time_ms,
            sample_rate,
            smoothing_type,
        );
        param.min_value = min;
        param.max_value = max;
        param
    }

    fn time_to_samples(time_ms: f64, sample_rate: f64) -> f64 {
        let samples = (time_ms / 1000.0) * sample_rate;
        if samples.is_finite() { samples.max(0.0).round() } else { 0.0 }
    }

    /// Calculate exponential smoothing coefficient
    fn calculate_coeff(samples: f64) -> f64 {
        if samples <= 0.0 {
            1.0
        } else {
            // Time constant: reach ~63% in smoothing_samples
            1.0 - (-1.0 / samples).exp()
        }
    }

    #[inline]
    pub fn smoothing_samples(&self) -> u64 {
        self.smoothing_samples as u64
    }

    /// Set target value (thread-safe).
    ///
    /// A target equal to the current one leaves a running ramp untouched.
    #[inline]
    pub fn set_target(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let clamped = value.clamp(self.min_value, self.max_value);
        let previous = self.target.swap(clamped.to_bits(), Ordering::Relaxed);
        if previous != clamped.to_bits() {
            self.dirty.store(true, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn target(&self) -> f64 {
        f64::from_bits(self.target.load(Ordering::Relaxed))
    }

    /// Current smoothed value
    #[inline]
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Jump straight to `value` (initialization)
    pub fn set_immediate(&mut self, value: f64) {
        let clamped = value.clamp(self.min_value, self.max_value);
        self.current = clamped;
        self.target.store(clamped.to_bits(), Ordering::Relaxed);
        self.linear_remaining = 0;
        self.linear_step = 0.0;
        self.dirty.store(false, Ordering::Relaxed);
    }

    /// Check if smoothing is active
    #[inline]
    pub fn is_smoothing(&self) -> bool {
        match self.smoothing_type {
            SmoothingType::None => false,
            SmoothingType::Linear => {
                self.linear_remaining > 0 || self.dirty.load(Ordering::Relaxed)
            }
            SmoothingType::Exponential => (self.current - self.target()).abs() > 1e-10,
        }
    }

    fn restart_ramp(&mut self, target: f64) {
        let steps = self.smoothing_samples as u64;
        if steps > 0 {
            self.linear_remaining = steps;
            self.linear_step = (target - self.current) / steps as f64;
        } else {
            self.linear_remaining = 0;
            self.linear_step = 0.0;
            self.current = target;
        }
    }

    /// Process one sample of smoothing
    #[inline]
    pub fn next(&mut self) -> f64 {
        self.advance(1)
    }

    /// Step the smoother by `samples` at once and return the new value.
    ///
    /// Equivalent to calling [`SmoothedParam::next`] `samples` times.
    pub fn advance(&mut self, samples: usize) -> f64 {
        if samples == 0 {
            return self.current;
        }
        let target = self.target();

        match self.smoothing_type {
            SmoothingType::None => {
                self.current = target;
            }
            SmoothingType::Exponential => {
                let keep = (1.0 - self.coeff).powi(samples.min(i32::MAX as usize) as i32);
                self.current = target + (self.current - target) * keep;
            }
            SmoothingType::Linear => {
                if self.dirty.swap(false, Ordering::Relaxed) {
                    self.restart_ramp(target);
                }

                let n = samples as u64;
                if n < self.linear_remaining {
                    self.current += self.linear_step * n as f64;
                    self.linear_remaining -= n;
                } else {
                    self.current = target;
                    self.linear_remaining = 0;
                }
            }
        }

        self.current
    }

    /// Snap to the target instantly
    pub fn reset(&mut self) {
        self.current = self.target();
        self.linear_remaining = 0;
        self.linear_step = 0.0;
        self.dirty.store(false, Ordering::Relaxed);
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exponential_smoothing() {
        let mut param = SmoothedParam::new(0.0, 10.0, 48000.0, SmoothingType::Exponential);
        param.set_target(1.0);

        for _ in 0..10000 {
            param.next();
        }

        assert!((param.current() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_exponential_advance_matches_next() {
        let mut a = SmoothedParam::new(0.0, 5.0, 48000.0, SmoothingType::Exponential);
        let mut b = SmoothedParam::new(0.0, 5.0, 48000.0, SmoothingType::Exponential);
        a.set_target(1.0);
        b.set_target(1.0);

        for _ in 0..100 {
            a.next();
        }
        b.advance(100);

        assert_relative_eq!(a.current(), b.current(), max_relative = 1e-9);
    }

    #[test]
    fn test_linear_smoothing() {
        // 10ms at 1000Hz = 10 samples
        let mut param = SmoothedParam::new(0.0, 10.0, 1000.0, SmoothingType::Linear);
        param.set_target(1.0);

        for i in 1..=10 {
            let v = param.next();
            assert_relative_eq!(v, i as f64 / 10.0, epsilon = 1e-12);
        }
        assert!(!param.is_smoothing());
        assert_eq!(param.next(), 1.0);
    }

    #[test]
    fn test_linear_advance() {
        let mut param = SmoothedParam::new(0.0, 100.0, 1000.0, SmoothingType::Linear);
        param.set_target(10.0);

        assert_relative_eq!(param.advance(32), 3.2, epsilon = 1e-12);
        assert_relative_eq!(param.advance(32), 6.4, epsilon = 1e-12);
        assert_relative_eq!(param.advance(32), 9.6, epsilon = 1e-12);
        // Overshooting the remaining steps lands exactly on the target
        assert_eq!(param.advance(32), 10.0);
    }

    #[test]
    fn test_same_target_does_not_restart_ramp() {
        let mut param = SmoothedParam::new(0.0, 10.0, 1000.0, SmoothingType::Linear);
        param.set_target(1.0);
        param.advance(5);

        param.set_target(1.0);
        param.advance(5);
        assert_eq!(param.current(), 1.0);
    }

    #[test]
    fn test_retarget_mid_ramp() {
        let mut param = SmoothedParam::new(0.0, 10.0, 1000.0, SmoothingType::Linear);
        param.set_target(1.0);
        param.advance(5);

        param.set_target(0.0);
        assert_relative_eq!(param.advance(5), 0.25, epsilon = 1e-12);
        assert_relative_eq!(param.advance(5), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_no_smoothing() {
        let mut param = SmoothedParam::new(0.0, 10.0, 48000.0, SmoothingType::None);
        param.set_target(1.0);

        let value = param.next();
        assert!((value - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_zero_time_is_instant() {
        let mut param = SmoothedParam::new(0.0, 0.0, 48000.0, SmoothingType::Linear);
        param.set_target(3.0);
        assert_eq!(param.next(), 3.0);
    }

    #[test]
    fn test_immediate_set() {
        let mut param = SmoothedParam::new(0.0, 10.0, 48000.0, SmoothingType::Exponential);
        param.set_immediate(0.5);

        assert!((param.current() - 0.5).abs() < 1e-10);
        assert!((param.target() - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_value_clamping() {
        let param = SmoothedParam::with_range(0.5, 10.0, 48000.0, SmoothingType::Exponential, 0.0, 1.0);

        param.set_target(2.0);
        assert!((param.target() - 1.0).abs() < 1e-10);

        param.set_target(-1.0);
        assert!((param.target() - 0.0).abs() < 1e-10);

        param.set_target(f64::NAN);
        assert!((param.target() - 0.0).abs() < 1e-10);
    }

    #[test]
    fn test_smoothing_time_scales_with_rate() {
        let slow = SmoothedParam::new(0.0, 10.0, 1000.0, SmoothingType::Linear);
        let fast = SmoothedParam::new(0.0, 10.0, 48000.0, SmoothingType::Linear);
        assert_eq!(slow.smoothing_samples(), 10);
        assert_eq!(fast.smoothing_samples(), 480);
        assert_eq!(SmoothedParam::new(0.0, f64::NAN, 48000.0, SmoothingType::Linear).smoothing_samples(), 0);
    }
}
